//! Placement combinator handlers

use axum::{extract::State, http::StatusCode, response::Json};
use serde::Deserialize;

use adsync_types::models::{CleanupReport, CombinatorReport};
use adsync_types::{EntityRef, PlacementBatch};

use super::{app_error, error_response, ApiError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlacementsRequest {
    pub campaign_id: EntityRef,
    #[serde(default)]
    pub advertisement_ids: Vec<EntityRef>,
    #[serde(default)]
    pub zone_ids: Vec<EntityRef>,
}

/// The cleanup endpoint keeps snake_case field names.
#[derive(Debug, Deserialize)]
pub struct CleanupPlacementsRequest {
    pub campaign_id: EntityRef,
    #[serde(default)]
    pub advertisement_ids: Vec<EntityRef>,
    #[serde(default)]
    pub zone_ids: Vec<EntityRef>,
}

fn batch(
    campaign: EntityRef,
    advertisements: Vec<EntityRef>,
    zones: Vec<EntityRef>,
) -> Result<PlacementBatch, ApiError> {
    if advertisements.is_empty() || zones.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "at least one advertisement and one zone are required",
        ));
    }
    Ok(PlacementBatch { campaign, advertisements, zones })
}

pub async fn create_placements(
    State(state): State<AppState>,
    Json(req): Json<CreatePlacementsRequest>,
) -> Result<Json<CombinatorReport>, ApiError> {
    let batch = batch(req.campaign_id, req.advertisement_ids, req.zone_ids)?;
    tracing::info!(
        campaign = %batch.campaign,
        combinations = batch.combinations(),
        "Creating placements"
    );
    state.engine().create_placements(&batch).await.map(Json).map_err(app_error)
}

pub async fn cleanup_placements(
    State(state): State<AppState>,
    Json(req): Json<CleanupPlacementsRequest>,
) -> Result<Json<CleanupReport>, ApiError> {
    let batch = batch(req.campaign_id, req.advertisement_ids, req.zone_ids)?;
    tracing::info!(campaign = %batch.campaign, "Cleaning up placements");
    state.engine().cleanup_placements(&batch).await.map(Json).map_err(app_error)
}
