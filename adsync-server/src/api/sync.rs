//! Sync pipeline handlers: synchronous runs, dry runs and the SSE progress stream.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::{wrappers::UnboundedReceiverStream, Stream, StreamExt};

use adsync_core::sync::GateStatus;
use adsync_core::RunOptions;
use adsync_types::models::{DryRunReport, PendingCounts};
use adsync_types::{EntityRef, SyncReport};

use super::{app_error, error_response, ApiError};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkQuery {
    pub network_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    #[serde(default)]
    pub network_id: Option<EntityRef>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DryRunResponse {
    pub success: bool,
    pub dry_run: DryRunReport,
}

fn parse_network(raw: Option<&str>) -> Result<Option<EntityRef>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|e| error_response(StatusCode::BAD_REQUEST, format!("Invalid networkId: {e}"))),
    }
}

/// 200 on success, 400 when the dry run refused the pipeline, 500 when a step failed.
fn report_status(report: &SyncReport) -> StatusCode {
    if report.success {
        StatusCode::OK
    } else if report.aborted {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

pub async fn sync_all(
    State(state): State<AppState>,
    body: Option<Json<SyncRequest>>,
) -> (StatusCode, Json<SyncReport>) {
    let requested = body.and_then(|Json(b)| b.network_id);
    let report = state.engine().sync_all(state.scope(requested)).await;
    (report_status(&report), Json(report))
}

pub async fn sync_local_all(
    State(state): State<AppState>,
    body: Option<Json<SyncRequest>>,
) -> (StatusCode, Json<SyncReport>) {
    let requested = body.and_then(|Json(b)| b.network_id);
    let report = state.engine().sync_local_all(state.scope(requested)).await;
    (report_status(&report), Json(report))
}

pub async fn dry_run_all(
    State(state): State<AppState>,
    Query(query): Query<NetworkQuery>,
) -> Result<Json<DryRunResponse>, ApiError> {
    let scope = state.scope(parse_network(query.network_id.as_deref())?);
    let dry_run = state.engine().dry_run(scope).await.map_err(app_error)?;
    Ok(Json(DryRunResponse { success: dry_run.valid, dry_run }))
}

pub async fn sync_stream(
    State(state): State<AppState>,
    Query(query): Query<NetworkQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let scope = state.scope(parse_network(query.network_id.as_deref())?);
    let rx = state.engine().stream(RunOptions { scope, fallback: false });

    let events = UnboundedReceiverStream::new(rx).filter_map(|event| {
        match Event::default().event(event.kind.as_str()).json_data(&event) {
            Ok(sse) => Some(Ok(sse)),
            Err(e) => {
                tracing::warn!("Dropping unserializable progress event: {}", e);
                None
            },
        }
    });
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

pub async fn queue_status(State(state): State<AppState>) -> Json<GateStatus> {
    Json(state.engine().gate_status())
}

pub async fn pending_counts(
    State(state): State<AppState>,
    Query(query): Query<NetworkQuery>,
) -> Result<Json<PendingCounts>, ApiError> {
    let scope = state.scope(parse_network(query.network_id.as_deref())?);
    state.engine().pending(scope).await.map(Json).map_err(app_error)
}
