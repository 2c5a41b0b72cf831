//! API Routes
//!
//! REST endpoints for running syncs and managing placements.

mod placements;
mod sync;

#[cfg(test)]
mod sync_tests;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    routing::{delete, get, post},
    Router,
};
use serde::Serialize;

use adsync_core::sync::GateStatus;
use adsync_core::AppError;
use adsync_types::RemoteError;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(get_status))
        // Sync pipeline
        .route("/sync/all", get(sync::dry_run_all).post(sync::sync_all))
        .route("/sync/local-all", get(sync::dry_run_all).post(sync::sync_local_all))
        .route("/sync/stream", get(sync::sync_stream))
        .route("/sync/queue-status", get(sync::queue_status))
        .route("/sync/pending", get(sync::pending_counts))
        // Placements
        .route("/create/placements", post(placements::create_placements))
        .route("/placements/cleanup", delete(placements::cleanup_placements))
        // Prometheus metrics
        .route("/metrics", get(get_metrics))
        .fallback(api_not_found)
}

pub(crate) type ApiError = (StatusCode, Json<serde_json::Value>);

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(serde_json::json!({ "error": message.into() })))
}

/// Map engine errors onto HTTP statuses.
pub(crate) fn app_error(err: AppError) -> ApiError {
    let status = match &err {
        AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        AppError::Remote(RemoteError::NotFound { .. }) => StatusCode::NOT_FOUND,
        AppError::Remote(_) => StatusCode::BAD_GATEWAY,
        AppError::Gate(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!("Request failed: {}", err);
    }
    error_response(status, err.to_string())
}

async fn api_not_found() -> impl IntoResponse {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

#[derive(Serialize)]
struct StatusResponse {
    version: String,
    uptime_secs: u64,
    gate: GateStatus,
}

async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_secs(),
        gate: state.engine().gate_status(),
    })
}

async fn get_metrics() -> impl IntoResponse {
    let metrics = adsync_core::metrics::render();
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")], metrics)
}
