use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api;
use crate::state::AppState;

/// `/api/*` plus the unauthenticated probes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api::router())
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/version", get(version))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Liveness plus whether a remote call is currently holding the gate.
async fn health(State(state): State<AppState>) -> Json<Value> {
    let gate = state.engine().gate_status();
    Json(json!({
        "status": "ok",
        "uptimeSecs": state.uptime_secs(),
        "remoteBusy": gate.in_flight,
        "queueDepth": gate.queue_depth,
    }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": option_env!("GIT_VERSION").unwrap_or("dev"),
        "build_time": option_env!("BUILD_TIME").unwrap_or("unknown"),
        "cargo_version": env!("CARGO_PKG_VERSION"),
    }))
}
