use axum::http::StatusCode;
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use adsync_core::modules::SyncRepository;
use adsync_types::EntityRef;

use crate::test_helpers::{
    draft_advertiser, draft_campaign, draft_network, local, test_app_state, test_server, StubAdServer,
};

#[tokio::test]
async fn test_sync_all_pushes_pending_entities() {
    let api = Arc::new(StubAdServer::default());
    let (state, store) = test_app_state(Arc::clone(&api));
    let net = draft_network("Draft");
    store.insert(net.clone()).await.unwrap();
    store.insert(draft_advertiser(local(&net), "Acme")).await.unwrap();

    let response = test_server(state).post("/api/sync/all").json(&json!({})).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["results"]["networks"]["created"], 1);
    assert_eq!(body["results"]["advertisers"]["created"], 1);
    assert_eq!(api.creates.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_sync_all_without_body_uses_all_networks() {
    let (state, _store) = test_app_state(Arc::new(StubAdServer::default()));
    let response = test_server(state).post("/api/sync/all").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["results"].as_object().map(|r| r.len()), Some(7));
}

#[tokio::test]
async fn test_validation_failure_is_400() {
    let api = Arc::new(StubAdServer::default());
    let (state, store) = test_app_state(Arc::clone(&api));
    let net = draft_network("Draft");
    store.insert(net.clone()).await.unwrap();
    store
        .insert(draft_campaign(local(&net), EntityRef::Local(uuid::Uuid::new_v4()), "Orphan"))
        .await
        .unwrap();

    let response = test_server(state).post("/api/sync/all").json(&json!({})).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["aborted"], true);
    assert_eq!(body["dryRun"]["valid"], false);
    assert_eq!(api.creates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failed_step_is_500() {
    let api = Arc::new(StubAdServer::default());
    api.fail_creates.store(true, Ordering::SeqCst);
    let (state, store) = test_app_state(Arc::clone(&api));
    store.insert(draft_network("Draft")).await.unwrap();

    let response = test_server(state).post("/api/sync/local-all").json(&json!({})).await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["results"]["networks"]["failed"], 1);
}

#[tokio::test]
async fn test_dry_run_get_reports_pending() {
    let (state, store) = test_app_state(Arc::new(StubAdServer::default()));
    store.insert(draft_network("Draft")).await.unwrap();

    let server = test_server(state);
    for path in ["/api/sync/all", "/api/sync/local-all"] {
        let response = server.get(path).await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["success"], true);
        assert_eq!(body["dryRun"]["pending"]["networks"], 1);
    }
}

#[tokio::test]
async fn test_invalid_network_id_is_400() {
    let (state, _store) = test_app_state(Arc::new(StubAdServer::default()));
    let response = test_server(state).get("/api/sync/pending").add_query_param("networkId", "main").await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_pending_is_scoped_by_network() {
    let (state, store) = test_app_state(Arc::new(StubAdServer::default()));
    let net = draft_network("Draft");
    store.insert(net.clone()).await.unwrap();
    store.insert(draft_network("Other")).await.unwrap();

    let server = test_server(state);
    let all: Value = server.get("/api/sync/pending").await.json();
    assert_eq!(all["networks"], 2);

    let scoped: Value = server
        .get("/api/sync/pending")
        .add_query_param("networkId", net.local_id().to_string())
        .await
        .json();
    assert_eq!(scoped["networks"], 1);
}

#[tokio::test]
async fn test_queue_status_shape() {
    let (state, _store) = test_app_state(Arc::new(StubAdServer::default()));
    let response = test_server(state).get("/api/sync/queue-status").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["canMakeRequest"], true);
    assert_eq!(body["queueDepth"], 0);
    assert!(body["timeSinceLastRequest"].is_null());
}

#[tokio::test]
async fn test_stream_emits_named_events_until_complete() {
    let (state, store) = test_app_state(Arc::new(StubAdServer::default()));
    store.insert(draft_network("Draft")).await.unwrap();

    let response = test_server(state).get("/api/sync/stream").await;

    response.assert_status_ok();
    let text = response.text();
    assert!(text.contains("event: status"));
    assert!(text.contains("event: step-start"));
    assert!(text.contains("event: step-complete"));
    assert!(text.trim_end().lines().rev().any(|l| l == "event: complete"));
    assert!(!text.contains("event: error"));
}

#[tokio::test]
async fn test_unknown_api_path_is_404() {
    let (state, _store) = test_app_state(Arc::new(StubAdServer::default()));
    test_server(state).get("/api/nope").await.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_and_version_are_public() {
    let (state, _store) = test_app_state(Arc::new(StubAdServer::default()));
    let server = test_server(state);
    let health: Value = server.get("/healthz").await.json();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["remoteBusy"], false);
    assert_eq!(health["queueDepth"], 0);
    let version: Value = server.get("/version").await.json();
    assert_eq!(version["name"], "adsync-server");
    assert_eq!(version["cargo_version"], env!("CARGO_PKG_VERSION"));
}
