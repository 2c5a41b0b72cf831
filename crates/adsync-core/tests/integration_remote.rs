#![allow(clippy::tests_outside_test_module, reason = "integration tests live in tests/ dir")]
#![allow(clippy::expect_used, reason = "integration test, panics are the assertion mechanism")]

use adsync_core::remote::{build_http_client, AdServerApi, HttpAdServerClient, RemoteRoute};
use adsync_types::models::RemoteConfig;
use adsync_types::RemoteError;
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "test-token";

fn client_for(server: &MockServer) -> HttpAdServerClient {
    let config = RemoteConfig {
        base_url: format!("{}/api/1/", server.uri()),
        access_token: TOKEN.to_string(),
        request_timeout_secs: 5,
        connect_timeout_secs: 2,
    };
    HttpAdServerClient::from_config(&config).expect("client builds")
}

#[tokio::test]
async fn test_create_wraps_body_and_reads_enveloped_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/1/networks/9001/zones"))
        .and(query_param("access_token", TOKEN))
        .and(body_json(json!({"zone": {"name": "Sidebar", "network_id": 9001}})))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"zone": {"id": 182864, "name": "Sidebar"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let record = client_for(&server)
        .create(&RemoteRoute::Zones { network: 9001 }, json!({"name": "Sidebar", "network_id": 9001}))
        .await
        .expect("create succeeds");

    assert_eq!(record.id, 182864);
    assert_eq!(record.body["name"], "Sidebar");
}

#[tokio::test]
async fn test_create_falls_back_to_top_level_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/1/networks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "9001", "name": "Main"})))
        .mount(&server)
        .await;

    let record = client_for(&server)
        .create(&RemoteRoute::Networks, json!({"name": "Main"}))
        .await
        .expect("create succeeds");
    assert_eq!(record.id, 9001);
}

#[tokio::test]
async fn test_update_uses_put_with_id() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/1/networks/9001/advertisers/12/campaigns/77"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let record = client_for(&server)
        .update(&RemoteRoute::Campaigns { network: 9001, advertiser: 12 }, 77, json!({"name": "Spring"}))
        .await
        .expect("update succeeds");
    assert_eq!(record.id, 77);
}

#[tokio::test]
async fn test_non_success_status_is_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/1/networks/9001/advertisers"))
        .respond_with(ResponseTemplate::new(422).set_body_string("name has already been taken"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .create(&RemoteRoute::Advertisers { network: 9001 }, json!({"name": "Acme"}))
        .await
        .expect_err("422 must fail");

    match err {
        RemoteError::Status { status, body } => {
            assert_eq!(status, 422);
            assert!(body.contains("already been taken"));
        },
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_id_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/1/networks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"network": {"name": "Main"}})))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .create(&RemoteRoute::Networks, json!({"name": "Main"}))
        .await
        .expect_err("no id");
    assert!(matches!(err, RemoteError::MalformedResponse { .. }));
}

#[tokio::test]
async fn test_fetch_campaign_404_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/1/campaigns/404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/1/campaigns/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "campaign": {"id": 5, "name": "Remote", "network_id": 9001, "advertiser_id": 12}
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.fetch_campaign(404).await.expect_err("missing campaign");
    assert_eq!(err, RemoteError::NotFound { kind: "campaign".to_string(), id: 404 });

    let found = client.fetch_campaign(5).await.expect("existing campaign");
    assert_eq!(found.body["advertiser_id"], 12);
}

#[tokio::test]
async fn test_list_accepts_collection_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/1/networks/9001/zones"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "zones": [{"zone": {"id": 1, "name": "A"}}, {"id": 2, "name": "B"}, {"name": "no id"}]
        })))
        .mount(&server)
        .await;

    let records = client_for(&server)
        .list(&RemoteRoute::Zones { network: 9001 })
        .await
        .expect("list succeeds");
    let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 2]);
}

#[tokio::test]
async fn test_unreachable_remote_is_transport_error() {
    let config = RemoteConfig {
        base_url: "http://127.0.0.1:9".to_string(),
        connect_timeout_secs: 1,
        request_timeout_secs: 1,
        ..RemoteConfig::default()
    };
    let http = build_http_client(&config).expect("client builds");
    let client = HttpAdServerClient::new(http, config.base_url, "");

    let err = client.create(&RemoteRoute::Networks, json!({"name": "x"})).await.expect_err("offline");
    assert!(matches!(err, RemoteError::Transport { .. }));
}
