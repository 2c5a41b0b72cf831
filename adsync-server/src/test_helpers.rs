//! Test helpers for adsync-server unit tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use adsync_core::modules::{MemoryRepository, SyncRepository};
use adsync_core::remote::{AdServerApi, RemoteRecord, RemoteRoute};
use adsync_core::sync::RequestGate;
use adsync_core::SyncEngine;
use adsync_types::models::{Advertiser, Campaign, Entity, EntityRef, Network, RemoteId, SyncMeta};
use adsync_types::RemoteError;

use crate::state::AppState;

/// Remote stand-in: sequential ids, a fixed campaign catalogue.
#[derive(Default)]
pub struct StubAdServer {
    next_id: AtomicI64,
    pub creates: AtomicUsize,
    pub fail_creates: AtomicBool,
    campaigns: Mutex<HashMap<RemoteId, Value>>,
}

impl StubAdServer {
    pub fn with_campaign(self, id: RemoteId) -> Self {
        if let Ok(mut campaigns) = self.campaigns.lock() {
            campaigns.insert(id, json!({"id": id, "name": "Remote", "network_id": 9001, "advertiser_id": 12}));
        }
        self
    }
}

#[async_trait]
impl AdServerApi for StubAdServer {
    async fn create(&self, _route: &RemoteRoute, fields: Value) -> Result<RemoteRecord, RemoteError> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(RemoteError::status(500, "stub failure"));
        }
        self.creates.fetch_add(1, Ordering::SeqCst);
        let id = 7_000 + self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut body = fields;
        body["id"] = json!(id);
        Ok(RemoteRecord { id, body })
    }

    async fn update(&self, _route: &RemoteRoute, id: RemoteId, fields: Value) -> Result<RemoteRecord, RemoteError> {
        Ok(RemoteRecord { id, body: fields })
    }

    async fn fetch_campaign(&self, id: RemoteId) -> Result<RemoteRecord, RemoteError> {
        let body = self.campaigns.lock().ok().and_then(|c| c.get(&id).cloned());
        body.map(|body| RemoteRecord { id, body })
            .ok_or(RemoteError::NotFound { kind: "campaign".to_string(), id })
    }

    async fn list(&self, _route: &RemoteRoute) -> Result<Vec<RemoteRecord>, RemoteError> {
        Ok(Vec::new())
    }
}

/// State over an in-memory store and a zero-interval gate.
pub fn test_app_state(api: Arc<StubAdServer>) -> (AppState, Arc<MemoryRepository>) {
    let store = Arc::new(MemoryRepository::new());
    let gate = Arc::new(RequestGate::with_timing(api, Duration::ZERO, Duration::from_secs(5)));
    let engine = SyncEngine::new(Arc::clone(&store) as Arc<dyn SyncRepository>, gate);
    (AppState::with_engine(engine, None), store)
}

pub fn test_server(state: AppState) -> axum_test::TestServer {
    axum_test::TestServer::new(crate::router::build_router(state)).expect("failed to start test server")
}

pub fn draft_network(name: &str) -> Entity {
    Entity::Network(Network { meta: SyncMeta::new_local(), name: name.to_string(), web_home_url: None, notes: None })
}

pub fn draft_advertiser(network: EntityRef, name: &str) -> Entity {
    Entity::Advertiser(Advertiser {
        meta: SyncMeta::new_local(),
        network,
        name: name.to_string(),
        web_home_url: None,
        notes: None,
    })
}

pub fn draft_campaign(network: EntityRef, advertiser: EntityRef, name: &str) -> Entity {
    Entity::Campaign(Campaign {
        meta: SyncMeta::new_local(),
        network,
        advertiser,
        name: name.to_string(),
        start_date: None,
        end_date: None,
        max_impression_count: None,
        weight: None,
        active: true,
        notes: None,
        placements: Vec::new(),
    })
}

pub fn local(entity: &Entity) -> EntityRef {
    EntityRef::Local(entity.local_id())
}
