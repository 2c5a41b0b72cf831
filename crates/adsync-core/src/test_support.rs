//! Fakes and fixtures shared by the engine tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use adsync_types::models::{
    Advertisement, Advertiser, Campaign, Entity, EntityKind, EntityRef, LocalId, Network,
    Placement, PlacementLocation, RemoteId, SyncErrorEntry, SyncEvent, SyncMeta, Zone,
};
use adsync_types::RemoteError;

use crate::modules::{
    EntityFilter, MemoryRepository, RepoResult, RepositoryError, StoredPlacement, SyncRepository,
};
use crate::remote::{AdServerApi, RemoteRecord, RemoteRoute};
use crate::sync::{ProgressSink, RequestGate};

/// In-memory remote: assigns increasing ids and records every call.
pub struct FakeAdServer {
    next_id: AtomicI64,
    creates: parking_lot::Mutex<Vec<(String, Value)>>,
    updates: parking_lot::Mutex<Vec<(String, RemoteId)>>,
    failing_names: parking_lot::Mutex<HashSet<String>>,
    campaigns: parking_lot::Mutex<HashMap<RemoteId, Value>>,
}

impl FakeAdServer {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(5_000),
            creates: parking_lot::Mutex::new(Vec::new()),
            updates: parking_lot::Mutex::new(Vec::new()),
            failing_names: parking_lot::Mutex::new(HashSet::new()),
            campaigns: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Reject creates/updates whose `name` field equals `name`.
    pub fn fail_on_name(&self, name: &str) {
        self.failing_names.lock().insert(name.to_string());
    }

    pub fn add_campaign(&self, id: RemoteId, body: Value) {
        self.campaigns.lock().insert(id, body);
    }

    pub fn create_count(&self) -> usize {
        self.creates.lock().len()
    }

    pub fn creates_for(&self, resource: &str) -> usize {
        self.creates.lock().iter().filter(|(r, _)| r == resource).count()
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().len()
    }

    fn check(&self, fields: &Value) -> Result<(), RemoteError> {
        let name = fields.get("name").and_then(Value::as_str).unwrap_or_default();
        if self.failing_names.lock().contains(name) {
            return Err(RemoteError::status(422, "rejected by fake"));
        }
        Ok(())
    }
}

#[async_trait]
impl AdServerApi for FakeAdServer {
    async fn create(&self, route: &RemoteRoute, fields: Value) -> Result<RemoteRecord, RemoteError> {
        self.check(&fields)?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.creates.lock().push((route.resource().to_string(), fields.clone()));
        let mut body = fields;
        body["id"] = json!(id);
        Ok(RemoteRecord { id, body })
    }

    async fn update(
        &self,
        route: &RemoteRoute,
        id: RemoteId,
        fields: Value,
    ) -> Result<RemoteRecord, RemoteError> {
        self.check(&fields)?;
        self.updates.lock().push((route.resource().to_string(), id));
        let mut body = fields;
        body["id"] = json!(id);
        Ok(RemoteRecord { id, body })
    }

    async fn fetch_campaign(&self, id: RemoteId) -> Result<RemoteRecord, RemoteError> {
        self.campaigns
            .lock()
            .get(&id)
            .cloned()
            .map(|body| RemoteRecord { id, body })
            .ok_or(RemoteError::NotFound { kind: "campaign".to_string(), id })
    }

    async fn list(&self, route: &RemoteRoute) -> Result<Vec<RemoteRecord>, RemoteError> {
        Ok(self
            .creates
            .lock()
            .iter()
            .filter(|(r, _)| r == route.resource())
            .filter_map(|(_, body)| Some(RemoteRecord { id: body.get("id")?.as_i64()?, body: body.clone() }))
            .collect())
    }
}

/// Wraps a store and fails selected operations on demand.
pub struct FailingRepository {
    inner: MemoryRepository,
    pub fail_list_placements: AtomicBool,
    pub fail_mark_synced: AtomicBool,
    pub fail_delete_placements: AtomicBool,
    /// The first pending listing of each kind comes back empty.
    pub hide_first_pending_list: AtomicBool,
    pending_lists: parking_lot::Mutex<HashMap<EntityKind, usize>>,
}

impl FailingRepository {
    pub fn new() -> Self {
        Self {
            inner: MemoryRepository::new(),
            fail_list_placements: AtomicBool::new(false),
            fail_mark_synced: AtomicBool::new(false),
            fail_delete_placements: AtomicBool::new(false),
            hide_first_pending_list: AtomicBool::new(false),
            pending_lists: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// How often `kind` was listed with the pending filter.
    pub fn pending_list_count(&self, kind: EntityKind) -> usize {
        self.pending_lists.lock().get(&kind).copied().unwrap_or(0)
    }

    fn injected(flag: &AtomicBool, op: &str) -> RepoResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(format!("injected {op} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl SyncRepository for FailingRepository {
    async fn insert(&self, entity: Entity) -> RepoResult<Entity> {
        self.inner.insert(entity).await
    }

    async fn get(&self, kind: EntityKind, id: LocalId) -> RepoResult<Option<Entity>> {
        self.inner.get(kind, id).await
    }

    async fn find_by_remote_id(
        &self,
        kind: EntityKind,
        remote_id: RemoteId,
    ) -> RepoResult<Option<Entity>> {
        self.inner.find_by_remote_id(kind, remote_id).await
    }

    async fn list(&self, kind: EntityKind, filter: EntityFilter) -> RepoResult<Vec<Entity>> {
        if filter == EntityFilter::pending() {
            let calls = {
                let mut lists = self.pending_lists.lock();
                let calls = lists.entry(kind).or_default();
                *calls += 1;
                *calls
            };
            if calls == 1 && self.hide_first_pending_list.load(Ordering::SeqCst) {
                return Ok(Vec::new());
            }
        }
        self.inner.list(kind, filter).await
    }

    async fn mark_synced(
        &self,
        kind: EntityKind,
        id: LocalId,
        remote_id: RemoteId,
    ) -> RepoResult<()> {
        Self::injected(&self.fail_mark_synced, "mark_synced")?;
        self.inner.mark_synced(kind, id, remote_id).await
    }

    async fn append_sync_error(
        &self,
        kind: EntityKind,
        id: LocalId,
        entry: SyncErrorEntry,
    ) -> RepoResult<()> {
        self.inner.append_sync_error(kind, id, entry).await
    }

    async fn mark_dirty(&self, kind: EntityKind, id: LocalId) -> RepoResult<()> {
        self.inner.mark_dirty(kind, id).await
    }

    async fn delete(&self, kind: EntityKind, id: LocalId) -> RepoResult<bool> {
        self.inner.delete(kind, id).await
    }

    async fn insert_placement(
        &self,
        location: PlacementLocation,
        placement: Placement,
    ) -> RepoResult<Placement> {
        self.inner.insert_placement(location, placement).await
    }

    async fn get_placement(
        &self,
        location: PlacementLocation,
        id: LocalId,
    ) -> RepoResult<Option<Placement>> {
        self.inner.get_placement(location, id).await
    }

    async fn list_placements(&self) -> RepoResult<Vec<StoredPlacement>> {
        Self::injected(&self.fail_list_placements, "list_placements")?;
        self.inner.list_placements().await
    }

    async fn mark_placement_synced(
        &self,
        location: PlacementLocation,
        id: LocalId,
        remote_id: RemoteId,
    ) -> RepoResult<()> {
        self.inner.mark_placement_synced(location, id, remote_id).await
    }

    async fn append_placement_error(
        &self,
        location: PlacementLocation,
        id: LocalId,
        entry: SyncErrorEntry,
    ) -> RepoResult<()> {
        self.inner.append_placement_error(location, id, entry).await
    }

    async fn delete_placements(
        &self,
        location: PlacementLocation,
        ids: &[LocalId],
    ) -> RepoResult<usize> {
        Self::injected(&self.fail_delete_placements, "delete_placements")?;
        self.inner.delete_placements(location, ids).await
    }
}

/// Records every event it receives.
#[derive(Default)]
pub struct CollectingSink {
    pub events: parking_lot::Mutex<Vec<SyncEvent>>,
}

impl ProgressSink for CollectingSink {
    fn emit(&self, event: SyncEvent) {
        self.events.lock().push(event);
    }
}

/// A gate with no spacing so engine tests run instantly.
pub fn instant_gate(api: Arc<FakeAdServer>) -> Arc<RequestGate> {
    Arc::new(RequestGate::with_timing(api, Duration::ZERO, Duration::from_secs(5)))
}

pub fn network(name: &str) -> Entity {
    Entity::Network(Network { meta: SyncMeta::new_local(), name: name.to_string(), web_home_url: None, notes: None })
}

pub fn remote_network(name: &str, remote_id: RemoteId) -> Entity {
    let mut meta = SyncMeta::new_local();
    meta.mark_synced(remote_id);
    Entity::Network(Network { meta, name: name.to_string(), web_home_url: None, notes: None })
}

pub fn advertiser(network: EntityRef, name: &str) -> Entity {
    Entity::Advertiser(Advertiser {
        meta: SyncMeta::new_local(),
        network,
        name: name.to_string(),
        web_home_url: None,
        notes: None,
    })
}

pub fn zone(network: EntityRef, name: &str, alias: Option<&str>) -> Entity {
    Entity::Zone(Zone {
        meta: SyncMeta::new_local(),
        network,
        name: name.to_string(),
        alias: alias.map(str::to_string),
        width: Some(300),
        height: Some(250),
    })
}

pub fn campaign(network: EntityRef, advertiser: EntityRef, name: &str) -> Entity {
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

pub fn advertisement(network: EntityRef, advertiser: EntityRef, name: &str) -> Entity {
    Entity::Advertisement(Advertisement {
        meta: SyncMeta::new_local(),
        network,
        advertiser,
        name: name.to_string(),
        ad_type: "static".to_string(),
        destination_url: Some("https://example.test".to_string()),
        html: None,
        active: true,
    })
}

pub fn local(entity: &Entity) -> EntityRef {
    EntityRef::Local(entity.local_id())
}
