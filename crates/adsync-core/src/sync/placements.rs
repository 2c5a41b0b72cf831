//! Placements: the unified two-backend view, the combinator and its inverse,
//! and the pipeline step that pushes pending placements.

use chrono::NaiveDate;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};

use adsync_types::models::{
    Campaign, CleanupReport, CombinationError, CombinatorReport, DeletedCounts, Entity,
    EntityKind, EntityRef, LocalId, Placement, PlacementBatch, PlacementKey, PlacementLocation,
    RemoteId, SyncErrorEntry, SyncMeta, SyncOutcome, SyncResult,
};
use adsync_types::SyncError;

use super::gate::RequestGate;
use super::index::IdIndex;
use super::kinds::{placement_target, RemoteTarget};
use crate::error::{AppError, AppResult};
use crate::metrics::record_sync_result;
use crate::modules::{RepoResult, StoredPlacement, SyncRepository};
use crate::remote::{id_from_value, RemoteRecord};

/// Every stored placement with its canonical key, standalone first.
pub struct PlacementSet {
    entries: Vec<(PlacementKey, StoredPlacement)>,
}

impl PlacementSet {
    pub async fn load(store: &dyn SyncRepository, index: &IdIndex) -> RepoResult<Self> {
        let stored = store.list_placements().await?;
        Ok(Self::from_stored(stored, index))
    }

    pub fn from_stored(stored: Vec<StoredPlacement>, index: &IdIndex) -> Self {
        let entries = stored.into_iter().map(|s| (index.placement_key(&s.placement), s)).collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &PlacementKey) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(PlacementKey, StoredPlacement)> {
        self.entries.iter()
    }

    pub fn matching<'a>(&'a self, keys: &'a HashSet<PlacementKey>) -> impl Iterator<Item = &'a StoredPlacement> {
        self.entries.iter().filter(|(k, _)| keys.contains(k)).map(|(_, s)| s)
    }

    /// Second and later occurrences of any key.
    pub fn duplicates(&self) -> Vec<&StoredPlacement> {
        let mut seen = HashSet::new();
        self.entries.iter().filter(|(k, _)| !seen.insert(*k)).map(|(_, s)| s).collect()
    }

    /// Placements whose campaign (canonically) is `campaign`.
    pub fn count_for_campaign(&self, campaign: EntityRef) -> usize {
        self.entries.iter().filter(|(k, _)| k.campaign == campaign).count()
    }
}

/// Delete the given placements, grouped per backend; returns the number removed.
pub async fn delete_stored(
    store: &dyn SyncRepository,
    doomed: &[&StoredPlacement],
) -> RepoResult<usize> {
    let mut by_location: HashMap<PlacementLocation, Vec<LocalId>> = HashMap::new();
    for stored in doomed {
        by_location.entry(stored.location).or_default().push(stored.placement.meta.local_id);
    }
    let mut removed = 0;
    for (location, ids) in by_location {
        removed += store.delete_placements(location, &ids).await?;
    }
    Ok(removed)
}

/// Remove campaign mirrors that no placement references any more; returns how many went.
pub async fn delete_empty_mirrors(
    store: &dyn SyncRepository,
    candidates: impl IntoIterator<Item = LocalId>,
) -> RepoResult<usize> {
    let index = IdIndex::load(store).await?;
    let set = PlacementSet::load(store, &index).await?;
    let mut deleted = 0;
    for id in candidates.into_iter().collect::<HashSet<_>>() {
        if !index.is_mirror(id) {
            continue;
        }
        let key = index.canonical(EntityKind::Campaign, EntityRef::Local(id));
        if set.count_for_campaign(key) == 0 && store.delete(EntityKind::Campaign, id).await? {
            tracing::info!("Deleted campaign mirror {} with no placements", id);
            deleted += 1;
        }
    }
    Ok(deleted)
}

fn mirror_from_remote(record: &RemoteRecord) -> AppResult<Campaign> {
    let body = &record.body;
    let reference = |keys: [&str; 2]| {
        keys.iter().find_map(|k| body.get(*k).and_then(id_from_value)).map(EntityRef::Remote)
    };
    let network = reference(["network_id", "network"]).ok_or_else(|| {
        AppError::InvalidInput(format!("remote campaign {} has no network", record.id))
    })?;
    let advertiser = reference(["advertiser_id", "advertiser"]).ok_or_else(|| {
        AppError::InvalidInput(format!("remote campaign {} has no advertiser", record.id))
    })?;
    let text = |key: &str| body.get(key).and_then(Value::as_str).map(str::to_string);
    let date = |key: &str| text(key).and_then(|s| s.get(..10).and_then(|d| d.parse::<NaiveDate>().ok()));

    Ok(Campaign {
        meta: SyncMeta::mirror(record.id),
        network,
        advertiser,
        name: text("name").unwrap_or_else(|| format!("Campaign {}", record.id)),
        start_date: date("start_date"),
        end_date: date("end_date"),
        max_impression_count: body.get("max_impression_count").and_then(Value::as_i64),
        weight: body.get("weight").and_then(Value::as_i64).and_then(|w| i32::try_from(w).ok()),
        active: body.get("active").and_then(Value::as_bool).unwrap_or(true),
        notes: None,
        placements: Vec::new(),
    })
}

/// Builds and removes placement cross products.
pub struct PlacementCombinator<'a> {
    store: &'a dyn SyncRepository,
    gate: &'a RequestGate,
}

impl<'a> PlacementCombinator<'a> {
    pub fn new(store: &'a dyn SyncRepository, gate: &'a RequestGate) -> Self {
        Self { store, gate }
    }

    /// Local campaign record for `campaign` and where its placements are stored.
    ///
    /// A remote campaign without a local twin gets a mirror built from a remote lookup;
    /// the flag is set when that mirror was created by this call.
    async fn resolve_campaign(
        &self,
        campaign: EntityRef,
        index: &IdIndex,
    ) -> AppResult<(LocalId, PlacementLocation, bool)> {
        if let Some(id) = index.local_id(EntityKind::Campaign, campaign) {
            let location = if index.is_mirror(id) {
                PlacementLocation::Embedded { campaign: id }
            } else {
                PlacementLocation::Standalone
            };
            return Ok((id, location, false));
        }

        let EntityRef::Remote(remote_id) = campaign else {
            return Err(AppError::InvalidInput(format!("campaign {campaign} does not exist")));
        };
        let mirror = self.build_mirror(remote_id).await?;
        let id = mirror.meta.local_id;
        self.store.insert(Entity::Campaign(mirror)).await?;
        tracing::info!("Created campaign mirror {} for remote campaign {}", id, remote_id);
        Ok((id, PlacementLocation::Embedded { campaign: id }, true))
    }

    async fn build_mirror(&self, remote_id: RemoteId) -> AppResult<Campaign> {
        let api = self.gate.acquire().await?;
        let record = api.fetch_campaign(remote_id).await?;
        drop(api);
        mirror_from_remote(&record)
    }

    /// Create the missing part of `ads × zones` for one campaign.
    pub async fn create_placements(&self, batch: &PlacementBatch) -> AppResult<CombinatorReport> {
        let index = IdIndex::load(self.store).await?;
        let (campaign_id, location, new_mirror) =
            self.resolve_campaign(batch.campaign, &index).await?;
        // A new mirror changes the index.
        let index = IdIndex::load(self.store).await?;
        let set = PlacementSet::load(self.store, &index).await?;
        let campaign = index.canonical(EntityKind::Campaign, batch.campaign);

        let mut report = CombinatorReport::default();
        let zones: Vec<EntityRef> = dedup(&batch.zones);
        report.zones_matched =
            zones.iter().filter(|z| index.exists(EntityKind::Zone, **z)).count();

        let mut produced: HashSet<PlacementKey> = HashSet::new();
        for advertisement in dedup(&batch.advertisements) {
            for zone in &zones {
                let key = PlacementKey {
                    advertisement: index.canonical(EntityKind::Advertisement, advertisement),
                    zone: index.canonical(EntityKind::Zone, *zone),
                    campaign,
                };
                if set.contains(&key) || produced.contains(&key) {
                    continue;
                }
                let error = |message: String| CombinationError {
                    advertisement_id: advertisement,
                    zone_id: *zone,
                    message,
                };
                if !index.exists(EntityKind::Advertisement, advertisement) {
                    report.errors.push(error(format!("advertisement {advertisement} does not exist")));
                    continue;
                }
                if !index.exists(EntityKind::Zone, *zone) {
                    report.errors.push(error(format!("zone {zone} does not exist")));
                    continue;
                }

                let placement = Placement::new_local(key.advertisement, key.zone, key.campaign);
                match self.store.insert_placement(location, placement).await {
                    Ok(placement) => {
                        produced.insert(key);
                        report.created += 1;
                        report.placements.push(placement);
                    },
                    Err(e) => {
                        tracing::warn!("Failed to create placement {}: {}", key, e);
                        report.errors.push(error(e.to_string()));
                    },
                }
            }
        }

        if new_mirror && report.created == 0 {
            delete_empty_mirrors(self.store, [campaign_id]).await?;
        }

        tracing::info!(
            "Created {} of {} placements for campaign {}",
            report.created,
            batch.combinations(),
            batch.campaign
        );
        Ok(report)
    }

    /// Exact inverse: remove only the given triples, then mirrors left without placements.
    pub async fn cleanup_placements(&self, batch: &PlacementBatch) -> AppResult<CleanupReport> {
        let index = IdIndex::load(self.store).await?;
        let set = PlacementSet::load(self.store, &index).await?;
        let campaign = index.canonical(EntityKind::Campaign, batch.campaign);

        let keys: HashSet<PlacementKey> = batch
            .advertisements
            .iter()
            .flat_map(|ad| {
                batch.zones.iter().map(|zone| PlacementKey {
                    advertisement: index.canonical(EntityKind::Advertisement, *ad),
                    zone: index.canonical(EntityKind::Zone, *zone),
                    campaign,
                })
            })
            .collect();

        let doomed: Vec<&StoredPlacement> = set.matching(&keys).collect();
        let mut touched: Vec<LocalId> = doomed
            .iter()
            .filter_map(|s| match s.location {
                PlacementLocation::Embedded { campaign } => Some(campaign),
                PlacementLocation::Standalone => None,
            })
            .collect();
        touched.extend(index.local_id(EntityKind::Campaign, batch.campaign));

        let placements = delete_stored(self.store, &doomed).await?;
        let campaigns = delete_empty_mirrors(self.store, touched).await?;
        tracing::info!(
            "Placement cleanup for campaign {}: {} placements, {} mirrors removed",
            batch.campaign,
            placements,
            campaigns
        );
        Ok(CleanupReport { deleted: DeletedCounts { placements, campaigns } })
    }
}

fn dedup(refs: &[EntityRef]) -> Vec<EntityRef> {
    let mut seen = HashSet::new();
    refs.iter().copied().filter(|r| seen.insert(*r)).collect()
}

/// Pipeline step: push pending placements in scope.
pub struct PlacementSyncer<'a> {
    store: &'a dyn SyncRepository,
    gate: &'a RequestGate,
}

impl<'a> PlacementSyncer<'a> {
    pub fn new(store: &'a dyn SyncRepository, gate: &'a RequestGate) -> Self {
        Self { store, gate }
    }

    pub async fn sync(&self, scope: Option<EntityRef>) -> AppResult<Vec<SyncResult>> {
        let index = IdIndex::load(self.store).await?;
        let pending: Vec<StoredPlacement> = self
            .store
            .list_placements()
            .await?
            .into_iter()
            .filter(|s| s.placement.meta.is_pending())
            .filter(|s| index.placement_in_scope(&s.placement, scope))
            .collect();

        tracing::info!("Syncing {} pending placements", pending.len());
        let mut results = Vec::with_capacity(pending.len());
        for stored in &pending {
            let result = self.sync_one(stored, &index).await;
            record_sync_result("placement", result.outcome.as_str());
            results.push(result);
        }
        Ok(results)
    }

    async fn sync_one(&self, stored: &StoredPlacement, index: &IdIndex) -> SyncResult {
        let placement = &stored.placement;
        let local_entity = serde_json::to_value(placement).unwrap_or(Value::Null);
        let label = format!("placement {} ({})", placement.meta.local_id, placement.raw_key());

        let target = match placement_target(placement, index) {
            Ok(target) => target,
            Err(missing) => {
                let reason = SyncError::DependencyBlocked { entity: label, missing: missing.describe() };
                return SyncResult::blocked(local_entity, reason.to_string());
            },
        };

        match self.push(stored, target).await {
            Ok((outcome, body)) => SyncResult::pushed(outcome, local_entity, body),
            Err(err) => {
                let err = err.into_sync_error();
                tracing::warn!("Failed to sync {}: {}", label, err);
                let entry = SyncErrorEntry::now(err.code(), err.to_string());
                if let Err(e) = self
                    .store
                    .append_placement_error(stored.location, placement.meta.local_id, entry)
                    .await
                {
                    tracing::error!("Could not record sync error on {}: {}", label, e);
                }
                SyncResult::failed(local_entity, err.code(), err.to_string())
            },
        }
    }

    async fn push(
        &self,
        stored: &StoredPlacement,
        target: RemoteTarget,
    ) -> AppResult<(SyncOutcome, Value)> {
        let id = stored.placement.meta.local_id;
        let api = self.gate.acquire().await?;
        let current = self
            .store
            .get_placement(stored.location, id)
            .await?
            .ok_or_else(|| AppError::InvalidInput(format!("placement {id} disappeared")))?;

        // Placements are create-only remotely; an existing twin only needs the local flag.
        if let Some(remote_id) = current.meta.remote_id {
            self.store.mark_placement_synced(stored.location, id, remote_id).await?;
            return Ok((SyncOutcome::Updated, serde_json::json!({ "id": remote_id })));
        }

        let record = api.create(&target.route, target.fields).await?;
        if let Err(e) = self.store.mark_placement_synced(stored.location, id, record.id).await {
            tracing::error!(
                remote_id = record.id,
                "Placement {} was created remotely but could not be marked synced: {}",
                id,
                e
            );
            return Err(AppError::Sync(SyncError::Store {
                message: format!("created remotely as {} but local update failed: {}", record.id, e),
            }));
        }
        Ok((SyncOutcome::Created, record.body))
    }
}

/// Keys that occur more than once, with their occurrence counts.
pub fn duplicate_keys(set: &PlacementSet) -> BTreeMap<PlacementKey, usize> {
    let mut counts: BTreeMap<PlacementKey, usize> = BTreeMap::new();
    for (key, _) in set.iter() {
        *counts.entry(*key).or_default() += 1;
    }
    counts.retain(|_, n| *n > 1);
    counts
}

#[cfg(test)]
#[path = "placements_tests.rs"]
mod tests;
