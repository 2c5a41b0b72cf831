//! Detached post-sync consistency check.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

use adsync_types::models::EntityRef;

use super::index::IdIndex;
use super::placements::{duplicate_keys, PlacementSet};
use super::validator::DryRunValidator;
use crate::modules::{RepoResult, SyncRepository};

/// What one background pass found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackgroundValidation {
    pub valid: bool,
    pub errors: usize,
    pub warnings: usize,
    pub duplicate_triples: usize,
}

#[derive(Clone)]
pub struct ValidationTrigger {
    store: Arc<dyn SyncRepository>,
    running: Arc<DashMap<String, ()>>,
}

/// Removes the scope key when the task ends, panics included.
struct RunningGuard {
    running: Arc<DashMap<String, ()>>,
    key: String,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.running.remove(&self.key);
    }
}

fn scope_key(scope: Option<EntityRef>) -> String {
    scope.map_or_else(|| "all".to_string(), |s| s.to_string())
}

impl ValidationTrigger {
    pub fn new(store: Arc<dyn SyncRepository>) -> Self {
        Self { store, running: Arc::new(DashMap::new()) }
    }

    pub fn is_running(&self, scope: Option<EntityRef>) -> bool {
        self.running.contains_key(&scope_key(scope))
    }

    /// Fire and forget. Returns `None` when a validation for `scope` is already in flight.
    pub fn start(&self, scope: Option<EntityRef>) -> Option<JoinHandle<Option<BackgroundValidation>>> {
        let key = scope_key(scope);
        match self.running.entry(key.clone()) {
            Entry::Occupied(_) => {
                tracing::debug!("Background validation for {} already running, skipping", key);
                return None;
            },
            Entry::Vacant(slot) => {
                slot.insert(());
            },
        }

        let guard = RunningGuard { running: Arc::clone(&self.running), key };
        let store = Arc::clone(&self.store);
        Some(tokio::spawn(async move {
            match check(store.as_ref(), scope).await {
                Ok(found) => {
                    if found.valid && found.duplicate_triples == 0 {
                        tracing::info!(
                            warnings = found.warnings,
                            "Background validation for {} passed",
                            guard.key
                        );
                    } else {
                        tracing::warn!(
                            errors = found.errors,
                            duplicates = found.duplicate_triples,
                            "Background validation for {} found problems",
                            guard.key
                        );
                    }
                    Some(found)
                },
                Err(e) => {
                    tracing::error!("Background validation for {} failed: {}", guard.key, e);
                    None
                },
            }
        }))
    }
}

async fn check(store: &dyn SyncRepository, scope: Option<EntityRef>) -> RepoResult<BackgroundValidation> {
    let report = DryRunValidator::new(store).validate(scope).await?;
    let index = IdIndex::load(store).await?;
    let set = PlacementSet::load(store, &index).await?;
    let duplicates = duplicate_keys(&set);
    for (key, count) in &duplicates {
        tracing::warn!(
            "Placement {}/{}/{} stored {} times",
            key.advertisement,
            key.zone,
            key.campaign,
            count
        );
    }
    Ok(BackgroundValidation {
        valid: report.valid,
        errors: report.errors.len(),
        warnings: report.warnings.len(),
        duplicate_triples: duplicates.len(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::modules::MemoryRepository;
    use crate::test_support::{local, remote_network, zone, FailingRepository};
    use adsync_types::models::{Placement, PlacementLocation};
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_reports_duplicate_triples() {
        let store = Arc::new(MemoryRepository::new());
        let net = remote_network("Main", 9001);
        store.insert(net.clone()).await.unwrap();
        store.insert(zone(local(&net), "Sidebar", Some("side"))).await.unwrap();
        for _ in 0..2 {
            let p = Placement::new_local(EntityRef::Remote(1), EntityRef::Remote(2), EntityRef::Remote(3));
            store.insert_placement(PlacementLocation::Standalone, p).await.unwrap();
        }

        let trigger = ValidationTrigger::new(store);
        let found = trigger.start(None).unwrap().await.unwrap().unwrap();
        assert!(found.valid);
        assert_eq!(found.duplicate_triples, 1);
        assert!(!trigger.is_running(None));
    }

    #[tokio::test]
    async fn test_second_start_for_same_scope_is_skipped() {
        let store = Arc::new(MemoryRepository::new());
        let trigger = ValidationTrigger::new(store);
        trigger.running.insert(scope_key(Some(EntityRef::Remote(9001))), ());

        assert!(trigger.start(Some(EntityRef::Remote(9001))).is_none());
        let other = trigger.start(Some(EntityRef::Remote(9002))).unwrap();
        assert!(other.await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failure_is_swallowed_and_slot_released() {
        let store = Arc::new(FailingRepository::new());
        store.fail_list_placements.store(true, Ordering::SeqCst);

        let trigger = ValidationTrigger::new(store);
        let found = trigger.start(None).unwrap().await.unwrap();
        assert!(found.is_none());
        assert!(!trigger.is_running(None));
    }
}
