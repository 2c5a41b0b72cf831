//! Pipeline cleanup step: dangling and duplicate placements, empty mirrors.

use adsync_types::models::{EntityKind, StepReport, SyncStep};
use adsync_types::SyncError;

use super::index::IdIndex;
use super::placements::{delete_empty_mirrors, delete_stored, PlacementSet};
use crate::modules::{EntityFilter, RepoResult, StoredPlacement, SyncRepository};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupSummary {
    pub dangling: usize,
    pub duplicates: usize,
    pub mirrors: usize,
}

async fn clean(store: &dyn SyncRepository) -> RepoResult<CleanupSummary> {
    let index = IdIndex::load(store).await?;
    let set = PlacementSet::load(store, &index).await?;

    let dangling: Vec<&StoredPlacement> = set
        .iter()
        .filter(|(_, s)| index.dangling_reference(&s.placement).is_some())
        .map(|(_, s)| s)
        .collect();
    let duplicates: Vec<&StoredPlacement> = set
        .duplicates()
        .into_iter()
        .filter(|d| !dangling.iter().any(|s| s.placement.meta.local_id == d.placement.meta.local_id))
        .collect();

    let mut doomed = dangling.clone();
    doomed.extend(duplicates.iter().copied());
    delete_stored(store, &doomed).await?;

    let mirrors = store
        .list(EntityKind::Campaign, EntityFilter::mirrors())
        .await?
        .into_iter()
        .map(|m| m.local_id());
    let mirrors = delete_empty_mirrors(store, mirrors).await?;

    Ok(CleanupSummary { dangling: dangling.len(), duplicates: duplicates.len(), mirrors })
}

/// Any store failure here is fatal to the run.
pub async fn run_cleanup(store: &dyn SyncRepository) -> Result<StepReport, SyncError> {
    match clean(store).await {
        Ok(summary) => {
            tracing::info!(
                dangling = summary.dangling,
                duplicates = summary.duplicates,
                mirrors = summary.mirrors,
                "Cleanup finished"
            );
            let mut report = StepReport::from_results(SyncStep::Cleanup, Vec::new());
            report.count = summary.dangling + summary.duplicates + summary.mirrors;
            Ok(report)
        },
        Err(e) => {
            tracing::error!("Cleanup failed: {}", e);
            Err(SyncError::FatalCleanupFailure { message: e.to_string() })
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::modules::MemoryRepository;
    use crate::test_support::{advertisement, local, remote_network, zone, FailingRepository};
    use adsync_types::models::{
        Campaign, Entity, EntityRef, Placement, PlacementLocation, SyncMeta,
    };
    use std::sync::atomic::Ordering;

    fn mirror(remote_id: i64) -> Campaign {
        Campaign {
            meta: SyncMeta::mirror(remote_id),
            network: EntityRef::Remote(9001),
            advertiser: EntityRef::Remote(12),
            name: format!("Remote {remote_id}"),
            start_date: None,
            end_date: None,
            max_impression_count: None,
            weight: None,
            active: true,
            notes: None,
            placements: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_removes_dangling_duplicates_and_empty_mirrors() {
        let store = MemoryRepository::new();
        let net = remote_network("Main", 9001);
        let ad = advertisement(local(&net), EntityRef::Remote(12), "Banner");
        let z = zone(local(&net), "Sidebar", None);
        for e in [&net, &ad, &z] {
            store.insert(e.clone()).await.unwrap();
        }
        let mut kept = mirror(5);
        kept.placements.push(Placement::new_local(local(&ad), local(&z), EntityRef::Remote(5)));
        let kept_id = kept.meta.local_id;
        store.insert(Entity::Campaign(kept)).await.unwrap();
        let empty = mirror(6);
        let empty_id = empty.meta.local_id;
        store.insert(Entity::Campaign(empty)).await.unwrap();

        // Same triple standalone: a duplicate of the embedded one.
        let dup = Placement::new_local(local(&ad), local(&z), EntityRef::Remote(5));
        store.insert_placement(PlacementLocation::Standalone, dup).await.unwrap();
        // Points at an advertisement that was deleted.
        let dangling = Placement::new_local(
            EntityRef::Local(uuid::Uuid::new_v4()),
            local(&z),
            EntityRef::Remote(5),
        );
        store
            .insert_placement(PlacementLocation::Embedded { campaign: kept_id }, dangling)
            .await
            .unwrap();

        let report = run_cleanup(&store).await.unwrap();
        assert!(report.success);
        assert_eq!(report.count, 3);

        let remaining = store.list_placements().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].location, PlacementLocation::Standalone);
        assert!(store.get(EntityKind::Campaign, empty_id).await.unwrap().is_none());
        assert!(store.get(EntityKind::Campaign, kept_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_store_failure_is_fatal() {
        let store = FailingRepository::new();
        store.fail_list_placements.store(true, Ordering::SeqCst);

        let err = run_cleanup(&store).await.unwrap_err();
        assert!(err.is_fatal());
    }
}
