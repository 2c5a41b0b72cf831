//! Generic per-kind syncer: pushes every pending entity of one kind.

use serde_json::Value;

use adsync_types::models::{
    Entity, EntityKind, EntityRef, SyncErrorEntry, SyncOutcome, SyncResult,
};
use adsync_types::SyncError;

use super::gate::RequestGate;
use super::index::IdIndex;
use super::kinds::{remote_target, RemoteTarget};
use crate::error::{AppError, AppResult};
use crate::metrics::record_sync_result;
use crate::modules::{EntityFilter, RepositoryError, SyncRepository};
use crate::remote::RemoteRecord;

pub struct EntitySyncer<'a> {
    store: &'a dyn SyncRepository,
    gate: &'a RequestGate,
}

impl<'a> EntitySyncer<'a> {
    pub fn new(store: &'a dyn SyncRepository, gate: &'a RequestGate) -> Self {
        Self { store, gate }
    }

    /// One result per pending entity of `kind` in scope. Only store listing errors abort.
    pub async fn sync(&self, kind: EntityKind, scope: Option<EntityRef>) -> AppResult<Vec<SyncResult>> {
        let index = IdIndex::load(self.store).await?;
        let pending: Vec<Entity> = self
            .store
            .list(kind, EntityFilter::pending())
            .await?
            .into_iter()
            .filter(|e| index.in_scope(e, scope))
            .collect();

        tracing::info!("Syncing {} pending {}", pending.len(), kind.plural());
        let mut results = Vec::with_capacity(pending.len());
        for entity in pending {
            let result = self.sync_one(&entity, &index).await;
            record_sync_result(kind.as_str(), result.outcome.as_str());
            results.push(result);
        }
        Ok(results)
    }

    async fn sync_one(&self, entity: &Entity, index: &IdIndex) -> SyncResult {
        let local_entity = serde_json::to_value(entity).unwrap_or(Value::Null);

        let target = match remote_target(entity, index) {
            Ok(target) => target,
            Err(missing) => {
                let reason = SyncError::DependencyBlocked {
                    entity: entity.label(),
                    missing: missing.describe(),
                };
                tracing::debug!("{}", reason);
                return SyncResult::blocked(local_entity, reason.to_string());
            },
        };

        match self.push(entity, target).await {
            Ok((outcome, record)) => {
                tracing::debug!("{} {} as remote {}", entity.label(), outcome.as_str(), record.id);
                SyncResult::pushed(outcome, local_entity, record.body)
            },
            Err(err) => {
                let err = err.into_sync_error();
                tracing::warn!("Failed to sync {}: {}", entity.label(), err);
                let entry = SyncErrorEntry::now(err.code(), err.to_string());
                if let Err(e) =
                    self.store.append_sync_error(entity.kind(), entity.local_id(), entry).await
                {
                    tracing::error!("Could not record sync error on {}: {}", entity.label(), e);
                }
                SyncResult::failed(local_entity, err.code(), err.to_string())
            },
        }
    }

    /// Create or update under the gate. The ticket is held until the local record is marked,
    /// so no other caller in this process can observe the entity between create and mark.
    async fn push(
        &self,
        entity: &Entity,
        target: RemoteTarget,
    ) -> AppResult<(SyncOutcome, RemoteRecord)> {
        let kind = entity.kind();
        let id = entity.local_id();
        let api = self.gate.acquire().await?;

        let current = self
            .store
            .get(kind, id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(entity.label()))?;

        if let Some(remote_id) = current.meta().remote_id {
            let record = api.update(&target.route, remote_id, target.fields).await?;
            self.store.mark_synced(kind, id, remote_id).await?;
            return Ok((SyncOutcome::Updated, record));
        }

        let record = api.create(&target.route, target.fields).await?;
        if let Err(e) = self.store.mark_synced(kind, id, record.id).await {
            tracing::error!(
                remote_id = record.id,
                "{} was created remotely but could not be marked synced: {}",
                entity.label(),
                e
            );
            return Err(AppError::Sync(SyncError::Store {
                message: format!("created remotely as {} but local update failed: {}", record.id, e),
            }));
        }
        Ok((SyncOutcome::Created, record))
    }
}
