//! In-process sync repository with an optional atomic JSON snapshot.
//!
//! Used when no database URL is configured, and by the engine tests. With a
//! snapshot, a write only becomes visible once it is on disk.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::RwLock;

use adsync_types::models::{
    Entity, EntityKind, LocalId, Placement, PlacementLocation, RemoteId, SyncErrorEntry,
};

use crate::modules::repository::{
    EntityFilter, RepoResult, RepositoryError, StoredPlacement, SyncRepository,
};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    entities: BTreeMap<EntityKind, Vec<Entity>>,
    #[serde(default)]
    placements: Vec<Placement>,
}

impl StoreData {
    fn collection(&self, kind: EntityKind) -> &[Entity] {
        self.entities.get(&kind).map_or(&[], Vec::as_slice)
    }

    fn entity_mut(&mut self, kind: EntityKind, id: LocalId) -> RepoResult<&mut Entity> {
        self.entities
            .get_mut(&kind)
            .and_then(|list| list.iter_mut().find(|e| e.local_id() == id))
            .ok_or_else(|| RepositoryError::NotFound(format!("{kind} {id}")))
    }

    fn placement_mut(
        &mut self,
        location: PlacementLocation,
        id: LocalId,
    ) -> RepoResult<&mut Placement> {
        let list = match location {
            PlacementLocation::Standalone => &mut self.placements,
            PlacementLocation::Embedded { campaign } => {
                match self.entity_mut(EntityKind::Campaign, campaign)? {
                    Entity::Campaign(c) => &mut c.placements,
                    _ => return Err(RepositoryError::NotFound(format!("campaign {campaign}"))),
                }
            },
        };
        list.iter_mut()
            .find(|p| p.meta.local_id == id)
            .ok_or_else(|| RepositoryError::NotFound(format!("placement {id}")))
    }
}

pub struct MemoryRepository {
    data: RwLock<StoreData>,
    snapshot_path: Option<PathBuf>,
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self { data: RwLock::new(StoreData::default()), snapshot_path: None }
    }

    /// Open a store persisted at `path`, loading the existing snapshot if present.
    pub async fn with_snapshot(path: PathBuf) -> RepoResult<Self> {
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreData::default(),
            Err(e) => return Err(RepositoryError::Database(e.to_string())),
        };
        tracing::info!("Opened store snapshot at {}", path.display());
        Ok(Self { data: RwLock::new(data), snapshot_path: Some(path) })
    }

    async fn persist(&self, data: &StoreData) -> RepoResult<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let content = serde_json::to_vec_pretty(data)?;
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, content)
            .await
            .map_err(|e| RepositoryError::Database(format!("snapshot write failed: {e}")))?;
        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(|e| RepositoryError::Database(format!("snapshot rename failed: {e}")))
    }

    /// Apply `change` under the write lock and keep it only if the snapshot write succeeds.
    async fn commit<T>(
        &self,
        change: impl FnOnce(&mut StoreData) -> RepoResult<T>,
    ) -> RepoResult<T> {
        let mut data = self.data.write().await;
        if self.snapshot_path.is_none() {
            return change(&mut *data);
        }
        let mut next = data.clone();
        let out = change(&mut next)?;
        self.persist(&next).await?;
        *data = next;
        Ok(out)
    }
}

#[async_trait]
impl SyncRepository for MemoryRepository {
    async fn insert(&self, entity: Entity) -> RepoResult<Entity> {
        self.commit(|data| {
            let kind = entity.kind();
            let id = entity.local_id();
            if data.collection(kind).iter().any(|e| e.local_id() == id) {
                return Err(RepositoryError::AlreadyExists(format!("{kind} {id}")));
            }
            data.entities.entry(kind).or_default().push(entity.clone());
            Ok(entity)
        })
        .await
    }

    async fn get(&self, kind: EntityKind, id: LocalId) -> RepoResult<Option<Entity>> {
        let data = self.data.read().await;
        Ok(data.collection(kind).iter().find(|e| e.local_id() == id).cloned())
    }

    async fn find_by_remote_id(
        &self,
        kind: EntityKind,
        remote_id: RemoteId,
    ) -> RepoResult<Option<Entity>> {
        let data = self.data.read().await;
        Ok(data.collection(kind).iter().find(|e| e.meta().remote_id == Some(remote_id)).cloned())
    }

    async fn list(&self, kind: EntityKind, filter: EntityFilter) -> RepoResult<Vec<Entity>> {
        let data = self.data.read().await;
        Ok(data.collection(kind).iter().filter(|e| filter.matches(e.meta())).cloned().collect())
    }

    async fn mark_synced(
        &self,
        kind: EntityKind,
        id: LocalId,
        remote_id: RemoteId,
    ) -> RepoResult<()> {
        self.commit(|data| {
            data.entity_mut(kind, id)?.meta_mut().mark_synced(remote_id);
            Ok(())
        })
        .await
    }

    async fn append_sync_error(
        &self,
        kind: EntityKind,
        id: LocalId,
        entry: SyncErrorEntry,
    ) -> RepoResult<()> {
        self.commit(|data| {
            data.entity_mut(kind, id)?.meta_mut().push_error(entry);
            Ok(())
        })
        .await
    }

    async fn mark_dirty(&self, kind: EntityKind, id: LocalId) -> RepoResult<()> {
        self.commit(|data| {
            data.entity_mut(kind, id)?.meta_mut().mark_dirty();
            Ok(())
        })
        .await
    }

    async fn delete(&self, kind: EntityKind, id: LocalId) -> RepoResult<bool> {
        self.commit(|data| {
            let Some(list) = data.entities.get_mut(&kind) else {
                return Ok(false);
            };
            let before = list.len();
            list.retain(|e| e.local_id() != id);
            Ok(list.len() != before)
        })
        .await
    }

    async fn insert_placement(
        &self,
        location: PlacementLocation,
        placement: Placement,
    ) -> RepoResult<Placement> {
        self.commit(|data| {
            match location {
                PlacementLocation::Standalone => data.placements.push(placement.clone()),
                PlacementLocation::Embedded { campaign } => {
                    match data.entity_mut(EntityKind::Campaign, campaign)? {
                        Entity::Campaign(c) => c.placements.push(placement.clone()),
                        _ => return Err(RepositoryError::NotFound(format!("campaign {campaign}"))),
                    }
                },
            }
            Ok(placement)
        })
        .await
    }

    async fn get_placement(
        &self,
        location: PlacementLocation,
        id: LocalId,
    ) -> RepoResult<Option<Placement>> {
        let data = self.data.read().await;
        let found = match location {
            PlacementLocation::Standalone => {
                data.placements.iter().find(|p| p.meta.local_id == id).cloned()
            },
            PlacementLocation::Embedded { campaign } => {
                data.collection(EntityKind::Campaign).iter().find_map(|e| match e {
                    Entity::Campaign(c) if c.meta.local_id == campaign => {
                        c.placements.iter().find(|p| p.meta.local_id == id).cloned()
                    },
                    _ => None,
                })
            },
        };
        Ok(found)
    }

    async fn list_placements(&self) -> RepoResult<Vec<StoredPlacement>> {
        let data = self.data.read().await;
        let standalone = data.placements.iter().map(|p| StoredPlacement {
            location: PlacementLocation::Standalone,
            placement: p.clone(),
        });
        let embedded = data.collection(EntityKind::Campaign).iter().flat_map(|e| match e {
            Entity::Campaign(c) => c
                .placements
                .iter()
                .map(|p| StoredPlacement {
                    location: PlacementLocation::Embedded { campaign: c.meta.local_id },
                    placement: p.clone(),
                })
                .collect::<Vec<_>>(),
            _ => Vec::new(),
        });
        Ok(standalone.chain(embedded).collect())
    }

    async fn mark_placement_synced(
        &self,
        location: PlacementLocation,
        id: LocalId,
        remote_id: RemoteId,
    ) -> RepoResult<()> {
        self.commit(|data| {
            data.placement_mut(location, id)?.meta.mark_synced(remote_id);
            Ok(())
        })
        .await
    }

    async fn append_placement_error(
        &self,
        location: PlacementLocation,
        id: LocalId,
        entry: SyncErrorEntry,
    ) -> RepoResult<()> {
        self.commit(|data| {
            data.placement_mut(location, id)?.meta.push_error(entry);
            Ok(())
        })
        .await
    }

    async fn delete_placements(
        &self,
        location: PlacementLocation,
        ids: &[LocalId],
    ) -> RepoResult<usize> {
        self.commit(|data| {
            let list = match location {
                PlacementLocation::Standalone => &mut data.placements,
                PlacementLocation::Embedded { campaign } => {
                    match data.entity_mut(EntityKind::Campaign, campaign)? {
                        Entity::Campaign(c) => &mut c.placements,
                        _ => return Err(RepositoryError::NotFound(format!("campaign {campaign}"))),
                    }
                },
            };
            let before = list.len();
            list.retain(|p| !ids.contains(&p.meta.local_id));
            Ok(before - list.len())
        })
        .await
    }
}
