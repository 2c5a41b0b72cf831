//! Sync repository trait for storage abstraction.
//!
//! The store offers per-collection CRUD, filtering, and atomic single-record
//! field updates. Placements live in two backends (a standalone collection and
//! the embedded lists of campaign mirrors) and are addressed by
//! [`PlacementLocation`].

use async_trait::async_trait;

use adsync_types::models::{
    Entity, EntityKind, LocalId, Placement, PlacementLocation, RemoteId, SyncErrorEntry, SyncMeta,
};

pub type RepoResult<T> = Result<T, RepositoryError>;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Record already exists: {0}")]
    AlreadyExists(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RepositoryError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Field filter applied by [`SyncRepository::list`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntityFilter {
    pub synced: Option<bool>,
    pub created_locally: Option<bool>,
}

impl EntityFilter {
    pub const fn all() -> Self {
        Self { synced: None, created_locally: None }
    }

    /// Records whose current local state has not been accepted remotely.
    pub const fn pending() -> Self {
        Self { synced: Some(false), created_locally: None }
    }

    pub const fn mirrors() -> Self {
        Self { synced: None, created_locally: Some(false) }
    }

    pub fn matches(&self, meta: &SyncMeta) -> bool {
        self.synced.map_or(true, |s| meta.synced == s)
            && self.created_locally.map_or(true, |c| meta.created_locally == c)
    }
}

/// A placement together with the backend that holds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPlacement {
    pub location: PlacementLocation,
    pub placement: Placement,
}

#[async_trait]
pub trait SyncRepository: Send + Sync {
    async fn insert(&self, entity: Entity) -> RepoResult<Entity>;
    async fn get(&self, kind: EntityKind, id: LocalId) -> RepoResult<Option<Entity>>;
    async fn find_by_remote_id(
        &self,
        kind: EntityKind,
        remote_id: RemoteId,
    ) -> RepoResult<Option<Entity>>;
    async fn list(&self, kind: EntityKind, filter: EntityFilter) -> RepoResult<Vec<Entity>>;
    /// Atomically set `remote_id` and `synced=true`.
    async fn mark_synced(&self, kind: EntityKind, id: LocalId, remote_id: RemoteId)
        -> RepoResult<()>;
    /// Append-only; never touches other fields.
    async fn append_sync_error(
        &self,
        kind: EntityKind,
        id: LocalId,
        entry: SyncErrorEntry,
    ) -> RepoResult<()>;
    /// Flag a local edit so the next run pushes an update.
    async fn mark_dirty(&self, kind: EntityKind, id: LocalId) -> RepoResult<()>;
    async fn delete(&self, kind: EntityKind, id: LocalId) -> RepoResult<bool>;

    async fn insert_placement(
        &self,
        location: PlacementLocation,
        placement: Placement,
    ) -> RepoResult<Placement>;
    async fn get_placement(
        &self,
        location: PlacementLocation,
        id: LocalId,
    ) -> RepoResult<Option<Placement>>;
    /// Every placement from both backends, standalone first, in insertion order.
    async fn list_placements(&self) -> RepoResult<Vec<StoredPlacement>>;
    async fn mark_placement_synced(
        &self,
        location: PlacementLocation,
        id: LocalId,
        remote_id: RemoteId,
    ) -> RepoResult<()>;
    async fn append_placement_error(
        &self,
        location: PlacementLocation,
        id: LocalId,
        entry: SyncErrorEntry,
    ) -> RepoResult<()>;
    /// Remove the given ids from one backend; returns how many were removed.
    async fn delete_placements(
        &self,
        location: PlacementLocation,
        ids: &[LocalId],
    ) -> RepoResult<usize>;
}
