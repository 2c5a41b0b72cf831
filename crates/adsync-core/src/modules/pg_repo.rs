//! PostgreSQL implementation of the sync repository.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::HashMap;
use std::time::Duration;

use adsync_types::models::{
    Entity, EntityKind, LocalId, Placement, PlacementLocation, RemoteId, SyncErrorEntry,
};

use crate::modules::pg_helpers::{
    embedded_in, entity_from_row, map_sqlx_err, placement_from_row, ENTITY_COLUMNS,
    PLACEMENT_COLUMNS,
};
use crate::modules::repository::{
    EntityFilter, RepoResult, RepositoryError, StoredPlacement, SyncRepository,
};

/// PostgreSQL-backed sync store.
pub struct PostgresSyncRepository {
    pool: PgPool,
}

impl PostgresSyncRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Connect to database and create repository.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(300))
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn run_migrations(&self) -> RepoResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|err| RepositoryError::Database(err.to_string()))
    }

    async fn embedded_placements(&self, campaigns: &[LocalId]) -> RepoResult<HashMap<LocalId, Vec<Placement>>> {
        let mut grouped: HashMap<LocalId, Vec<Placement>> = HashMap::new();
        if campaigns.is_empty() {
            return Ok(grouped);
        }
        let sql = format!(
            "SELECT {PLACEMENT_COLUMNS} FROM placements WHERE embedded_in = ANY($1) ORDER BY seq"
        );
        let rows = sqlx::query(&sql)
            .bind(campaigns.to_vec())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        for row in &rows {
            let stored = placement_from_row(row)?;
            if let PlacementLocation::Embedded { campaign } = stored.location {
                grouped.entry(campaign).or_default().push(stored.placement);
            }
        }
        Ok(grouped)
    }

    async fn attach_placements(&self, entities: &mut [Entity]) -> RepoResult<()> {
        let mirrors: Vec<LocalId> = entities
            .iter()
            .filter(|e| e.kind() == EntityKind::Campaign)
            .map(Entity::local_id)
            .collect();
        let mut grouped = self.embedded_placements(&mirrors).await?;
        for entity in entities.iter_mut() {
            if let Entity::Campaign(campaign) = entity {
                campaign.placements = grouped.remove(&campaign.meta.local_id).unwrap_or_default();
            }
        }
        Ok(())
    }

    async fn fetch_one(&self, sql: &str, kind: EntityKind, key: Key) -> RepoResult<Option<Entity>> {
        let query = sqlx::query(sql).bind(kind.as_str());
        let query = match key {
            Key::Local(id) => query.bind(id),
            Key::Remote(id) => query.bind(id),
        };
        let Some(row) = query.fetch_optional(&self.pool).await.map_err(map_sqlx_err)? else {
            return Ok(None);
        };
        let mut entities = vec![entity_from_row(&row)?];
        self.attach_placements(&mut entities).await?;
        Ok(entities.pop())
    }

    async fn update_meta(&self, sql: &str, kind: EntityKind, id: LocalId, what: &str) -> RepoResult<()> {
        let result = sqlx::query(sql)
            .bind(id)
            .bind(kind.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("{kind} {id} ({what})")));
        }
        Ok(())
    }
}

enum Key {
    Local(LocalId),
    Remote(RemoteId),
}

async fn insert_placement_row(
    conn: &mut sqlx::PgConnection,
    location: PlacementLocation,
    placement: &Placement,
) -> RepoResult<()> {
    let meta = &placement.meta;
    sqlx::query(
        "INSERT INTO placements (local_id, embedded_in, remote_id, synced, created_locally, \
         sync_errors, advertisement, zone, campaign, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(meta.local_id)
    .bind(embedded_in(location))
    .bind(meta.remote_id)
    .bind(meta.synced)
    .bind(meta.created_locally)
    .bind(serde_json::to_value(&meta.sync_errors)?)
    .bind(serde_json::to_value(placement.advertisement)?)
    .bind(serde_json::to_value(placement.zone)?)
    .bind(serde_json::to_value(placement.campaign)?)
    .bind(meta.created_at)
    .bind(meta.updated_at)
    .execute(conn)
    .await
    .map_err(map_sqlx_err)?;
    Ok(())
}

#[async_trait]
impl SyncRepository for PostgresSyncRepository {
    async fn insert(&self, entity: Entity) -> RepoResult<Entity> {
        let mut document = entity.clone();
        let embedded = match &mut document {
            Entity::Campaign(c) => std::mem::take(&mut c.placements),
            _ => Vec::new(),
        };
        let meta = entity.meta();

        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;
        sqlx::query(
            "INSERT INTO sync_entities (local_id, kind, remote_id, synced, created_locally, \
             sync_errors, document, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(meta.local_id)
        .bind(entity.kind().as_str())
        .bind(meta.remote_id)
        .bind(meta.synced)
        .bind(meta.created_locally)
        .bind(serde_json::to_value(&meta.sync_errors)?)
        .bind(serde_json::to_value(&document)?)
        .bind(meta.created_at)
        .bind(meta.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        let location = PlacementLocation::Embedded { campaign: meta.local_id };
        for placement in &embedded {
            insert_placement_row(&mut tx, location, placement).await?;
        }
        tx.commit().await.map_err(map_sqlx_err)?;
        Ok(entity)
    }

    async fn get(&self, kind: EntityKind, id: LocalId) -> RepoResult<Option<Entity>> {
        let sql =
            format!("SELECT {ENTITY_COLUMNS} FROM sync_entities WHERE kind = $1 AND local_id = $2");
        self.fetch_one(&sql, kind, Key::Local(id)).await
    }

    async fn find_by_remote_id(
        &self,
        kind: EntityKind,
        remote_id: RemoteId,
    ) -> RepoResult<Option<Entity>> {
        let sql =
            format!("SELECT {ENTITY_COLUMNS} FROM sync_entities WHERE kind = $1 AND remote_id = $2");
        self.fetch_one(&sql, kind, Key::Remote(remote_id)).await
    }

    async fn list(&self, kind: EntityKind, filter: EntityFilter) -> RepoResult<Vec<Entity>> {
        let sql = format!(
            "SELECT {ENTITY_COLUMNS} FROM sync_entities \
             WHERE kind = $1 \
               AND ($2::BOOLEAN IS NULL OR synced = $2) \
               AND ($3::BOOLEAN IS NULL OR created_locally = $3) \
             ORDER BY seq"
        );
        let rows = sqlx::query(&sql)
            .bind(kind.as_str())
            .bind(filter.synced)
            .bind(filter.created_locally)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        let mut entities = rows.iter().map(entity_from_row).collect::<RepoResult<Vec<_>>>()?;
        self.attach_placements(&mut entities).await?;
        Ok(entities)
    }

    async fn mark_synced(
        &self,
        kind: EntityKind,
        id: LocalId,
        remote_id: RemoteId,
    ) -> RepoResult<()> {
        let result = sqlx::query(
            "UPDATE sync_entities SET remote_id = $3, synced = TRUE, updated_at = NOW() \
             WHERE local_id = $1 AND kind = $2",
        )
        .bind(id)
        .bind(kind.as_str())
        .bind(remote_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("{kind} {id}")));
        }
        Ok(())
    }

    async fn append_sync_error(
        &self,
        kind: EntityKind,
        id: LocalId,
        entry: SyncErrorEntry,
    ) -> RepoResult<()> {
        let result = sqlx::query(
            "UPDATE sync_entities SET sync_errors = sync_errors || $3::jsonb, updated_at = NOW() \
             WHERE local_id = $1 AND kind = $2",
        )
        .bind(id)
        .bind(kind.as_str())
        .bind(serde_json::to_value(vec![entry])?)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("{kind} {id}")));
        }
        Ok(())
    }

    async fn mark_dirty(&self, kind: EntityKind, id: LocalId) -> RepoResult<()> {
        self.update_meta(
            "UPDATE sync_entities SET synced = FALSE, updated_at = NOW() \
             WHERE local_id = $1 AND kind = $2",
            kind,
            id,
            "mark dirty",
        )
        .await
    }

    async fn delete(&self, kind: EntityKind, id: LocalId) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM sync_entities WHERE local_id = $1 AND kind = $2")
            .bind(id)
            .bind(kind.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_placement(
        &self,
        location: PlacementLocation,
        placement: Placement,
    ) -> RepoResult<Placement> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_err)?;
        insert_placement_row(&mut conn, location, &placement).await?;
        Ok(placement)
    }

    async fn get_placement(
        &self,
        location: PlacementLocation,
        id: LocalId,
    ) -> RepoResult<Option<Placement>> {
        let sql = format!(
            "SELECT {PLACEMENT_COLUMNS} FROM placements \
             WHERE local_id = $1 AND embedded_in IS NOT DISTINCT FROM $2"
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(embedded_in(location))
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        row.as_ref().map(placement_from_row).transpose().map(|p| p.map(|s| s.placement))
    }

    async fn list_placements(&self) -> RepoResult<Vec<StoredPlacement>> {
        let sql = format!(
            "SELECT {PLACEMENT_COLUMNS} FROM placements ORDER BY (embedded_in IS NOT NULL), seq"
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await.map_err(map_sqlx_err)?;
        rows.iter().map(placement_from_row).collect()
    }

    async fn mark_placement_synced(
        &self,
        location: PlacementLocation,
        id: LocalId,
        remote_id: RemoteId,
    ) -> RepoResult<()> {
        let result = sqlx::query(
            "UPDATE placements SET remote_id = $3, synced = TRUE, updated_at = NOW() \
             WHERE local_id = $1 AND embedded_in IS NOT DISTINCT FROM $2",
        )
        .bind(id)
        .bind(embedded_in(location))
        .bind(remote_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("placement {id}")));
        }
        Ok(())
    }

    async fn append_placement_error(
        &self,
        location: PlacementLocation,
        id: LocalId,
        entry: SyncErrorEntry,
    ) -> RepoResult<()> {
        let result = sqlx::query(
            "UPDATE placements SET sync_errors = sync_errors || $3::jsonb, updated_at = NOW() \
             WHERE local_id = $1 AND embedded_in IS NOT DISTINCT FROM $2",
        )
        .bind(id)
        .bind(embedded_in(location))
        .bind(serde_json::to_value(vec![entry])?)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("placement {id}")));
        }
        Ok(())
    }

    async fn delete_placements(
        &self,
        location: PlacementLocation,
        ids: &[LocalId],
    ) -> RepoResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "DELETE FROM placements WHERE local_id = ANY($1) AND embedded_in IS NOT DISTINCT FROM $2",
        )
        .bind(ids.to_vec())
        .bind(embedded_in(location))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(usize::try_from(result.rows_affected()).unwrap_or(usize::MAX))
    }
}
