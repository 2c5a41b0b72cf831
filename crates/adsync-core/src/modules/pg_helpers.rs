use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use adsync_types::models::{Entity, Placement, PlacementLocation, SyncMeta};

use crate::modules::repository::{RepoResult, RepositoryError, StoredPlacement};

pub(crate) const ENTITY_COLUMNS: &str =
    "local_id, kind, remote_id, synced, created_locally, sync_errors, document, created_at, updated_at";

pub(crate) const PLACEMENT_COLUMNS: &str = "local_id, embedded_in, remote_id, synced, created_locally, \
     sync_errors, advertisement, zone, campaign, created_at, updated_at";

pub(crate) fn map_sqlx_err(e: sqlx::Error) -> RepositoryError {
    match &e {
        sqlx::Error::RowNotFound => RepositoryError::NotFound(e.to_string()),
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::AlreadyExists(db.message().to_string())
        },
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            RepositoryError::NotFound(db.message().to_string())
        },
        _ => RepositoryError::Database(e.to_string()),
    }
}

pub(crate) const fn embedded_in(location: PlacementLocation) -> Option<Uuid> {
    match location {
        PlacementLocation::Standalone => None,
        PlacementLocation::Embedded { campaign } => Some(campaign),
    }
}

fn meta_from_row(row: &PgRow) -> RepoResult<SyncMeta> {
    let sync_errors: serde_json::Value = row.try_get("sync_errors").map_err(map_sqlx_err)?;
    Ok(SyncMeta {
        local_id: row.try_get("local_id").map_err(map_sqlx_err)?,
        remote_id: row.try_get("remote_id").map_err(map_sqlx_err)?,
        synced: row.try_get("synced").map_err(map_sqlx_err)?,
        created_locally: row.try_get("created_locally").map_err(map_sqlx_err)?,
        sync_errors: serde_json::from_value(sync_errors)?,
        created_at: row.try_get("created_at").map_err(map_sqlx_err)?,
        updated_at: row.try_get("updated_at").map_err(map_sqlx_err)?,
    })
}

/// Document fields plus authoritative meta columns. Embedded placements are attached by the caller.
pub(crate) fn entity_from_row(row: &PgRow) -> RepoResult<Entity> {
    let document: serde_json::Value = row.try_get("document").map_err(map_sqlx_err)?;
    let mut entity: Entity = serde_json::from_value(document)?;
    *entity.meta_mut() = meta_from_row(row)?;
    Ok(entity)
}

pub(crate) fn placement_from_row(row: &PgRow) -> RepoResult<StoredPlacement> {
    let embedded: Option<Uuid> = row.try_get("embedded_in").map_err(map_sqlx_err)?;
    let location = embedded
        .map_or(PlacementLocation::Standalone, |campaign| PlacementLocation::Embedded { campaign });
    let advertisement: serde_json::Value = row.try_get("advertisement").map_err(map_sqlx_err)?;
    let zone: serde_json::Value = row.try_get("zone").map_err(map_sqlx_err)?;
    let campaign: serde_json::Value = row.try_get("campaign").map_err(map_sqlx_err)?;
    Ok(StoredPlacement {
        location,
        placement: Placement {
            meta: meta_from_row(row)?,
            advertisement: serde_json::from_value(advertisement)?,
            zone: serde_json::from_value(zone)?,
            campaign: serde_json::from_value(campaign)?,
        },
    })
}
