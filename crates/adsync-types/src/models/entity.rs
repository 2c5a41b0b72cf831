//! Syncable advertising entities and their shared sync metadata.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ids::{EntityKind, EntityRef, LocalId, RemoteId};
use super::placement::Placement;
use crate::error::ErrorCode;

/// One recorded failure; the list is append-only and never cleared automatically.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncErrorEntry {
    pub message: String,
    pub code: ErrorCode,
    pub at: DateTime<Utc>,
}

impl SyncErrorEntry {
    pub fn now(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { message: message.into(), code, at: Utc::now() }
    }
}

/// Sync bookkeeping carried by every syncable record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncMeta {
    pub local_id: LocalId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<RemoteId>,
    #[serde(default)]
    pub synced: bool,
    #[serde(default = "default_true")]
    pub created_locally: bool,
    #[serde(default)]
    pub sync_errors: Vec<SyncErrorEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const fn default_true() -> bool {
    true
}

impl SyncMeta {
    /// Metadata for a record created locally and not yet pushed.
    pub fn new_local() -> Self {
        let now = Utc::now();
        Self {
            local_id: Uuid::new_v4(),
            remote_id: None,
            synced: false,
            created_locally: true,
            sync_errors: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Metadata for a local shadow of a record that only exists remotely.
    pub fn mirror(remote_id: RemoteId) -> Self {
        Self { remote_id: Some(remote_id), synced: true, created_locally: false, ..Self::new_local() }
    }

    pub const fn is_pending(&self) -> bool {
        !self.synced
    }

    pub fn mark_synced(&mut self, remote_id: RemoteId) {
        self.remote_id = Some(remote_id);
        self.synced = true;
        self.updated_at = Utc::now();
    }

    /// A local edit: the remote twin is now stale.
    pub fn mark_dirty(&mut self) {
        self.synced = false;
        self.updated_at = Utc::now();
    }

    pub fn push_error(&mut self, entry: SyncErrorEntry) {
        self.sync_errors.push(entry);
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Network {
    #[serde(flatten)]
    pub meta: SyncMeta,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_home_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Advertiser {
    #[serde(flatten)]
    pub meta: SyncMeta,
    pub network: EntityRef,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_home_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Zone {
    #[serde(flatten)]
    pub meta: SyncMeta,
    pub network: EntityRef,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Campaign {
    #[serde(flatten)]
    pub meta: SyncMeta,
    pub network: EntityRef,
    pub advertiser: EntityRef,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_impression_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Embedded placement list; only mirrors carry entries here.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub placements: Vec<Placement>,
}

impl Campaign {
    /// A mirror shadows a remote-only campaign so placements can reference it locally.
    pub const fn is_mirror(&self) -> bool {
        !self.meta.created_locally
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Advertisement {
    #[serde(flatten)]
    pub meta: SyncMeta,
    pub network: EntityRef,
    pub advertiser: EntityRef,
    pub name: String,
    #[serde(default = "default_ad_type")]
    pub ad_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_ad_type() -> String {
    "static".to_string()
}

/// Any syncable entity, tagged by kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Entity {
    Network(Network),
    Advertiser(Advertiser),
    Zone(Zone),
    Campaign(Campaign),
    Advertisement(Advertisement),
}

impl Entity {
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Network(_) => EntityKind::Network,
            Self::Advertiser(_) => EntityKind::Advertiser,
            Self::Zone(_) => EntityKind::Zone,
            Self::Campaign(_) => EntityKind::Campaign,
            Self::Advertisement(_) => EntityKind::Advertisement,
        }
    }

    pub const fn meta(&self) -> &SyncMeta {
        match self {
            Self::Network(e) => &e.meta,
            Self::Advertiser(e) => &e.meta,
            Self::Zone(e) => &e.meta,
            Self::Campaign(e) => &e.meta,
            Self::Advertisement(e) => &e.meta,
        }
    }

    pub fn meta_mut(&mut self) -> &mut SyncMeta {
        match self {
            Self::Network(e) => &mut e.meta,
            Self::Advertiser(e) => &mut e.meta,
            Self::Zone(e) => &mut e.meta,
            Self::Campaign(e) => &mut e.meta,
            Self::Advertisement(e) => &mut e.meta,
        }
    }

    pub const fn local_id(&self) -> LocalId {
        self.meta().local_id
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Network(e) => &e.name,
            Self::Advertiser(e) => &e.name,
            Self::Zone(e) => &e.name,
            Self::Campaign(e) => &e.name,
            Self::Advertisement(e) => &e.name,
        }
    }

    /// Owning network; networks themselves have none.
    pub const fn network(&self) -> Option<EntityRef> {
        match self {
            Self::Network(_) => None,
            Self::Advertiser(e) => Some(e.network),
            Self::Zone(e) => Some(e.network),
            Self::Campaign(e) => Some(e.network),
            Self::Advertisement(e) => Some(e.network),
        }
    }

    pub const fn advertiser(&self) -> Option<EntityRef> {
        match self {
            Self::Campaign(e) => Some(e.advertiser),
            Self::Advertisement(e) => Some(e.advertiser),
            Self::Network(_) | Self::Advertiser(_) | Self::Zone(_) => None,
        }
    }

    /// Short label used in log lines and validation messages.
    pub fn label(&self) -> String {
        format!("{} '{}' ({})", self.kind(), self.name(), self.local_id())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_json_is_flat_and_tagged() {
        let zone = Entity::Zone(Zone {
            meta: SyncMeta::new_local(),
            network: EntityRef::Remote(9001),
            name: "Sidebar".to_string(),
            alias: Some("sidebar-top".to_string()),
            width: Some(300),
            height: Some(250),
        });

        let json = serde_json::to_value(&zone).unwrap();
        assert_eq!(json["kind"], "zone");
        assert_eq!(json["network"], 9001);
        assert_eq!(json["synced"], false);
        assert_eq!(json["created_locally"], true);

        let back: Entity = serde_json::from_value(json).unwrap();
        assert_eq!(back, zone);
    }

    #[test]
    fn test_mirror_meta_is_synced_and_remote_origin() {
        let meta = SyncMeta::mirror(42);
        assert!(meta.synced);
        assert!(!meta.created_locally);
        assert_eq!(meta.remote_id, Some(42));
    }

    #[test]
    fn test_mark_dirty_keeps_remote_id() {
        let mut meta = SyncMeta::new_local();
        meta.mark_synced(77);
        meta.mark_dirty();
        assert!(meta.is_pending());
        assert_eq!(meta.remote_id, Some(77));
    }
}
