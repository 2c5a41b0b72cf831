//! Placements: one advertisement in one zone within one campaign.

use serde::{Deserialize, Serialize};

use super::entity::SyncMeta;
use super::ids::{EntityRef, LocalId};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Placement {
    #[serde(flatten)]
    pub meta: SyncMeta,
    pub advertisement: EntityRef,
    pub zone: EntityRef,
    pub campaign: EntityRef,
}

impl Placement {
    pub fn new_local(advertisement: EntityRef, zone: EntityRef, campaign: EntityRef) -> Self {
        Self { meta: SyncMeta::new_local(), advertisement, zone, campaign }
    }

    /// Key over the references exactly as stored (not canonicalized).
    pub const fn raw_key(&self) -> PlacementKey {
        PlacementKey { advertisement: self.advertisement, zone: self.zone, campaign: self.campaign }
    }
}

/// The (advertisement, zone, campaign) triple that must be unique across all placements.
///
/// Only meaningful for dedup once every component has been canonicalized.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlacementKey {
    pub advertisement: EntityRef,
    pub zone: EntityRef,
    pub campaign: EntityRef,
}

impl std::fmt::Display for PlacementKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ad {} / zone {} / campaign {}", self.advertisement, self.zone, self.campaign)
    }
}

/// Which storage backend holds a placement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlacementLocation {
    /// Standalone placement collection.
    Standalone,
    /// Embedded in a campaign mirror's placement list.
    Embedded { campaign: LocalId },
}

/// Input of the combinator and of its cleanup inverse.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlacementBatch {
    pub campaign: EntityRef,
    pub advertisements: Vec<EntityRef>,
    pub zones: Vec<EntityRef>,
}

impl PlacementBatch {
    /// Size of the full cross product.
    pub fn combinations(&self) -> usize {
        self.advertisements.len() * self.zones.len()
    }
}

/// Per-combination failure, keyed by the (advertisement, zone) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CombinationError {
    pub advertisement_id: EntityRef,
    pub zone_id: EntityRef,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CombinatorReport {
    /// Placements actually created, not attempted.
    pub created: usize,
    pub placements: Vec<Placement>,
    pub zones_matched: usize,
    pub errors: Vec<CombinationError>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeletedCounts {
    pub placements: usize,
    pub campaigns: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted: DeletedCounts,
}
