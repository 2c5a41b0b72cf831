//! Core domain models for adsync.
//!
//! This module contains all shared data structures used across the engine and server.

mod config;
mod entity;
mod event;
mod ids;
mod placement;
mod report;

pub use config::{AppConfig, GateConfig, RemoteConfig, ServerConfig};
pub use entity::{
    Advertisement, Advertiser, Campaign, Entity, Network, SyncErrorEntry, SyncMeta, Zone,
};
pub use event::{SyncEvent, SyncEventKind, SyncPhase};
pub use ids::{EntityKind, EntityRef, LocalId, ParseEntityRefError, RemoteId};
pub use placement::{
    CleanupReport, CombinationError, CombinatorReport, DeletedCounts, Placement, PlacementBatch,
    PlacementKey, PlacementLocation,
};
pub use report::{
    DryRunReport, PendingCounts, StepReport, SyncOutcome, SyncReport, SyncResult, SyncStep,
    ValidationIssue,
};
