//! # adsync Types
//!
//! Core types, models, and error definitions for the adsync engine.
//!
//! - **`error`** - Typed error hierarchy for sync, remote calls, and configuration
//! - **`models`** - Domain models (identifiers, entities, placements, reports, events, config)
//!
//! ## Architecture Role
//!
//! `adsync-types` sits at the bottom of the dependency graph:
//!
//! ```text
//!          adsync-types (this crate)
//!                  │
//!                  ▼
//!             adsync-core
//!                  │
//!                  ▼
//!            adsync-server
//! ```
//!
//! All types are serializable via serde so they can cross the HTTP boundary unchanged.

pub mod error;
pub mod models;

pub use error::{ConfigError, RemoteError, SyncError};

pub use models::{
    Advertisement, Advertiser, AppConfig, Campaign, DryRunReport, Entity, EntityKind, EntityRef,
    LocalId, Network, Placement, PlacementBatch, PlacementKey, PlacementLocation, RemoteId, StepReport, SyncEvent,
    SyncMeta, SyncOutcome, SyncReport, SyncResult, SyncStep, Zone,
};
