//! The sync/reconciliation engine.
//!
//! Bottom-up: [`gate`] throttles every remote call, [`syncer`] pushes one kind,
//! [`placements`] builds and pushes placement cross products, [`orchestrator`]
//! runs the fixed step sequence and [`engine`] ties it to a store and a remote.

pub mod cleanup;
pub mod engine;
pub mod gate;
pub mod index;
pub mod kinds;
pub mod orchestrator;
pub mod placements;
pub mod progress;
pub mod syncer;
pub mod trigger;
pub mod validator;

pub use engine::SyncEngine;
pub use gate::{GateError, GateStatus, GateTicket, RequestGate};
pub use orchestrator::{RunOptions, SyncOrchestrator};
pub use placements::{PlacementCombinator, PlacementSyncer};
pub use progress::{NullSink, ProgressSink};
pub use trigger::{BackgroundValidation, ValidationTrigger};
pub use validator::DryRunValidator;
