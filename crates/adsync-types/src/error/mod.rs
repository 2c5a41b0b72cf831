//! Typed error definitions for adsync.
//!
//! - **`SyncError`** - the five failure kinds a sync run can surface
//! - **`RemoteError`** - failures talking to the remote ad server
//! - **`ConfigError`** - configuration loading and persistence failures

mod config;
mod remote;
mod sync;

pub use config::ConfigError;
pub use remote::RemoteError;
pub use sync::{ErrorCode, SyncError};
