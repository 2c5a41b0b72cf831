//! adsync core: mirrors locally authored advertising entities to a remote ad
//! server API, one rate-limited request at a time.

pub mod error;
pub mod metrics;
pub mod modules;
pub mod remote;
pub mod sync;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{AppError, AppResult};
pub use sync::{RunOptions, SyncEngine};
