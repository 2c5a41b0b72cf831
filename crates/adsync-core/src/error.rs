//! Unified error types for adsync core.

use serde::Serialize;
use thiserror::Error;

use adsync_types::{ConfigError, RemoteError, SyncError};

use crate::modules::repository::RepositoryError;
use crate::sync::gate::GateError;

/// Main error type for engine operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AppError {
    /// Local store read or write failed.
    #[error("Store error: {0}")]
    Repository(#[from] RepositoryError),

    /// PostgreSQL connection or query failed outside the repository layer.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Remote ad server call failed.
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Request Gate wait exceeded its bound.
    #[error("Request gate error: {0}")]
    Gate(#[from] GateError),

    /// Sync run failure surfaced to callers.
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// Configuration loading or validation failed.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// File system I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Caller supplied an unusable argument.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl AppError {
    /// Collapse into the sync error taxonomy used in per-entity results.
    pub fn into_sync_error(self) -> SyncError {
        match self {
            Self::Sync(e) => e,
            Self::Remote(e) => e.into(),
            Self::Gate(GateError::Timeout { waited_ms }) => SyncError::RateLimitTimeout { waited_ms },
            Self::Repository(e) => SyncError::Store { message: e.to_string() },
            other => SyncError::Store { message: other.to_string() },
        }
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

/// Result type alias for engine operations.
pub type AppResult<T> = Result<T, AppError>;
