//! Sync run errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::RemoteError;

/// Stable machine-readable code attached to every failed or blocked sync result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    DependencyBlocked,
    RemoteCallFailure,
    RateLimitTimeout,
    FatalCleanupFailure,
    StoreFailure,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::DependencyBlocked => "DEPENDENCY_BLOCKED",
            Self::RemoteCallFailure => "REMOTE_CALL_FAILURE",
            Self::RateLimitTimeout => "RATE_LIMIT_TIMEOUT",
            Self::FatalCleanupFailure => "FATAL_CLEANUP_FAILURE",
            Self::StoreFailure => "STORE_FAILURE",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by a sync run.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum SyncError {
    /// Dry-run found blocking problems; the whole pipeline is refused.
    #[error("Validation failed with {} error(s)", errors.len())]
    ValidationError {
        /// Messages of every blocking issue, entity references included
        errors: Vec<String>,
    },

    /// An entity's parent has no usable identifier yet.
    #[error("{entity} is blocked: {missing} has no remote identifier")]
    DependencyBlocked {
        /// Human-readable reference to the blocked entity
        entity: String,
        /// Which parent is missing
        missing: String,
    },

    /// The remote create/update call failed.
    #[error("Remote call failed: {message}")]
    RemoteCallFailure {
        /// Description of the failure
        message: String,
    },

    /// The Request Gate could not be acquired within its bound.
    #[error("Rate-limit timeout after waiting {waited_ms}ms for the request gate")]
    RateLimitTimeout {
        /// How long the caller waited before giving up
        waited_ms: u64,
    },

    /// The cleanup step failed; the run stops.
    #[error("Cleanup failed: {message}")]
    FatalCleanupFailure {
        /// Description of the failure
        message: String,
    },

    /// The local store rejected a read or write.
    #[error("Store error: {message}")]
    Store {
        /// Description of the failure
        message: String,
    },
}

impl SyncError {
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::ValidationError { .. } => ErrorCode::ValidationError,
            Self::DependencyBlocked { .. } => ErrorCode::DependencyBlocked,
            Self::RemoteCallFailure { .. } => ErrorCode::RemoteCallFailure,
            Self::RateLimitTimeout { .. } => ErrorCode::RateLimitTimeout,
            Self::FatalCleanupFailure { .. } => ErrorCode::FatalCleanupFailure,
            Self::Store { .. } => ErrorCode::StoreFailure,
        }
    }

    /// Whether the next run may succeed without a local change.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RemoteCallFailure { .. } | Self::RateLimitTimeout { .. } | Self::Store { .. }
        )
    }

    /// Only cleanup failures stop the pipeline.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalCleanupFailure { .. })
    }
}

impl From<RemoteError> for SyncError {
    fn from(err: RemoteError) -> Self {
        Self::RemoteCallFailure { message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_cleanup_is_fatal() {
        let fatal = SyncError::FatalCleanupFailure { message: "store offline".to_string() };
        let timeout = SyncError::RateLimitTimeout { waited_ms: 300_000 };

        assert!(fatal.is_fatal());
        assert!(!timeout.is_fatal());
        assert!(timeout.is_retryable());
        assert_eq!(timeout.code().as_str(), "RATE_LIMIT_TIMEOUT");
    }

    #[test]
    fn test_blocked_is_not_retryable_within_run() {
        let blocked =
            SyncError::DependencyBlocked { entity: "zone z1".to_string(), missing: "network".into() };
        assert!(!blocked.is_retryable());
        assert_eq!(blocked.code(), ErrorCode::DependencyBlocked);
    }
}
