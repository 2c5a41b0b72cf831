//! Remote ad server errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by the remote advertising API client.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum RemoteError {
    /// Request never produced a response (DNS, TLS, connect, timeout)
    #[error("Transport error: {message}")]
    Transport {
        /// Description of the transport failure
        message: String,
    },

    /// Remote answered with a non-success status
    #[error("Remote returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, truncated
        body: String,
    },

    /// Response did not carry a usable identifier or body
    #[error("Malformed remote response: {message}")]
    MalformedResponse {
        /// What was missing or unparsable
        message: String,
    },

    /// Remote reported the record does not exist
    #[error("Remote {kind} {id} not found")]
    NotFound {
        /// Entity kind that was looked up
        kind: String,
        /// Remote identifier that was looked up
        id: i64,
    },
}

impl RemoteError {
    /// Create a status error, truncating long bodies for logs and reports.
    pub fn status(status: u16, body: &str) -> Self {
        const MAX_BODY: usize = 512;
        let body = if body.len() > MAX_BODY {
            let mut end = MAX_BODY;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}…", &body[..end])
        } else {
            body.to_string()
        };
        Self::Status { status, body }
    }

    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Status { status, .. } if *status >= 400 && *status < 500)
    }
}
