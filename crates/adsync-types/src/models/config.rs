//! Application configuration models.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::ids::EntityRef;
use crate::error::ConfigError;

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub gate: GateConfig,
    /// PostgreSQL URL; when absent the in-memory store with JSON snapshot is used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    /// Network used when a request does not name one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_network: Option<EntityRef>,
    /// Persist the in-memory store to `store.json` in the data directory
    #[serde(default = "default_true")]
    pub persist_snapshot: bool,
}

const fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            remote: RemoteConfig::default(),
            gate: GateConfig::default(),
            database_url: None,
            default_network: None,
            persist_snapshot: true,
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remote.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                field: "remote.base_url".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.gate.max_wait_secs == 0 {
            return Err(ConfigError::ValidationError {
                field: "gate.max_wait_secs".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8046 }
    }
}

impl ServerConfig {
    pub fn get_bind_address(&self) -> &str {
        &self.host
    }
}

/// Remote ad server API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteConfig {
    pub base_url: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

const fn default_request_timeout() -> u64 {
    60
}

const fn default_connect_timeout() -> u64 {
    10
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9090/api/1".to_string(),
            access_token: String::new(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// Request Gate throttling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GateConfig {
    /// Minimum spacing between consecutive remote requests
    pub min_interval_ms: u64,
    /// Bound on how long a caller may wait for its turn
    pub max_wait_secs: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self { min_interval_ms: 5_000, max_wait_secs: 300 }
    }
}

impl GateConfig {
    pub const fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub const fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"remote": {"base_url": "https://ads.test/api/1"}}"#).unwrap();
        assert_eq!(config.gate.min_interval(), Duration::from_secs(5));
        assert_eq!(config.remote.request_timeout_secs, 60);
        assert_eq!(config.server.port, 8046);
        assert!(config.persist_snapshot);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let mut config = AppConfig::default();
        config.remote.base_url = "  ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError { .. })));
    }
}
