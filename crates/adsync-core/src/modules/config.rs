//! Configuration loading: JSON file in the data directory plus environment overrides.

use std::fs;
use std::path::{Path, PathBuf};

use adsync_types::models::AppConfig;
use adsync_types::ConfigError;

const DATA_DIR: &str = ".adsync";
const CONFIG_FILE: &str = "adsync_config.json";

/// Get the data directory, creating it when missing.
///
/// `ADSYNC_DATA_DIR` overrides the default `~/.adsync`.
pub fn get_data_dir() -> Result<PathBuf, ConfigError> {
    let data_dir = if let Ok(custom_dir) = std::env::var("ADSYNC_DATA_DIR") {
        PathBuf::from(custom_dir)
    } else {
        let home = dirs::home_dir().ok_or_else(|| ConfigError::DataDir {
            message: "Cannot get home directory".to_string(),
        })?;
        home.join(DATA_DIR)
    };

    if !data_dir.exists() {
        fs::create_dir_all(&data_dir).map_err(|e| ConfigError::DataDir {
            message: format!("Failed to create data directory: {e}"),
        })?;
    }

    Ok(data_dir)
}

/// Load configuration from the data directory and apply environment overrides.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let data_dir = get_data_dir()?;
    let mut config = load_config_from(&data_dir)?;
    apply_overrides(&mut config, |key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// Read `adsync_config.json` from `dir`; a missing file yields defaults.
pub fn load_config_from(dir: &Path) -> Result<AppConfig, ConfigError> {
    let config_path = dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(AppConfig::default());
    }

    let content = fs::read_to_string(&config_path).map_err(|e| ConfigError::ParseError {
        message: format!("Failed to read {}: {e}", config_path.display()),
    })?;
    serde_json::from_str(&content).map_err(|e| ConfigError::from_json_error(&e))
}

/// Save configuration atomically (temp file, then rename).
pub fn save_config_to(dir: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    let config_path = dir.join(CONFIG_FILE);
    let temp_path = dir.join(format!("{CONFIG_FILE}.tmp"));

    let content = serde_json::to_string_pretty(config).map_err(|e| ConfigError::from_json_error(&e))?;
    fs::write(&temp_path, content).map_err(|e| ConfigError::from_io_error(&e))?;
    fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::from_io_error(&e))
}

/// Apply `ADSYNC_*` / `DATABASE_URL` overrides from `lookup`.
pub fn apply_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup("ADSYNC_PORT").and_then(|p| p.parse().ok()) {
        config.server.port = port;
    }
    if let Some(url) = lookup("ADSYNC_REMOTE_URL") {
        let url = url.trim().trim_end_matches('/').to_string();
        if url::Url::parse(&url).is_ok() {
            config.remote.base_url = url;
        } else {
            tracing::warn!("ADSYNC_REMOTE_URL is not a valid URL, keeping configured value");
        }
    }
    if let Some(token) = lookup("ADSYNC_ACCESS_TOKEN") {
        config.remote.access_token = token;
    }
    if let Some(db) = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()) {
        config.database_url = Some(db);
    }
    if let Some(network) = lookup("ADSYNC_DEFAULT_NETWORK").and_then(|n| n.parse().ok()) {
        config.default_network = Some(network);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use adsync_types::EntityRef;
    use std::collections::HashMap;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(dir.path()).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.gate.min_interval_ms = 2_500;
        config.default_network = Some(EntityRef::Remote(9001));

        save_config_to(dir.path(), &config).unwrap();
        assert!(!dir.path().join("adsync_config.json.tmp").exists());

        let loaded = load_config_from(dir.path()).unwrap();
        assert_eq!(loaded.gate.min_interval_ms, 2_500);
        assert_eq!(loaded.default_network, Some(EntityRef::Remote(9001)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("ADSYNC_PORT", "9100"),
            ("ADSYNC_REMOTE_URL", "https://ads.test/api/1/"),
            ("ADSYNC_ACCESS_TOKEN", "tok"),
            ("DATABASE_URL", "postgres://localhost/adsync"),
            ("ADSYNC_DEFAULT_NETWORK", "9001"),
        ]);
        let mut config = AppConfig::default();
        apply_overrides(&mut config, |k| env.get(k).map(|v| (*v).to_string()));

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.remote.base_url, "https://ads.test/api/1");
        assert_eq!(config.remote.access_token, "tok");
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/adsync"));
        assert_eq!(config.default_network, Some(EntityRef::Remote(9001)));
    }

    #[test]
    fn test_invalid_remote_url_is_ignored() {
        let mut config = AppConfig::default();
        let before = config.remote.base_url.clone();
        apply_overrides(&mut config, |k| (k == "ADSYNC_REMOTE_URL").then(|| "not a url".to_string()));
        assert_eq!(config.remote.base_url, before);
    }
}
