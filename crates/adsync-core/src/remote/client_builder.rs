use std::time::Duration;

use adsync_types::models::RemoteConfig;

/// Build the HTTP client with bounded connect and request timeouts.
pub fn build_http_client(config: &RemoteConfig) -> Result<reqwest::Client, String> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs.max(5)))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs.max(1)))
        .tcp_nodelay(true)
        .user_agent(concat!("adsync/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| format!("Failed to build HTTP client: {}", e))
}
