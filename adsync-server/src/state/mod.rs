//! Application State
//!
//! Holds the sync engine and the configuration the handlers need.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use adsync_core::SyncEngine;
use adsync_types::models::AppConfig;
use adsync_types::EntityRef;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub(crate) inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    pub engine: SyncEngine,
    pub default_network: Option<EntityRef>,
    pub started_at: Instant,
}

impl AppState {
    /// Open the engine described by `config`.
    pub async fn initialize(config: &AppConfig, data_dir: &Path) -> Result<Self> {
        let engine = SyncEngine::open(config, data_dir).await?;
        Ok(Self::with_engine(engine, config.default_network))
    }

    pub fn with_engine(engine: SyncEngine, default_network: Option<EntityRef>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { engine, default_network, started_at: Instant::now() }),
        }
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.inner.engine
    }

    /// Request scope: the explicit network, else the configured default, else every network.
    pub fn scope(&self, requested: Option<EntityRef>) -> Option<EntityRef> {
        requested.or(self.inner.default_network)
    }

    pub fn uptime_secs(&self) -> u64 {
        self.inner.started_at.elapsed().as_secs()
    }
}
