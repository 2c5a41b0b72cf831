//! Process-wide engine handle shared by the HTTP surface and the CLI.

use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};

use adsync_types::models::{
    AppConfig, CleanupReport, CombinatorReport, DryRunReport, EntityRef, PendingCounts,
    PlacementBatch, SyncEvent, SyncReport,
};

use super::gate::{GateStatus, RequestGate};
use super::orchestrator::{RunOptions, SyncOrchestrator};
use super::placements::PlacementCombinator;
use super::progress::{NullSink, ProgressSink};
use super::trigger::ValidationTrigger;
use super::validator::DryRunValidator;
use crate::error::AppResult;
use crate::modules::{MemoryRepository, PostgresSyncRepository, SyncRepository};
use crate::remote::HttpAdServerClient;

const SNAPSHOT_FILE: &str = "store.json";

struct EngineInner {
    store: Arc<dyn SyncRepository>,
    gate: Arc<RequestGate>,
    trigger: ValidationTrigger,
}

#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn SyncRepository>, gate: Arc<RequestGate>) -> Self {
        let trigger = ValidationTrigger::new(Arc::clone(&store));
        Self { inner: Arc::new(EngineInner { store, gate, trigger }) }
    }

    /// Build the store, remote client and gate described by `config`.
    pub async fn open(config: &AppConfig, data_dir: &Path) -> AppResult<Self> {
        let store: Arc<dyn SyncRepository> = match config.database_url.as_deref() {
            Some(url) => {
                let repo = PostgresSyncRepository::connect(url).await?;
                repo.run_migrations().await?;
                tracing::info!("Using PostgreSQL store");
                Arc::new(repo)
            },
            None if config.persist_snapshot => {
                tokio::fs::create_dir_all(data_dir).await?;
                Arc::new(MemoryRepository::with_snapshot(data_dir.join(SNAPSHOT_FILE)).await?)
            },
            None => {
                tracing::info!("Using in-memory store without snapshot");
                Arc::new(MemoryRepository::new())
            },
        };

        let client = HttpAdServerClient::from_config(&config.remote)?;
        tracing::info!("Remote API at {}", client.base_url());
        let gate = Arc::new(RequestGate::new(Arc::new(client), &config.gate));
        Ok(Self::new(store, gate))
    }

    pub fn store(&self) -> &Arc<dyn SyncRepository> {
        &self.inner.store
    }

    pub fn gate(&self) -> &Arc<RequestGate> {
        &self.inner.gate
    }

    pub fn trigger(&self) -> &ValidationTrigger {
        &self.inner.trigger
    }

    pub fn gate_status(&self) -> GateStatus {
        self.inner.gate.status()
    }

    pub async fn dry_run(&self, scope: Option<EntityRef>) -> AppResult<DryRunReport> {
        Ok(DryRunValidator::new(self.inner.store.as_ref()).validate(scope).await?)
    }

    pub async fn pending(&self, scope: Option<EntityRef>) -> AppResult<PendingCounts> {
        Ok(self.dry_run(scope).await?.pending)
    }

    pub async fn sync_all(&self, scope: Option<EntityRef>) -> SyncReport {
        self.sync_with_sink(RunOptions { scope, fallback: false }, &NullSink).await
    }

    /// Full sync with the one-time fallback rerun enabled.
    pub async fn sync_local_all(&self, scope: Option<EntityRef>) -> SyncReport {
        self.sync_with_sink(RunOptions { scope, fallback: true }, &NullSink).await
    }

    /// Run the pipeline; a successful run starts the background validation.
    pub async fn sync_with_sink(&self, options: RunOptions, sink: &dyn ProgressSink) -> SyncReport {
        let orchestrator = SyncOrchestrator::new(self.inner.store.as_ref(), self.inner.gate.as_ref());
        let report = orchestrator.run(options, sink).await;
        if report.success && self.inner.trigger.start(options.scope).is_none() {
            tracing::debug!("Background validation already running for this scope");
        }
        report
    }

    /// Start a run in a detached task and hand back its event stream.
    /// The run continues if the receiver is dropped.
    pub fn stream(&self, options: RunOptions) -> UnboundedReceiver<SyncEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = self.clone();
        tokio::spawn(async move {
            engine.sync_with_sink(options, &tx).await;
        });
        rx
    }

    pub async fn create_placements(&self, batch: &PlacementBatch) -> AppResult<CombinatorReport> {
        PlacementCombinator::new(self.inner.store.as_ref(), self.inner.gate.as_ref())
            .create_placements(batch)
            .await
    }

    pub async fn cleanup_placements(&self, batch: &PlacementBatch) -> AppResult<CleanupReport> {
        PlacementCombinator::new(self.inner.store.as_ref(), self.inner.gate.as_ref())
            .cleanup_placements(batch)
            .await
    }
}
