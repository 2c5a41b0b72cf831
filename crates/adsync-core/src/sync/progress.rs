//! Event sinks the orchestrator writes progress to.

use tokio::sync::mpsc::UnboundedSender;

use adsync_types::models::SyncEvent;

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: SyncEvent);
}

/// Discards intermediate events; the synchronous surface only needs the final report.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: SyncEvent) {}
}

/// Streaming surface. A closed receiver (client went away) does not stop the run.
impl ProgressSink for UnboundedSender<SyncEvent> {
    fn emit(&self, event: SyncEvent) {
        if self.send(event).is_err() {
            tracing::trace!("Progress receiver dropped, continuing without it");
        }
    }
}
