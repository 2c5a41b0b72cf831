//! Sync orchestrator: validate, then run the fixed step sequence.
//!
//! `idle → validating → {aborted | running(step)} → completed`. Both the
//! synchronous and the streaming surfaces call [`SyncOrchestrator::run`]; they
//! only differ in the sink they pass.

use chrono::Utc;

use adsync_types::models::{
    EntityRef, PendingCounts, StepReport, SyncEvent, SyncPhase, SyncReport, SyncStep,
};
use adsync_types::SyncError;

use super::cleanup::run_cleanup;
use super::gate::RequestGate;
use super::placements::PlacementSyncer;
use super::progress::ProgressSink;
use super::syncer::EntitySyncer;
use super::validator::DryRunValidator;
use crate::metrics::record_sync_run;
use crate::modules::SyncRepository;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Network to sync; `None` means every network.
    pub scope: Option<EntityRef>,
    /// Rerun the entity steps once when they report nothing despite pending work.
    pub fallback: bool,
}

pub struct SyncOrchestrator<'a> {
    store: &'a dyn SyncRepository,
    gate: &'a RequestGate,
}

impl<'a> SyncOrchestrator<'a> {
    pub fn new(store: &'a dyn SyncRepository, gate: &'a RequestGate) -> Self {
        Self { store, gate }
    }

    pub async fn run(&self, options: RunOptions, sink: &dyn ProgressSink) -> SyncReport {
        let mut report = SyncReport::started();
        sink.emit(SyncEvent::status(SyncPhase::Validating, "Validating pending entities...", 0));

        let dry_run = match DryRunValidator::new(self.store).validate(options.scope).await {
            Ok(dry_run) => dry_run,
            Err(e) => {
                tracing::error!("Dry run could not read the store: {}", e);
                return self.finish_error(report, sink, SyncPhase::Validating, format!("Validation failed: {e}"), 0);
            },
        };
        let pending = dry_run.pending;
        let valid = dry_run.valid;
        report.dry_run = Some(dry_run.clone());

        if !valid {
            let err = SyncError::ValidationError {
                errors: dry_run.errors.iter().map(ToString::to_string).collect(),
            };
            tracing::warn!("Sync aborted: {}", err);
            report.aborted = true;
            let mut event_report = report.clone();
            event_report.finished_at = Some(Utc::now());
            let mut event = SyncEvent::error(SyncPhase::Aborted, err.to_string(), 0, event_report.clone());
            event.dry_run = Some(dry_run);
            sink.emit(event);
            record_sync_run("aborted");
            return event_report;
        }

        let mut status = SyncEvent::status(SyncPhase::Running, "Validation passed", 0);
        status.dry_run = Some(dry_run);
        sink.emit(status);

        let mut progress: u8 = 0;
        for step in SyncStep::ALL {
            sink.emit(SyncEvent::step_start(step, progress));
            let step_report = self.run_step(step, options.scope).await;
            progress = progress.saturating_add(step.weight()).min(100);
            let failed = !step_report.success;
            sink.emit(SyncEvent::step_finished(step_report.clone(), progress));
            report.results.insert(step, step_report);

            if step == SyncStep::Cleanup && failed {
                let detail = report
                    .results
                    .get(&step)
                    .and_then(|r| r.error.clone())
                    .unwrap_or_else(|| "cleanup failed".to_string());
                return self.finish_error(report, sink, SyncPhase::Running, detail, progress);
            }
        }

        if options.fallback {
            self.apply_fallback(&mut report, pending, options.scope, sink).await;
        }

        report.success = report.all_steps_succeeded();
        report.finished_at = Some(Utc::now());
        record_sync_run(if report.success { "success" } else { "partial" });
        tracing::info!(
            success = report.success,
            created = report.created_total(),
            processed = report.entity_total(),
            "Sync run finished"
        );
        sink.emit(SyncEvent::complete(report.clone()));
        report
    }

    fn finish_error(
        &self,
        mut report: SyncReport,
        sink: &dyn ProgressSink,
        phase: SyncPhase,
        message: String,
        progress: u8,
    ) -> SyncReport {
        report.success = false;
        report.finished_at = Some(Utc::now());
        record_sync_run("failed");
        sink.emit(SyncEvent::error(phase, message, progress, report.clone()));
        report
    }

    async fn run_step(&self, step: SyncStep, scope: Option<EntityRef>) -> StepReport {
        tracing::info!("Step {}/{}: {}", step.position(), SyncStep::ALL.len(), step);
        let results = match (step, step.entity_kind()) {
            (SyncStep::Cleanup, _) => {
                return match run_cleanup(self.store).await {
                    Ok(report) => report,
                    Err(e) => StepReport::errored(step, e.to_string()),
                };
            },
            (_, Some(kind)) => EntitySyncer::new(self.store, self.gate).sync(kind, scope).await,
            _ => PlacementSyncer::new(self.store, self.gate).sync(scope).await,
        };
        match results {
            Ok(results) => StepReport::from_results(step, results),
            Err(e) => {
                tracing::warn!("Step {} could not run: {}", step, e);
                StepReport::errored(step, e.to_string())
            },
        }
    }

    /// One bounded rerun of the entity steps when they all came back empty.
    async fn apply_fallback(
        &self,
        report: &mut SyncReport,
        pending: PendingCounts,
        scope: Option<EntityRef>,
        sink: &dyn ProgressSink,
    ) {
        if report.entity_total() > 0 || pending.entities() == 0 {
            return;
        }
        tracing::warn!(
            pending = pending.entities(),
            "Entity steps reported nothing despite pending entities, rerunning once"
        );
        sink.emit(SyncEvent::status(SyncPhase::Running, "Rerunning entity steps", 100));
        for step in SyncStep::ALL.into_iter().filter(|s| s.entity_kind().is_some()) {
            let step_report = self.run_step(step, scope).await;
            report.results.insert(step, step_report);
        }
        report.fallback_applied = true;
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
