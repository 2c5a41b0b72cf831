//! Typed progress events written by the orchestrator.

use serde::{Deserialize, Serialize};

use super::report::{DryRunReport, StepReport, SyncReport, SyncStep};

/// Orchestrator state machine: `idle → validating → {aborted | running(step)} → completed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    Idle,
    Validating,
    Aborted,
    Running,
    Completed,
}

/// SSE event names.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SyncEventKind {
    Status,
    StepStart,
    StepComplete,
    StepError,
    Complete,
    Error,
}

impl SyncEventKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::StepStart => "step-start",
            Self::StepComplete => "step-complete",
            Self::StepError => "step-error",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncEvent {
    #[serde(rename = "type")]
    pub kind: SyncEventKind,
    pub phase: SyncPhase,
    pub message: String,
    /// Cumulative progress, 0..=100.
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<SyncStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_steps: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_result: Option<StepReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<DryRunReport>,
    /// Present on terminal events; partial on `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<SyncReport>,
}

impl SyncEvent {
    pub fn status(phase: SyncPhase, message: impl Into<String>, progress: u8) -> Self {
        Self {
            kind: SyncEventKind::Status,
            phase,
            message: message.into(),
            progress,
            step: None,
            current_step: None,
            total_steps: None,
            step_result: None,
            dry_run: None,
            report: None,
        }
    }

    pub fn step_start(step: SyncStep, progress: u8) -> Self {
        Self {
            kind: SyncEventKind::StepStart,
            step: Some(step),
            current_step: Some(step.position()),
            total_steps: Some(SyncStep::ALL.len()),
            ..Self::status(SyncPhase::Running, format!("Syncing {step}..."), progress)
        }
    }

    /// `step-complete` when the step succeeded, `step-error` otherwise.
    pub fn step_finished(report: StepReport, progress: u8) -> Self {
        let step = report.step;
        let (kind, message) = if report.success {
            (SyncEventKind::StepComplete, format!("{step}: {} processed", report.count))
        } else {
            let detail = report.error.clone().unwrap_or_else(|| "step failed".to_string());
            (SyncEventKind::StepError, format!("{step}: {detail}"))
        };
        Self {
            kind,
            step: Some(step),
            current_step: Some(step.position()),
            total_steps: Some(SyncStep::ALL.len()),
            step_result: Some(report),
            ..Self::status(SyncPhase::Running, message, progress)
        }
    }

    pub fn complete(report: SyncReport) -> Self {
        let message = if report.success {
            "Sync completed".to_string()
        } else {
            "Sync completed with errors".to_string()
        };
        Self { kind: SyncEventKind::Complete, report: Some(report), ..Self::status(SyncPhase::Completed, message, 100) }
    }

    pub fn error(phase: SyncPhase, message: impl Into<String>, progress: u8, report: SyncReport) -> Self {
        Self { kind: SyncEventKind::Error, report: Some(report), ..Self::status(phase, message, progress) }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let event = SyncEvent::step_start(SyncStep::Zones, 30);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "step-start");
        assert_eq!(json["phase"], "running");
        assert_eq!(json["currentStep"], 4);
        assert_eq!(json["totalSteps"], 7);
        assert_eq!(json["progress"], 30);
    }

    #[test]
    fn test_failed_step_emits_step_error() {
        let report = StepReport::errored(SyncStep::Cleanup, "store offline");
        let event = SyncEvent::step_finished(report, 5);
        assert_eq!(event.kind, SyncEventKind::StepError);
        assert!(event.message.contains("store offline"));
    }
}
