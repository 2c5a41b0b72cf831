//! Per-entity results, per-step reports, run reports and dry-run reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ids::{EntityKind, LocalId};
use crate::error::ErrorCode;

/// What happened to one pending entity during a step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SyncOutcome {
    Created,
    Updated,
    /// Parent not resolvable yet; skipped, not failed.
    Blocked,
    Failed,
}

impl SyncOutcome {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Blocked => "blocked",
            Self::Failed => "failed",
        }
    }
}

/// Outcome for one entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncResult {
    pub success: bool,
    pub outcome: SyncOutcome,
    pub local_entity: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_entity: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
}

impl SyncResult {
    pub fn pushed(
        outcome: SyncOutcome,
        local_entity: serde_json::Value,
        remote_entity: serde_json::Value,
    ) -> Self {
        Self {
            success: true,
            outcome,
            local_entity,
            remote_entity: Some(remote_entity),
            error: None,
            error_code: None,
        }
    }

    pub fn blocked(local_entity: serde_json::Value, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            outcome: SyncOutcome::Blocked,
            local_entity,
            remote_entity: None,
            error: Some(reason.into()),
            error_code: Some(ErrorCode::DependencyBlocked),
        }
    }

    pub fn failed(local_entity: serde_json::Value, code: ErrorCode, error: impl Into<String>) -> Self {
        Self {
            success: false,
            outcome: SyncOutcome::Failed,
            local_entity,
            remote_entity: None,
            error: Some(error.into()),
            error_code: Some(code),
        }
    }
}

/// Pipeline steps in their fixed execution order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SyncStep {
    Cleanup,
    Networks,
    Advertisers,
    Zones,
    Campaigns,
    Advertisements,
    Placements,
}

impl SyncStep {
    pub const ALL: [Self; 7] = [
        Self::Cleanup,
        Self::Networks,
        Self::Advertisers,
        Self::Zones,
        Self::Campaigns,
        Self::Advertisements,
        Self::Placements,
    ];

    /// Progress weight; the weights of all steps sum to 100.
    pub const fn weight(self) -> u8 {
        match self {
            Self::Cleanup => 5,
            Self::Networks => 10,
            Self::Advertisers | Self::Zones | Self::Placements => 15,
            Self::Campaigns | Self::Advertisements => 20,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cleanup => "cleanup",
            Self::Networks => "networks",
            Self::Advertisers => "advertisers",
            Self::Zones => "zones",
            Self::Campaigns => "campaigns",
            Self::Advertisements => "advertisements",
            Self::Placements => "placements",
        }
    }

    /// Entity kind pushed by this step, if it is a generic entity step.
    pub const fn entity_kind(self) -> Option<EntityKind> {
        match self {
            Self::Networks => Some(EntityKind::Network),
            Self::Advertisers => Some(EntityKind::Advertiser),
            Self::Zones => Some(EntityKind::Zone),
            Self::Campaigns => Some(EntityKind::Campaign),
            Self::Advertisements => Some(EntityKind::Advertisement),
            Self::Cleanup | Self::Placements => None,
        }
    }

    /// 1-based position in the pipeline.
    pub fn position(self) -> usize {
        Self::ALL.iter().position(|s| *s == self).map_or(0, |i| i + 1)
    }
}

impl std::fmt::Display for SyncStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one pipeline step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepReport {
    pub step: SyncStep,
    pub success: bool,
    /// Entities processed (all outcomes).
    pub count: usize,
    pub created: usize,
    pub updated: usize,
    pub blocked: usize,
    pub failed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<SyncResult>,
}

impl StepReport {
    /// Aggregate per-entity outcomes; a step succeeds iff nothing failed.
    pub fn from_results(step: SyncStep, results: Vec<SyncResult>) -> Self {
        let tally = |o: SyncOutcome| results.iter().filter(|r| r.outcome == o).count();
        let created = tally(SyncOutcome::Created);
        let updated = tally(SyncOutcome::Updated);
        let blocked = tally(SyncOutcome::Blocked);
        let failed = tally(SyncOutcome::Failed);
        let error = (failed > 0).then(|| format!("{failed} {step} failed to sync"));
        Self {
            step,
            success: failed == 0,
            count: results.len(),
            created,
            updated,
            blocked,
            failed,
            error,
            results,
        }
    }

    /// A step that could not run at all.
    pub fn errored(step: SyncStep, error: impl Into<String>) -> Self {
        Self {
            step,
            success: false,
            count: 0,
            created: 0,
            updated: 0,
            blocked: 0,
            failed: 0,
            error: Some(error.into()),
            results: Vec::new(),
        }
    }
}

/// Final report of a run; identical shape for the synchronous and streaming surfaces.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub success: bool,
    /// True when the dry-run refused the pipeline.
    #[serde(default)]
    pub aborted: bool,
    #[serde(default)]
    pub fallback_applied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<DryRunReport>,
    pub results: BTreeMap<SyncStep, StepReport>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl SyncReport {
    pub fn started() -> Self {
        Self {
            success: false,
            aborted: false,
            fallback_applied: false,
            dry_run: None,
            results: BTreeMap::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Entities processed by the five entity steps.
    pub fn entity_total(&self) -> usize {
        self.results
            .iter()
            .filter(|(step, _)| step.entity_kind().is_some())
            .map(|(_, r)| r.count)
            .sum()
    }

    pub fn created_total(&self) -> usize {
        self.results.values().map(|r| r.created).sum()
    }

    /// Conjunction of every recorded step's success flag.
    pub fn all_steps_succeeded(&self) -> bool {
        !self.results.is_empty() && self.results.values().all(|r| r.success)
    }
}

/// One validator finding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationIssue {
    pub entity_kind: EntityKind,
    pub local_id: LocalId,
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} [{}]: {}", self.entity_kind, self.local_id, self.field, self.message)
    }
}

/// Locally pending entity counts per kind.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingCounts {
    pub networks: usize,
    pub advertisers: usize,
    pub zones: usize,
    pub campaigns: usize,
    pub advertisements: usize,
    pub placements: usize,
}

impl PendingCounts {
    pub fn set(&mut self, kind: EntityKind, count: usize) {
        match kind {
            EntityKind::Network => self.networks = count,
            EntityKind::Advertiser => self.advertisers = count,
            EntityKind::Zone => self.zones = count,
            EntityKind::Campaign => self.campaigns = count,
            EntityKind::Advertisement => self.advertisements = count,
        }
    }

    pub const fn entities(&self) -> usize {
        self.networks + self.advertisers + self.zones + self.campaigns + self.advertisements
    }
}

/// Read-only pre-flight verdict.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DryRunReport {
    pub valid: bool,
    pub warnings: Vec<ValidationIssue>,
    pub errors: Vec<ValidationIssue>,
    #[serde(default)]
    pub pending: PendingCounts,
}
