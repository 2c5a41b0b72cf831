//! Dry-run validator: read-only pre-flight over a network's pending entities.

use std::collections::HashMap;

use adsync_types::models::{
    DryRunReport, Entity, EntityKind, EntityRef, ValidationIssue,
};

use super::index::IdIndex;
use crate::modules::{EntityFilter, RepoResult, SyncRepository};

pub struct DryRunValidator<'a> {
    store: &'a dyn SyncRepository,
}

fn issue(entity: &Entity, field: &str, message: String) -> ValidationIssue {
    ValidationIssue {
        entity_kind: entity.kind(),
        local_id: entity.local_id(),
        field: field.to_string(),
        message,
    }
}

impl<'a> DryRunValidator<'a> {
    pub fn new(store: &'a dyn SyncRepository) -> Self {
        Self { store }
    }

    /// Never writes to the store and never calls the remote API.
    pub async fn validate(&self, scope: Option<EntityRef>) -> RepoResult<DryRunReport> {
        let mut all = Vec::new();
        for kind in EntityKind::ALL {
            all.extend(self.store.list(kind, EntityFilter::all()).await?);
        }
        let index = IdIndex::from_entities(&all);
        let in_scope: Vec<&Entity> = all.iter().filter(|e| index.in_scope(e, scope)).collect();

        let mut report = DryRunReport::default();
        for kind in EntityKind::ALL {
            let count = in_scope.iter().filter(|e| e.kind() == kind && e.meta().is_pending()).count();
            report.pending.set(kind, count);
        }
        report.pending.placements = self.pending_placements(&index, scope).await?;

        for entity in in_scope.iter().filter(|e| e.meta().is_pending()) {
            check_parents(entity, &index, &mut report.errors);
            check_history(entity, &mut report.warnings);
            if let Entity::Campaign(c) = entity {
                if let (Some(start), Some(end)) = (c.start_date, c.end_date) {
                    if end < start {
                        report.warnings.push(issue(
                            entity,
                            "end_date",
                            format!("end date {end} precedes start date {start}"),
                        ));
                    }
                }
            }
        }
        check_zone_aliases(&in_scope, &index, &mut report.warnings);

        report.valid = report.errors.is_empty();
        tracing::info!(
            valid = report.valid,
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "Dry run for {}",
            scope.map_or_else(|| "all networks".to_string(), |s| format!("network {s}"))
        );
        Ok(report)
    }

    async fn pending_placements(&self, index: &IdIndex, scope: Option<EntityRef>) -> RepoResult<usize> {
        Ok(self
            .store
            .list_placements()
            .await?
            .iter()
            .filter(|s| s.placement.meta.is_pending())
            .filter(|s| index.placement_in_scope(&s.placement, scope))
            .count())
    }
}

/// A parent is acceptable when it is already remote or will be pushed earlier in the run.
fn check_parent(
    entity: &Entity,
    field: &str,
    kind: EntityKind,
    reference: EntityRef,
    index: &IdIndex,
    errors: &mut Vec<ValidationIssue>,
) {
    if !index.exists(kind, reference) {
        errors.push(issue(entity, field, format!("references missing {kind} {reference}")));
    } else if index.remote_id(kind, reference).is_none() && !index.is_pending(kind, reference) {
        errors.push(issue(
            entity,
            field,
            format!("{kind} {reference} is neither remote nor pending"),
        ));
    }
}

fn check_parents(entity: &Entity, index: &IdIndex, errors: &mut Vec<ValidationIssue>) {
    if let Some(network) = entity.network() {
        check_parent(entity, "network", EntityKind::Network, network, index, errors);
    }
    if let Some(advertiser) = entity.advertiser() {
        check_parent(entity, "advertiser", EntityKind::Advertiser, advertiser, index, errors);
    }
}

fn check_history(entity: &Entity, warnings: &mut Vec<ValidationIssue>) {
    let errors = &entity.meta().sync_errors;
    if let Some(last) = errors.last() {
        warnings.push(issue(
            entity,
            "sync_errors",
            format!("retrying after {} earlier failure(s); last: {}", errors.len(), last.message),
        ));
    }
}

fn check_zone_aliases(in_scope: &[&Entity], index: &IdIndex, warnings: &mut Vec<ValidationIssue>) {
    let network = |e: &Entity| e.network().map(|n| index.canonical(EntityKind::Network, n));
    let mut by_alias: HashMap<(Option<EntityRef>, String), usize> = HashMap::new();
    let zones: Vec<(&Entity, String)> = in_scope
        .iter()
        .filter_map(|e| match e {
            Entity::Zone(z) => z
                .alias
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(|a| (*e, a.to_lowercase())),
            _ => None,
        })
        .collect();
    for (entity, alias) in &zones {
        *by_alias.entry((network(*entity), alias.clone())).or_default() += 1;
    }
    for (entity, alias) in &zones {
        let shared = by_alias.get(&(network(*entity), alias.clone())).is_some_and(|n| *n > 1);
        if entity.meta().is_pending() && shared {
            warnings.push(issue(entity, "alias", format!("alias '{alias}' is used by another zone")));
        }
    }
}
