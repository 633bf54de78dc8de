//! Consistency diagnosis and explicit record recovery.
//!
//! `check` is purely diagnostic: data problems are rows in its report, never
//! errors, and nothing is mutated. Repair happens only through `recover` /
//! `recover_missing`, which an operator invokes deliberately.

use crate::audit::{AuditEntry, AuditKind, AuditLog};
use crate::core::{OrderRecord, OrderStatus, Result, VaultError};
use crate::store::RecordStore;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::warn;

/// Everything `check` observed about the store, in one report.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub checked_at: DateTime<Utc>,
    pub active_count: usize,
    pub archived_count: usize,
    /// Ids present in both the active and archive sets. Must be empty.
    pub duplicate_ids: Vec<u64>,
    /// Active records missing a required field.
    pub incomplete_ids: Vec<u64>,
    /// Ids referenced by the audit log but absent from both sets.
    pub orphan_ids: Vec<u64>,
    /// Dispatched records with no dispatch timestamp.
    pub dispatched_without_date: Vec<u64>,
    /// Dispatched records past the retention threshold still in the active
    /// set.
    pub overdue_for_archive: usize,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.duplicate_ids.is_empty()
            && self.incomplete_ids.is_empty()
            && self.orphan_ids.is_empty()
            && self.dispatched_without_date.is_empty()
            && self.overdue_for_archive == 0
    }

    /// Human-readable issue lines for operator output.
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if !self.duplicate_ids.is_empty() {
            issues.push(format!(
                "{} record(s) present in both active and archive sets: {:?}",
                self.duplicate_ids.len(),
                self.duplicate_ids
            ));
        }
        if !self.incomplete_ids.is_empty() {
            issues.push(format!(
                "{} record(s) missing required fields: {:?}",
                self.incomplete_ids.len(),
                self.incomplete_ids
            ));
        }
        if !self.orphan_ids.is_empty() {
            issues.push(format!(
                "{} record(s) in the audit log but absent from the store: {:?}",
                self.orphan_ids.len(),
                self.orphan_ids
            ));
        }
        if !self.dispatched_without_date.is_empty() {
            issues.push(format!(
                "{} dispatched record(s) without a dispatch date: {:?}",
                self.dispatched_without_date.len(),
                self.dispatched_without_date
            ));
        }
        if self.overdue_for_archive > 0 {
            issues.push(format!(
                "{} dispatched record(s) past the retention threshold awaiting archival",
                self.overdue_for_archive
            ));
        }
        issues
    }
}

pub struct IntegrityChecker {
    retention: Duration,
}

impl IntegrityChecker {
    pub fn new(archive_after_days: i64) -> Self {
        Self {
            retention: Duration::days(archive_after_days),
        }
    }

    /// Diagnose the store against the audit log. Read-only.
    pub fn check(
        &self,
        store: &RecordStore,
        audit: &AuditLog,
        now: DateTime<Utc>,
    ) -> Result<IntegrityReport> {
        let active_ids: BTreeSet<u64> = store.active_ids().into_iter().collect();
        let archived_ids: BTreeSet<u64> = store.archived_ids().into_iter().collect();

        let duplicate_ids: Vec<u64> = active_ids.intersection(&archived_ids).copied().collect();

        let incomplete_ids: Vec<u64> = store
            .active_records()
            .filter(|r| !r.is_complete())
            .map(|r| r.id)
            .collect();

        let mut dispatched_without_date: Vec<u64> = store
            .active_records()
            .filter(|r| r.status == OrderStatus::Dispatched && r.date_dispatched.is_none())
            .map(|r| r.id)
            .collect();
        dispatched_without_date.extend(
            store
                .archived_records()
                .filter(|a| a.record.date_dispatched.is_none())
                .map(|a| a.original_id),
        );

        let audited_ids: BTreeSet<u64> =
            audit.read_all()?.iter().map(|e| e.record_id).collect();
        let orphan_ids: Vec<u64> = audited_ids
            .iter()
            .filter(|id| !active_ids.contains(id) && !archived_ids.contains(id))
            .copied()
            .collect();

        let overdue_for_archive = store
            .active_records()
            .filter(|r| r.status == OrderStatus::Dispatched)
            .filter(|r| {
                r.date_dispatched
                    .is_some_and(|dispatched| now - dispatched >= self.retention)
            })
            .count();

        Ok(IntegrityReport {
            checked_at: now,
            active_count: active_ids.len(),
            archived_count: archived_ids.len(),
            duplicate_ids,
            incomplete_ids,
            orphan_ids,
            dispatched_without_date,
            overdue_for_archive,
        })
    }
}

/// Reconstruct one missing record from its most recent audit entry and
/// re-insert it into the active set. Archive membership is never recreated
/// here; it is re-derived through the normal archival path.
pub fn recover(store: &mut RecordStore, audit: &mut AuditLog, id: u64) -> Result<OrderRecord> {
    if store.contains(id) {
        return Err(VaultError::Validation(format!(
            "Record #{} already exists; nothing to recover",
            id
        )));
    }
    let entry = audit
        .latest_for(id)?
        .ok_or(VaultError::Unrecoverable(id))?;
    if !entry.verify_checksum() {
        return Err(VaultError::IntegrityViolation(format!(
            "Audit payload checksum mismatch for record #{}",
            id
        )));
    }
    let record = entry.payload;
    audit.append(&AuditEntry::new(AuditKind::Create, &record)?)?;
    store.insert_active(record.clone());
    warn!(record_id = id, "recovered record from audit log");
    Ok(record)
}

/// Explicit bulk sweep: recover every id the audit log knows that the store
/// has lost. Returns the recovered ids; individual failures are logged and
/// skipped so one bad entry does not abort the scan.
pub fn recover_missing(store: &mut RecordStore, audit: &mut AuditLog) -> Result<Vec<u64>> {
    let known_ids: BTreeSet<u64> = audit.read_all()?.iter().map(|e| e.record_id).collect();
    let mut recovered = Vec::new();
    for id in known_ids {
        if store.contains(id) {
            continue;
        }
        match recover(store, audit, id) {
            Ok(_) => recovered.push(id),
            Err(e) => warn!(record_id = id, error = %e, "failed to recover record"),
        }
    }
    Ok(recovered)
}
