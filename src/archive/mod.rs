//! Active -> Archive migration for dispatched records past the retention
//! threshold.
//!
//! Each record moves in its own atomic step: copy into the archive set,
//! append the audit entry, then remove from the active set. An audit failure
//! rolls the copy back and leaves the record in place; one record's failure
//! never aborts the batch.

use crate::audit::{AuditEntry, AuditKind, AuditLog};
use crate::core::{ArchivedRecord, OrderStatus, Result};
use crate::store::RecordStore;
use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFailure {
    pub record_id: u64,
    pub reason: String,
}

/// Outcome of one archival sweep. Partial success is never collapsed into
/// total success: every skipped record shows up in `failures`.
#[derive(Debug, Clone, Default)]
pub struct ArchiveReport {
    pub archived: Vec<u64>,
    pub failures: Vec<ArchiveFailure>,
}

impl ArchiveReport {
    pub fn archived_count(&self) -> usize {
        self.archived.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Sweeps dispatched records older than the retention threshold into the
/// archive set.
pub struct ArchivalEngine {
    retention: Duration,
}

impl ArchivalEngine {
    pub fn new(archive_after_days: i64) -> Self {
        Self {
            retention: Duration::days(archive_after_days),
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Ids of active records eligible for archival at `now`: dispatched, with
    /// a dispatch timestamp at least the retention threshold in the past.
    pub fn eligible(&self, store: &RecordStore, now: DateTime<Utc>) -> Vec<u64> {
        store
            .active_records()
            .filter(|r| r.status == OrderStatus::Dispatched)
            .filter(|r| {
                r.date_dispatched
                    .is_some_and(|dispatched| now - dispatched >= self.retention)
            })
            .map(|r| r.id)
            .collect()
    }

    /// Archive every eligible record. Idempotent: a second sweep with no new
    /// qualifiers archives nothing, and a record that already reached the
    /// archive set is a detected no-op rather than a duplicate.
    pub fn archive_eligible(
        &self,
        store: &mut RecordStore,
        audit: &mut AuditLog,
        now: DateTime<Utc>,
    ) -> ArchiveReport {
        let candidates = self.eligible(store, now);
        let mut report = ArchiveReport::default();

        for id in candidates {
            match self.archive_one(store, audit, id, now) {
                Ok(true) => report.archived.push(id),
                Ok(false) => {}
                Err(e) => {
                    warn!(record_id = id, error = %e, "failed to archive record");
                    report.failures.push(ArchiveFailure {
                        record_id: id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            archived = report.archived.len(),
            failed = report.failures.len(),
            "archival sweep complete"
        );
        report
    }

    /// Move one record. Returns Ok(false) when the record is no longer a
    /// candidate (gone from the active set, or already archived by an
    /// overlapping sweep).
    fn archive_one(
        &self,
        store: &mut RecordStore,
        audit: &mut AuditLog,
        id: u64,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let Ok(record) = store.get(id).cloned() else {
            return Ok(false);
        };
        if store.get_archived(id).is_ok() {
            return Ok(false);
        }

        let entry = AuditEntry::new(AuditKind::Archive, &record)?;
        store.insert_archived(ArchivedRecord {
            original_id: id,
            record,
            date_archived: now,
        });
        if let Err(e) = audit.append(&entry) {
            // Keep the record untouched in the active set
            store.remove_archived(id);
            return Err(e);
        }
        store.remove_active(id);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::DurabilityMode;
    use crate::core::OrderForm;
    use tempfile::TempDir;

    const RETENTION_DAYS: i64 = 120;

    fn form(name: &str) -> OrderForm {
        OrderForm {
            customer_name: name.to_string(),
            email: "orders@example.com".to_string(),
            company_name: "TURBILL BLINDS".to_string(),
            street_address: "3 Station St".to_string(),
            city: "Dubbo".to_string(),
            state_province: "NSW".to_string(),
            postal_code: "2830".to_string(),
            country: "Australia".to_string(),
            fabric_cuttings: vec!["Canvas Ecru".to_string()],
            ..OrderForm::default()
        }
    }

    fn setup(dir: &TempDir) -> (RecordStore, AuditLog, ArchivalEngine) {
        let audit = AuditLog::open(dir.path().join("audit.log"), DurabilityMode::Sync).unwrap();
        (
            RecordStore::new(),
            audit,
            ArchivalEngine::new(RETENTION_DAYS),
        )
    }

    fn dispatch(store: &mut RecordStore, audit: &mut AuditLog, name: &str) -> u64 {
        let id = store.create(form(name), audit).unwrap();
        store
            .update_status(id, OrderStatus::Dispatched, audit)
            .unwrap();
        id
    }

    fn backdate_dispatch(store: &mut RecordStore, id: u64, days: i64) {
        let mut record = store.get(id).unwrap().clone();
        record.date_dispatched = record.date_dispatched.map(|d| d - Duration::days(days));
        store.insert_active(record);
    }

    #[test]
    fn test_sweep_moves_only_records_past_threshold() {
        let dir = TempDir::new().unwrap();
        let (mut store, mut audit, engine) = setup(&dir);

        let old = dispatch(&mut store, &mut audit, "Old Order");
        let fresh = dispatch(&mut store, &mut audit, "Fresh Order");
        backdate_dispatch(&mut store, old, 150);

        let report = engine.archive_eligible(&mut store, &mut audit, Utc::now());
        assert!(report.is_clean());
        assert_eq!(report.archived, vec![old]);

        assert_eq!(store.active_count(), 1);
        assert_eq!(store.archived_count(), 1);
        assert!(store.get(fresh).is_ok());

        let archived = store.get_archived(old).unwrap();
        assert!(
            archived.date_archived - archived.record.date_dispatched.unwrap()
                >= engine.retention()
        );
    }

    #[test]
    fn test_sweep_skips_undispatched_and_recent() {
        let dir = TempDir::new().unwrap();
        let (mut store, mut audit, engine) = setup(&dir);

        let outstanding = store.create(form("Still Outstanding"), &mut audit).unwrap();
        let recent = dispatch(&mut store, &mut audit, "Recently Dispatched");

        let now = Utc::now() + Duration::days(30);
        let report = engine.archive_eligible(&mut store, &mut audit, now);
        assert_eq!(report.archived_count(), 0);
        assert!(store.get(outstanding).is_ok());
        assert!(store.get(recent).is_ok());
    }

    #[test]
    fn test_second_sweep_archives_nothing() {
        let dir = TempDir::new().unwrap();
        let (mut store, mut audit, engine) = setup(&dir);

        dispatch(&mut store, &mut audit, "Old Order");
        let now = Utc::now() + Duration::days(RETENTION_DAYS + 1);

        let first = engine.archive_eligible(&mut store, &mut audit, now);
        assert_eq!(first.archived_count(), 1);

        let second = engine.archive_eligible(&mut store, &mut audit, now);
        assert_eq!(second.archived_count(), 0);
        assert!(second.is_clean());
        assert_eq!(store.archived_count(), 1);
    }

    #[test]
    fn test_sweep_appends_one_archive_entry_per_record() {
        let dir = TempDir::new().unwrap();
        let (mut store, mut audit, engine) = setup(&dir);

        let id = dispatch(&mut store, &mut audit, "Old Order");
        let now = Utc::now() + Duration::days(RETENTION_DAYS + 1);
        engine.archive_eligible(&mut store, &mut audit, now);

        let entries = audit.entries_for(id).unwrap();
        let archive_entries: Vec<_> = entries
            .iter()
            .filter(|e| e.kind == AuditKind::Archive)
            .collect();
        assert_eq!(archive_entries.len(), 1);
        assert_eq!(archive_entries[0].payload.id, id);
    }

    #[test]
    fn test_already_archived_id_is_detected_noop() {
        let dir = TempDir::new().unwrap();
        let (mut store, mut audit, engine) = setup(&dir);

        let id = dispatch(&mut store, &mut audit, "Old Order");
        let now = Utc::now() + Duration::days(RETENTION_DAYS + 1);
        engine.archive_eligible(&mut store, &mut audit, now);

        // Force the duplicate-id corruption an overlapping sweep could cause
        let archived = store.get_archived(id).unwrap().record.clone();
        store.insert_active(archived);

        let report = engine.archive_eligible(&mut store, &mut audit, now);
        assert_eq!(report.archived_count(), 0);
        assert!(report.is_clean());
        assert_eq!(store.archived_count(), 1);
    }
}
