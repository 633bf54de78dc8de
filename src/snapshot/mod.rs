//! Timestamped backup snapshots of the full store.
//!
//! A snapshot is a self-describing JSON artifact holding both record sets
//! plus the counts observed at capture time, written once and never
//! mutated. File names embed a sortable timestamp, so lexicographic order
//! is chronological order.

use crate::audit::{AuditEntry, AuditKind, AuditLog};
use crate::core::{ArchivedRecord, OrderRecord, Result, VaultError};
use crate::store::{RecordLocation, RecordStore};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;
pub const SNAPSHOT_FILE_PREFIX: &str = "backup_snapshot_";
pub const SNAPSHOT_FILE_EXT: &str = "json";

const SNAPSHOT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%f";

// ============================================================================
// Snapshot artifact
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSnapshot {
    pub version: u32,
    pub label: String,
    pub timestamp: DateTime<Utc>,
    pub active_count: usize,
    pub archived_count: usize,
    pub active_records: Vec<OrderRecord>,
    pub archived_records: Vec<ArchivedRecord>,
}

impl BackupSnapshot {
    /// Capture both sets in id order, recording the counts observed so a
    /// consumer can detect a torn artifact.
    pub fn capture(label: &str, store: &RecordStore) -> Self {
        let active_records: Vec<OrderRecord> = store.active_records().cloned().collect();
        let archived_records: Vec<ArchivedRecord> = store.archived_records().cloned().collect();
        Self {
            version: SNAPSHOT_SCHEMA_VERSION,
            label: label.to_string(),
            timestamp: Utc::now(),
            active_count: active_records.len(),
            archived_count: archived_records.len(),
            active_records,
            archived_records,
        }
    }

    pub fn counts_consistent(&self) -> bool {
        self.active_count == self.active_records.len()
            && self.archived_count == self.archived_records.len()
    }
}

/// Outcome of a restore: exact counts, never partial success reported as
/// total success.
#[derive(Debug, Clone, Default)]
pub struct RestoreReport {
    pub restored_active: usize,
    pub restored_archived: usize,
    pub already_present: usize,
    pub conflicting: Vec<u64>,
}

impl RestoreReport {
    pub fn restored_total(&self) -> usize {
        self.restored_active + self.restored_archived
    }
}

// ============================================================================
// Snapshot Store
// ============================================================================

pub struct SnapshotStore {
    dir: PathBuf,
    retention: Duration,
}

impl SnapshotStore {
    pub fn new<P: AsRef<Path>>(dir: P, retention_days: i64) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .map_err(|e| VaultError::Io(format!("Failed to create snapshot directory: {}", e)))?;
        Ok(Self {
            dir,
            retention: Duration::days(retention_days),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Serialize the full store to a new, uniquely named artifact. Existing
    /// artifacts are never overwritten.
    pub fn create(&self, label: &str, store: &RecordStore) -> Result<String> {
        let snapshot = BackupSnapshot::capture(label, store);
        let name = format!(
            "{}{}.{}",
            SNAPSHOT_FILE_PREFIX,
            snapshot.timestamp.format(SNAPSHOT_TIMESTAMP_FORMAT),
            SNAPSHOT_FILE_EXT
        );
        let path = self.dir.join(&name);
        if path.exists() {
            return Err(VaultError::Io(format!(
                "Snapshot artifact '{}' already exists",
                name
            )));
        }

        let serialized = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| VaultError::Serialization(format!("Failed to encode snapshot: {}", e)))?;
        let temp_path = path.with_extension("tmp");
        let temp_file = File::create(&temp_path)
            .map_err(|e| VaultError::Io(format!("Failed to create temp file: {}", e)))?;
        let mut writer = BufWriter::new(temp_file);
        writer
            .write_all(&serialized)
            .map_err(|e| VaultError::Io(format!("Failed to write snapshot: {}", e)))?;
        writer
            .flush()
            .map_err(|e| VaultError::Io(format!("Failed to flush snapshot: {}", e)))?;
        writer
            .get_mut()
            .sync_all()
            .map_err(|e| VaultError::Io(format!("Failed to sync snapshot: {}", e)))?;
        fs::rename(&temp_path, &path)
            .map_err(|e| VaultError::Io(format!("Failed to rename snapshot: {}", e)))?;

        info!(
            snapshot = %name,
            active = snapshot.active_count,
            archived = snapshot.archived_count,
            "created backup snapshot"
        );
        Ok(name)
    }

    /// Read an artifact back, refusing one whose recorded counts disagree
    /// with its contents.
    pub fn load(&self, snapshot_id: &str) -> Result<BackupSnapshot> {
        let path = self.dir.join(snapshot_id);
        if !path.exists() {
            return Err(VaultError::SnapshotNotFound(snapshot_id.to_string()));
        }
        let mut file = File::open(&path)
            .map_err(|e| VaultError::Io(format!("Failed to open snapshot: {}", e)))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| VaultError::Io(format!("Failed to read snapshot: {}", e)))?;
        let snapshot: BackupSnapshot = serde_json::from_slice(&data)
            .map_err(|e| VaultError::Serialization(format!("Failed to decode snapshot: {}", e)))?;
        if !snapshot.counts_consistent() {
            return Err(VaultError::IntegrityViolation(format!(
                "Snapshot '{}' records {} active / {} archived but contains {} / {}",
                snapshot_id,
                snapshot.active_count,
                snapshot.archived_count,
                snapshot.active_records.len(),
                snapshot.archived_records.len()
            )));
        }
        Ok(snapshot)
    }

    /// All artifact names, oldest first.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| VaultError::Io(format!("Failed to list snapshot directory: {}", e)))?;
        for entry in entries {
            let entry =
                entry.map_err(|e| VaultError::Io(format!("Failed to read dir entry: {}", e)))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(SNAPSHOT_FILE_PREFIX) && name.ends_with(SNAPSHOT_FILE_EXT) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn latest(&self) -> Result<Option<String>> {
        Ok(self.list()?.pop())
    }

    /// Insert-if-missing restore. A record already present in either set is
    /// never overwritten: identical payloads count as already-present,
    /// diverged ones are reported as conflicts and left alone.
    pub fn restore_from(
        &self,
        snapshot_id: &str,
        store: &mut RecordStore,
        audit: &mut AuditLog,
    ) -> Result<RestoreReport> {
        let snapshot = self.load(snapshot_id)?;
        let mut report = RestoreReport::default();

        for record in snapshot.active_records {
            match store.location(record.id) {
                None => {
                    audit.append(&AuditEntry::new(AuditKind::Create, &record)?)?;
                    store.insert_active(record);
                    report.restored_active += 1;
                }
                Some(location) => {
                    if current_payload_matches(store, location, &record) {
                        report.already_present += 1;
                    } else {
                        report.conflicting.push(record.id);
                    }
                }
            }
        }

        for archived in snapshot.archived_records {
            match store.location(archived.original_id) {
                None => {
                    audit.append(&AuditEntry::new(AuditKind::Archive, &archived.record)?)?;
                    store.insert_archived(archived);
                    report.restored_archived += 1;
                }
                Some(location) => {
                    if current_payload_matches(store, location, &archived.record) {
                        report.already_present += 1;
                    } else {
                        report.conflicting.push(archived.original_id);
                    }
                }
            }
        }

        info!(
            snapshot = %snapshot_id,
            restored = report.restored_total(),
            already_present = report.already_present,
            conflicting = report.conflicting.len(),
            "restore complete"
        );
        Ok(report)
    }

    /// Delete artifacts older than the retention window, returning their
    /// names. Artifacts inside the window are kept unconditionally.
    pub fn prune_expired(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let mut pruned = Vec::new();
        for name in self.list()? {
            let Some(created_at) = parse_snapshot_timestamp(&name) else {
                warn!(snapshot = %name, "unparseable snapshot name, skipping prune");
                continue;
            };
            if now - created_at > self.retention {
                fs::remove_file(self.dir.join(&name))
                    .map_err(|e| VaultError::Io(format!("Failed to remove snapshot: {}", e)))?;
                pruned.push(name);
            }
        }
        if !pruned.is_empty() {
            info!(count = pruned.len(), "pruned expired snapshots");
        }
        Ok(pruned)
    }
}

fn current_payload_matches(
    store: &RecordStore,
    location: RecordLocation,
    payload: &OrderRecord,
) -> bool {
    match location {
        RecordLocation::Active => store.get(payload.id).map(|r| r == payload).unwrap_or(false),
        RecordLocation::Archived => store
            .get_archived(payload.id)
            .map(|a| &a.record == payload)
            .unwrap_or(false),
    }
}

fn parse_snapshot_timestamp(name: &str) -> Option<DateTime<Utc>> {
    let stem = name
        .strip_prefix(SNAPSHOT_FILE_PREFIX)?
        .strip_suffix(&format!(".{}", SNAPSHOT_FILE_EXT))?;
    NaiveDateTime::parse_from_str(stem, SNAPSHOT_TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
