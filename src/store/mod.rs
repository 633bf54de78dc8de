//! Authoritative record store: the active and archive sets.
//!
//! Every mutating call appends one audit entry before the in-memory change is
//! applied; if the append fails, the mutation fails with it. The store
//! persists itself as a versioned binary state artifact written atomically.

use crate::audit::{AuditEntry, AuditKind, AuditLog};
use crate::core::{ArchivedRecord, OrderForm, OrderRecord, OrderStatus, Result, VaultError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;

pub const STORE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordLocation {
    Active,
    Archived,
}

/// Per-status counts for operator health checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub active_total: usize,
    pub outstanding: usize,
    pub in_progress: usize,
    pub dispatched: usize,
    pub archived_total: usize,
}

#[derive(Serialize, Deserialize)]
struct StoreState {
    version: u32,
    next_id: u64,
    active: BTreeMap<u64, OrderRecord>,
    archived: BTreeMap<u64, ArchivedRecord>,
}

/// Two disjoint, same-schema collections of order records. An id lives in
/// exactly one of them; movement is one-directional, active to archive,
/// through the archival engine only.
pub struct RecordStore {
    active: BTreeMap<u64, OrderRecord>,
    archived: BTreeMap<u64, ArchivedRecord>,
    next_id: u64,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore {
    pub fn new() -> Self {
        Self {
            active: BTreeMap::new(),
            archived: BTreeMap::new(),
            next_id: 1,
        }
    }

    // ------------------------------------------------------------------
    // State artifact
    // ------------------------------------------------------------------

    /// Load the store from its state artifact. A missing file is an empty
    /// store, not an error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }
        let mut file = File::open(path)
            .map_err(|e| VaultError::Io(format!("Failed to open store state: {}", e)))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| VaultError::Io(format!("Failed to read store state: {}", e)))?;
        let state: StoreState = rmp_serde::from_slice(&data)
            .map_err(|e| VaultError::Serialization(format!("Failed to decode store state: {}", e)))?;
        if state.version != STORE_SCHEMA_VERSION {
            return Err(VaultError::Serialization(format!(
                "Unsupported store schema version {} (expected {})",
                state.version, STORE_SCHEMA_VERSION
            )));
        }
        Ok(Self {
            active: state.active,
            archived: state.archived,
            next_id: state.next_id,
        })
    }

    /// Write the state artifact atomically: temp file, flush, fsync, rename.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| VaultError::Io(format!("Failed to create store directory: {}", e)))?;
        }
        let state = StoreState {
            version: STORE_SCHEMA_VERSION,
            next_id: self.next_id,
            active: self.active.clone(),
            archived: self.archived.clone(),
        };
        let serialized = rmp_serde::to_vec(&state)
            .map_err(|e| VaultError::Serialization(format!("Failed to encode store state: {}", e)))?;
        let temp_path = path.with_extension("tmp");
        let temp_file = File::create(&temp_path)
            .map_err(|e| VaultError::Io(format!("Failed to create temp file: {}", e)))?;
        let mut writer = BufWriter::new(temp_file);
        writer
            .write_all(&serialized)
            .map_err(|e| VaultError::Io(format!("Failed to write store state: {}", e)))?;
        writer
            .flush()
            .map_err(|e| VaultError::Io(format!("Failed to flush store state: {}", e)))?;
        writer
            .get_mut()
            .sync_all()
            .map_err(|e| VaultError::Io(format!("Failed to sync store state: {}", e)))?;
        fs::rename(&temp_path, path)
            .map_err(|e| VaultError::Io(format!("Failed to rename store state: {}", e)))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Mutations (audited)
    // ------------------------------------------------------------------

    /// Validate and insert a new order. The audit entry is appended before
    /// the record lands in the active set.
    pub fn create(&mut self, form: OrderForm, audit: &mut AuditLog) -> Result<u64> {
        let form = form.normalized();
        form.validate()?;
        let id = self.next_id;
        let record = form.into_record(id, Utc::now());
        audit.append(&AuditEntry::new(AuditKind::Create, &record)?)?;
        self.next_id += 1;
        self.active.insert(id, record);
        Ok(id)
    }

    /// Advance a record's status. Rejects anything that does not strictly
    /// move the lifecycle forward; entering `Dispatched` stamps the dispatch
    /// timestamp if it is not already set.
    pub fn update_status(
        &mut self,
        id: u64,
        new_status: OrderStatus,
        audit: &mut AuditLog,
    ) -> Result<OrderRecord> {
        let record = self.active.get(&id).ok_or(VaultError::NotFound(id))?;
        if !record.status.can_transition_to(new_status) {
            return Err(VaultError::InvalidTransition {
                from: record.status,
                to: new_status,
            });
        }
        let mut updated = record.clone();
        updated.status = new_status;
        if new_status == OrderStatus::Dispatched && updated.date_dispatched.is_none() {
            updated.date_dispatched = Some(Utc::now());
        }
        audit.append(&AuditEntry::new(AuditKind::Update, &updated)?)?;
        self.active.insert(id, updated.clone());
        Ok(updated)
    }

    /// Record that the supplier notification went out. Idempotent: a second
    /// call is a no-op and appends nothing.
    pub fn mark_supplier_notified(&mut self, id: u64, audit: &mut AuditLog) -> Result<OrderRecord> {
        let record = self.active.get(&id).ok_or(VaultError::NotFound(id))?;
        if record.supplier_notified {
            return Ok(record.clone());
        }
        let mut updated = record.clone();
        updated.supplier_notified = true;
        audit.append(&AuditEntry::new(AuditKind::Update, &updated)?)?;
        self.active.insert(id, updated.clone());
        Ok(updated)
    }

    /// Hard deletes are prohibited; records leave the active set only through
    /// archival.
    pub fn delete(&mut self, id: u64) -> Result<()> {
        Err(VaultError::IntegrityViolation(format!(
            "Attempted to delete record #{} without archiving; direct deletion is prohibited",
            id
        )))
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn get(&self, id: u64) -> Result<&OrderRecord> {
        self.active.get(&id).ok_or(VaultError::NotFound(id))
    }

    pub fn get_archived(&self, id: u64) -> Result<&ArchivedRecord> {
        self.archived.get(&id).ok_or(VaultError::NotFound(id))
    }

    pub fn location(&self, id: u64) -> Option<RecordLocation> {
        if self.active.contains_key(&id) {
            Some(RecordLocation::Active)
        } else if self.archived.contains_key(&id) {
            Some(RecordLocation::Archived)
        } else {
            None
        }
    }

    pub fn contains(&self, id: u64) -> bool {
        self.location(id).is_some()
    }

    /// Active records, optionally filtered by status and search query,
    /// newest-submitted first.
    pub fn list_active(&self, status: Option<OrderStatus>, search: Option<&str>) -> Vec<OrderRecord> {
        let mut records: Vec<OrderRecord> = self
            .active
            .values()
            .filter(|r| status.is_none_or(|s| r.status == s))
            .filter(|r| search.is_none_or(|q| r.matches_search(q)))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.date_submitted.cmp(&a.date_submitted).then(b.id.cmp(&a.id)));
        records
    }

    /// Archived records, optionally filtered by search query, newest-archived
    /// first.
    pub fn list_archived(&self, search: Option<&str>) -> Vec<ArchivedRecord> {
        let mut records: Vec<ArchivedRecord> = self
            .archived
            .values()
            .filter(|r| search.is_none_or(|q| r.matches_search(q)))
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            b.date_archived
                .cmp(&a.date_archived)
                .then(b.original_id.cmp(&a.original_id))
        });
        records
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn archived_count(&self) -> usize {
        self.archived.len()
    }

    /// Records in id order, for snapshot capture and integrity scans.
    pub fn active_records(&self) -> impl Iterator<Item = &OrderRecord> {
        self.active.values()
    }

    pub fn archived_records(&self) -> impl Iterator<Item = &ArchivedRecord> {
        self.archived.values()
    }

    pub fn active_ids(&self) -> Vec<u64> {
        self.active.keys().copied().collect()
    }

    pub fn archived_ids(&self) -> Vec<u64> {
        self.archived.keys().copied().collect()
    }

    pub fn stats(&self) -> StoreStats {
        let count_status =
            |s: OrderStatus| self.active.values().filter(|r| r.status == s).count();
        StoreStats {
            active_total: self.active.len(),
            outstanding: count_status(OrderStatus::Outstanding),
            in_progress: count_status(OrderStatus::InProgress),
            dispatched: count_status(OrderStatus::Dispatched),
            archived_total: self.archived.len(),
        }
    }

    // ------------------------------------------------------------------
    // Low-level set operations
    // ------------------------------------------------------------------
    // Used by the archival engine, snapshot restore and recovery, which do
    // their own audit appends and rollback handling.

    pub(crate) fn insert_active(&mut self, record: OrderRecord) {
        self.next_id = self.next_id.max(record.id + 1);
        self.active.insert(record.id, record);
    }

    pub(crate) fn remove_active(&mut self, id: u64) -> Option<OrderRecord> {
        self.active.remove(&id)
    }

    pub(crate) fn insert_archived(&mut self, record: ArchivedRecord) {
        self.next_id = self.next_id.max(record.original_id + 1);
        self.archived.insert(record.original_id, record);
    }

    pub(crate) fn remove_archived(&mut self, id: u64) -> Option<ArchivedRecord> {
        self.archived.remove(&id)
    }
}
