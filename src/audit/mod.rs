//! Append-only audit ledger for every record mutation.
//!
//! The ledger is the write-ahead side of the store: an entry is appended and
//! flushed before the mutation it describes is applied, so any record can be
//! reconstructed from its most recent entry.

use crate::core::{OrderRecord, Result, VaultError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const AUDIT_SCHEMA_VERSION: u32 = 1;

// ============================================================================
// Audit Entry
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditKind {
    Create,
    Update,
    Archive,
}

/// Immutable log line describing one mutation, carrying the full record
/// payload at the time of the operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub version: u32,
    pub kind: AuditKind,
    pub record_id: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: OrderRecord,
    pub checksum: String,
}

impl AuditEntry {
    pub fn new(kind: AuditKind, payload: &OrderRecord) -> Result<Self> {
        Ok(Self {
            version: AUDIT_SCHEMA_VERSION,
            kind,
            record_id: payload.id,
            timestamp: Utc::now(),
            payload: payload.clone(),
            checksum: Self::checksum_of(payload)?,
        })
    }

    /// SHA-256 over the canonical JSON encoding of the payload, hex-encoded.
    pub fn checksum_of(payload: &OrderRecord) -> Result<String> {
        let canonical = serde_json::to_vec(payload)
            .map_err(|e| VaultError::Serialization(format!("Failed to encode payload: {}", e)))?;
        let digest = Sha256::digest(&canonical);
        Ok(hex::encode(digest))
    }

    pub fn verify_checksum(&self) -> bool {
        Self::checksum_of(&self.payload)
            .map(|computed| computed == self.checksum)
            .unwrap_or(false)
    }
}

// ============================================================================
// Durability Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurabilityMode {
    /// fsync after every append
    #[default]
    Sync,
    /// flush to the OS, no fsync
    Async,
}

// ============================================================================
// Audit Log
// ============================================================================

/// File-backed append-only ledger. Entries are length-prefixed MessagePack,
/// each independently parseable, ordered by append time.
pub struct AuditLog {
    path: PathBuf,
    file: BufWriter<File>,
    durability: DurabilityMode,
}

impl AuditLog {
    pub fn open<P: AsRef<Path>>(path: P, durability: DurabilityMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| VaultError::Io(format!("Failed to create audit directory: {}", e)))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| VaultError::Io(format!("Failed to open audit log: {}", e)))?;
        Ok(Self {
            path,
            file: BufWriter::new(file),
            durability,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry and make it durable before returning. A failure here
    /// must abort the mutation it describes; callers never treat it as soft.
    pub fn append(&mut self, entry: &AuditEntry) -> Result<()> {
        let serialized = rmp_serde::to_vec(entry)
            .map_err(|e| VaultError::Serialization(format!("Failed to encode audit entry: {}", e)))?;
        let len = serialized.len() as u32;
        self.file
            .write_all(&len.to_le_bytes())
            .map_err(|e| VaultError::Io(format!("Failed to write audit entry: {}", e)))?;
        self.file
            .write_all(&serialized)
            .map_err(|e| VaultError::Io(format!("Failed to write audit entry: {}", e)))?;
        self.file
            .flush()
            .map_err(|e| VaultError::Io(format!("Failed to flush audit log: {}", e)))?;
        if self.durability == DurabilityMode::Sync {
            self.file
                .get_mut()
                .sync_all()
                .map_err(|e| VaultError::Io(format!("Failed to sync audit log: {}", e)))?;
        }
        Ok(())
    }

    /// Every entry in append order. An absent or empty log reads as empty.
    pub fn read_all(&self) -> Result<Vec<AuditEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path)
            .map_err(|e| VaultError::Io(format!("Failed to open audit log for reading: {}", e)))?;
        let mut reader = BufReader::new(file);
        let mut entries = Vec::new();
        loop {
            let mut len_bytes = [0u8; 4];
            match reader.read_exact(&mut len_bytes) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => {
                    return Err(VaultError::Io(format!(
                        "Failed to read audit entry length: {}",
                        e
                    )));
                }
            }
            let len = u32::from_le_bytes(len_bytes) as usize;
            let mut data = vec![0u8; len];
            reader
                .read_exact(&mut data)
                .map_err(|e| VaultError::Io(format!("Failed to read audit entry data: {}", e)))?;
            let entry: AuditEntry = rmp_serde::from_slice(&data).map_err(|e| {
                VaultError::Serialization(format!("Failed to decode audit entry: {}", e))
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// All entries for one record, timestamp ascending.
    pub fn entries_for(&self, record_id: u64) -> Result<Vec<AuditEntry>> {
        let mut entries: Vec<AuditEntry> = self
            .read_all()?
            .into_iter()
            .filter(|e| e.record_id == record_id)
            .collect();
        // Stable sort: entries with equal timestamps keep append order
        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }

    /// All entries at or after the given instant, timestamp ascending.
    pub fn all_since(&self, since: DateTime<Utc>) -> Result<Vec<AuditEntry>> {
        let mut entries: Vec<AuditEntry> = self
            .read_all()?
            .into_iter()
            .filter(|e| e.timestamp >= since)
            .collect();
        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }

    /// The most recent entry for a record, if any.
    pub fn latest_for(&self, record_id: u64) -> Result<Option<AuditEntry>> {
        Ok(self.entries_for(record_id)?.pop())
    }
}
