// ============================================================================
// SampleVault Library
// ============================================================================

pub mod archive;
pub mod audit;
pub mod config;
pub mod core;
pub mod integrity;
pub mod snapshot;
pub mod store;

// Re-export main types for convenience
pub use crate::archive::{ArchivalEngine, ArchiveFailure, ArchiveReport};
pub use crate::audit::{AuditEntry, AuditKind, AuditLog, DurabilityMode};
pub use crate::config::VaultConfig;
pub use crate::core::{ArchivedRecord, OrderForm, OrderRecord, OrderStatus, Result, VaultError};
pub use crate::integrity::{IntegrityChecker, IntegrityReport};
pub use crate::snapshot::{BackupSnapshot, RestoreReport, SnapshotStore};
pub use crate::store::{RecordLocation, RecordStore, StoreStats};

use chrono::{DateTime, Utc};
use std::fs;
use tracing::{info, warn};

// ============================================================================
// High-level Vault API
// ============================================================================

/// Retention vault over one data directory.
///
/// This is the recommended way to use SampleVault in applications: it wires
/// the record store, audit ledger, snapshot store, archival engine and
/// integrity checker together, and keeps the store's state artifact current
/// after every mutation. The audit entry for a mutation is always durable
/// before the mutation itself is applied.
///
/// # Examples
///
/// ```
/// use samplevault::{OrderForm, OrderStatus, Vault, VaultConfig};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let dir = tempfile::tempdir()?;
/// let mut vault = Vault::open(VaultConfig::new(dir.path()))?;
///
/// let id = vault.create_request(OrderForm {
///     customer_name: "Suzanne Brennan".to_string(),
///     email: "suzanne@example.com".to_string(),
///     company_name: "Harvest & Home Interiors".to_string(),
///     street_address: "12 Mill Lane".to_string(),
///     city: "Ballarat".to_string(),
///     state_province: "VIC".to_string(),
///     postal_code: "3350".to_string(),
///     country: "Australia".to_string(),
///     fabric_cuttings: vec!["Linen Weave Sand".to_string()],
///     ..OrderForm::default()
/// })?;
///
/// vault.update_status(id, OrderStatus::Dispatched)?;
/// assert!(vault.check()?.is_healthy());
/// # Ok(())
/// # }
/// ```
pub struct Vault {
    config: VaultConfig,
    store: RecordStore,
    audit: AuditLog,
    snapshots: SnapshotStore,
    engine: ArchivalEngine,
    checker: IntegrityChecker,
}

impl Vault {
    /// Open (or initialize) a vault in the configured data directory.
    ///
    /// Loads the store state artifact if one exists. The audit log is never
    /// replayed implicitly; lost records stay lost until an operator runs
    /// [`Vault::recover`] or [`Vault::recover_missing`].
    pub fn open(config: VaultConfig) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)
            .map_err(|e| VaultError::Io(format!("Failed to create data directory: {}", e)))?;
        let audit = AuditLog::open(config.audit_log_path(), config.durability)?;
        let store = RecordStore::load(config.store_path())?;
        let snapshots = SnapshotStore::new(config.snapshot_dir(), config.backup_retention_days)?;
        let engine = ArchivalEngine::new(config.archive_after_days);
        let checker = IntegrityChecker::new(config.archive_after_days);
        info!(
            data_dir = %config.data_dir.display(),
            active = store.active_count(),
            archived = store.archived_count(),
            "opened vault"
        );
        Ok(Self {
            config,
            store,
            audit,
            snapshots,
            engine,
            checker,
        })
    }

    fn persist(&self) -> Result<()> {
        self.store.save(self.config.store_path())
    }

    // ------------------------------------------------------------------
    // Intake and status tracking
    // ------------------------------------------------------------------

    /// Validate and store a newly submitted order, returning its id.
    pub fn create_request(&mut self, form: OrderForm) -> Result<u64> {
        let id = self.store.create(form, &mut self.audit)?;
        self.persist()?;
        Ok(id)
    }

    pub fn get(&self, id: u64) -> Result<OrderRecord> {
        self.store.get(id).cloned()
    }

    pub fn get_archived(&self, id: u64) -> Result<ArchivedRecord> {
        self.store.get_archived(id).cloned()
    }

    /// Advance an order's status along the monotonic lifecycle.
    pub fn update_status(&mut self, id: u64, new_status: OrderStatus) -> Result<OrderRecord> {
        let record = self.store.update_status(id, new_status, &mut self.audit)?;
        self.persist()?;
        Ok(record)
    }

    /// Flag that the supplier notification for an order went out.
    pub fn mark_supplier_notified(&mut self, id: u64) -> Result<OrderRecord> {
        let record = self.store.mark_supplier_notified(id, &mut self.audit)?;
        self.persist()?;
        Ok(record)
    }

    pub fn list_active(
        &self,
        status: Option<OrderStatus>,
        search: Option<&str>,
    ) -> Vec<OrderRecord> {
        self.store.list_active(status, search)
    }

    pub fn list_archived(&self, search: Option<&str>) -> Vec<ArchivedRecord> {
        self.store.list_archived(search)
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    // ------------------------------------------------------------------
    // Archival
    // ------------------------------------------------------------------

    /// Archive every record past the retention threshold.
    pub fn archive_eligible(&mut self) -> Result<ArchiveReport> {
        self.archive_eligible_at(Utc::now())
    }

    /// Archival sweep with an injected clock, for schedulers and tests.
    pub fn archive_eligible_at(&mut self, now: DateTime<Utc>) -> Result<ArchiveReport> {
        if self.config.pre_operation_backup {
            let name = self.snapshots.create("pre_archive", &self.store)?;
            info!(snapshot = %name, "pre-archival snapshot created");
        }
        let report = self
            .engine
            .archive_eligible(&mut self.store, &mut self.audit, now);
        self.persist()?;

        let check = self.checker.check(&self.store, &self.audit, now)?;
        for issue in check.issues() {
            warn!(%issue, "post-archival integrity issue");
        }
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Backup snapshots
    // ------------------------------------------------------------------

    /// Export both record sets to a new snapshot artifact.
    pub fn create_snapshot(&self, label: &str) -> Result<String> {
        self.snapshots.create(label, &self.store)
    }

    /// Re-create every snapshot record missing from the store. Existing
    /// records are never overwritten.
    pub fn restore_from(&mut self, snapshot_id: &str) -> Result<RestoreReport> {
        if self.config.pre_operation_backup {
            let name = self.snapshots.create("pre_restore", &self.store)?;
            info!(snapshot = %name, "pre-restore snapshot created");
        }
        let report = self
            .snapshots
            .restore_from(snapshot_id, &mut self.store, &mut self.audit)?;
        self.persist()?;
        Ok(report)
    }

    pub fn list_snapshots(&self) -> Result<Vec<String>> {
        self.snapshots.list()
    }

    pub fn latest_snapshot(&self) -> Result<Option<String>> {
        self.snapshots.latest()
    }

    /// Delete snapshot artifacts older than the retention window.
    pub fn prune_snapshots(&self) -> Result<Vec<String>> {
        self.prune_snapshots_at(Utc::now())
    }

    pub fn prune_snapshots_at(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        self.snapshots.prune_expired(now)
    }

    // ------------------------------------------------------------------
    // Integrity and recovery
    // ------------------------------------------------------------------

    /// Diagnose the store against the audit log. Read-only.
    pub fn check(&self) -> Result<IntegrityReport> {
        self.check_at(Utc::now())
    }

    pub fn check_at(&self, now: DateTime<Utc>) -> Result<IntegrityReport> {
        self.checker.check(&self.store, &self.audit, now)
    }

    /// Reconstruct one lost record from the audit log into the active set.
    pub fn recover(&mut self, id: u64) -> Result<OrderRecord> {
        let record = integrity::recover(&mut self.store, &mut self.audit, id)?;
        self.persist()?;
        Ok(record)
    }

    /// Recover every record the audit log knows that the store has lost.
    pub fn recover_missing(&mut self) -> Result<Vec<u64>> {
        let recovered = integrity::recover_missing(&mut self.store, &mut self.audit)?;
        self.persist()?;
        Ok(recovered)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }
}
