use crate::audit::DurabilityMode;
use crate::core::{Result, VaultError};
use std::path::{Path, PathBuf};

/// Vault configuration
///
/// Defaults follow the production retention policy: dispatched records are
/// archived after four months, backup artifacts are kept at least ninety
/// days.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Directory holding the store state, audit log and snapshots
    pub data_dir: PathBuf,

    /// Days after dispatch before a record becomes eligible for archival
    pub archive_after_days: i64,

    /// Minimum days a backup snapshot is retained
    pub backup_retention_days: i64,

    /// Audit log durability
    pub durability: DurabilityMode,

    /// Take an automatic snapshot before archival sweeps and restores
    pub pre_operation_backup: bool,
}

impl VaultConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            archive_after_days: 120,
            backup_retention_days: 90,
            durability: DurabilityMode::Sync,
            pre_operation_backup: true,
        }
    }

    /// Set the archival threshold in days
    pub fn archive_after_days(mut self, days: i64) -> Self {
        self.archive_after_days = days;
        self
    }

    /// Set the snapshot retention window in days
    pub fn backup_retention_days(mut self, days: i64) -> Self {
        self.backup_retention_days = days;
        self
    }

    /// Set audit log durability
    pub fn durability(mut self, durability: DurabilityMode) -> Self {
        self.durability = durability;
        self
    }

    /// Disable the automatic pre-operation snapshot
    pub fn without_pre_operation_backup(mut self) -> Self {
        self.pre_operation_backup = false;
        self
    }

    /// Read configuration from the environment.
    ///
    /// `VAULT_DATA_DIR` is required; `VAULT_ARCHIVE_AFTER_DAYS` and
    /// `VAULT_BACKUP_RETENTION_DAYS` override the defaults.
    pub fn from_env() -> Result<Self> {
        let data_dir = std::env::var("VAULT_DATA_DIR").map_err(|_| {
            VaultError::Validation("VAULT_DATA_DIR environment variable is required".to_string())
        })?;
        let mut config = Self::new(data_dir);
        if let Ok(days) = std::env::var("VAULT_ARCHIVE_AFTER_DAYS") {
            config.archive_after_days = days.parse().map_err(|_| {
                VaultError::Validation(format!("Invalid VAULT_ARCHIVE_AFTER_DAYS: '{}'", days))
            })?;
        }
        if let Ok(days) = std::env::var("VAULT_BACKUP_RETENTION_DAYS") {
            config.backup_retention_days = days.parse().map_err(|_| {
                VaultError::Validation(format!("Invalid VAULT_BACKUP_RETENTION_DAYS: '{}'", days))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(VaultError::Validation(
                "data_dir cannot be empty".to_string(),
            ));
        }
        if self.archive_after_days <= 0 {
            return Err(VaultError::Validation(
                "archive_after_days must be positive".to_string(),
            ));
        }
        if self.backup_retention_days <= 0 {
            return Err(VaultError::Validation(
                "backup_retention_days must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("store.db")
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.data_dir.join("audit.log")
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        self.data_dir.join("snapshots")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_retention_policy() {
        let config = VaultConfig::new("/tmp/vault");
        assert_eq!(config.archive_after_days, 120);
        assert_eq!(config.backup_retention_days, 90);
        assert_eq!(config.durability, DurabilityMode::Sync);
        assert!(config.pre_operation_backup);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_overrides() {
        let config = VaultConfig::new("/tmp/vault")
            .archive_after_days(30)
            .backup_retention_days(7)
            .durability(DurabilityMode::Async)
            .without_pre_operation_backup();
        assert_eq!(config.archive_after_days, 30);
        assert_eq!(config.backup_retention_days, 7);
        assert_eq!(config.durability, DurabilityMode::Async);
        assert!(!config.pre_operation_backup);
    }

    #[test]
    fn test_validate_rejects_nonpositive_windows() {
        assert!(VaultConfig::new("/tmp/vault")
            .archive_after_days(0)
            .validate()
            .is_err());
        assert!(VaultConfig::new("/tmp/vault")
            .backup_retention_days(-1)
            .validate()
            .is_err());
    }

    #[test]
    fn test_derived_paths() {
        let config = VaultConfig::new("/data/vault");
        assert_eq!(config.store_path(), PathBuf::from("/data/vault/store.db"));
        assert_eq!(
            config.audit_log_path(),
            PathBuf::from("/data/vault/audit.log")
        );
        assert_eq!(
            config.snapshot_dir(),
            PathBuf::from("/data/vault/snapshots")
        );
    }
}
