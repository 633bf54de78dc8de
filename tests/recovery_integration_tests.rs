//! Crash-shaped scenarios: store-state loss with a surviving audit log, and
//! explicit recovery from the ledger.

use samplevault::{OrderForm, OrderStatus, Vault, VaultConfig, VaultError};
use std::fs;
use tempfile::TempDir;

fn sample_form(name: &str) -> OrderForm {
    OrderForm {
        customer_name: name.to_string(),
        email: "orders@example.com".to_string(),
        company_name: "Harvest & Home Interiors".to_string(),
        street_address: "12 Mill Lane".to_string(),
        city: "Ballarat".to_string(),
        state_province: "VIC".to_string(),
        postal_code: "3350".to_string(),
        country: "Australia".to_string(),
        fabric_cuttings: vec!["Linen Weave Sand".to_string()],
        ..OrderForm::default()
    }
}

/// Build a vault with two audited records, then lose the store state.
fn vault_with_lost_store(dir: &TempDir) -> (Vault, u64, u64) {
    let config = VaultConfig::new(dir.path());
    let (a, b) = {
        let mut vault = Vault::open(config.clone()).unwrap();
        let a = vault.create_request(sample_form("Suzanne Brennan")).unwrap();
        let b = vault.create_request(sample_form("David Hall")).unwrap();
        vault.update_status(a, OrderStatus::InProgress).unwrap();
        (a, b)
    };
    fs::remove_file(config.store_path()).unwrap();
    (Vault::open(config).unwrap(), a, b)
}

#[test]
fn test_state_survives_clean_reopen() {
    let dir = TempDir::new().unwrap();
    let config = VaultConfig::new(dir.path());
    let id = {
        let mut vault = Vault::open(config.clone()).unwrap();
        let id = vault.create_request(sample_form("Suzanne Brennan")).unwrap();
        vault.update_status(id, OrderStatus::Dispatched).unwrap();
        vault.mark_supplier_notified(id).unwrap();
        id
    };

    let vault = Vault::open(config).unwrap();
    let record = vault.get(id).unwrap();
    assert_eq!(record.status, OrderStatus::Dispatched);
    assert!(record.supplier_notified);
    assert!(vault.check().unwrap().is_healthy());
}

#[test]
fn test_check_reports_orphans_after_store_loss() {
    let dir = TempDir::new().unwrap();
    let (vault, a, b) = vault_with_lost_store(&dir);

    assert_eq!(vault.stats().active_total, 0);
    let report = vault.check().unwrap();
    assert!(!report.is_healthy());
    assert_eq!(report.orphan_ids, vec![a, b]);
    assert_eq!(report.duplicate_ids.len(), 0);
}

#[test]
fn test_recover_restores_latest_audited_state() {
    let dir = TempDir::new().unwrap();
    let (mut vault, a, _b) = vault_with_lost_store(&dir);

    let recovered = vault.recover(a).unwrap();
    assert_eq!(recovered.customer_name, "Suzanne Brennan");
    // The most recent audit entry for `a` carries the in-progress update
    assert_eq!(recovered.status, OrderStatus::InProgress);
    assert_eq!(vault.get(a).unwrap(), recovered);
}

#[test]
fn test_recover_is_durable_across_reopen() {
    let dir = TempDir::new().unwrap();
    let config = VaultConfig::new(dir.path());
    let (mut vault, a, b) = vault_with_lost_store(&dir);
    vault.recover(a).unwrap();
    vault.recover(b).unwrap();
    drop(vault);

    let vault = Vault::open(config).unwrap();
    assert_eq!(vault.stats().active_total, 2);
    assert!(vault.check().unwrap().is_healthy());
}

#[test]
fn test_recover_without_audit_trail_is_unrecoverable() {
    let dir = TempDir::new().unwrap();
    let mut vault = Vault::open(VaultConfig::new(dir.path())).unwrap();
    assert!(matches!(
        vault.recover(404),
        Err(VaultError::Unrecoverable(404))
    ));
}

#[test]
fn test_recover_refuses_a_present_record() {
    let dir = TempDir::new().unwrap();
    let mut vault = Vault::open(VaultConfig::new(dir.path())).unwrap();
    let id = vault.create_request(sample_form("Suzanne Brennan")).unwrap();
    assert!(matches!(vault.recover(id), Err(VaultError::Validation(_))));
}

#[test]
fn test_recover_missing_repairs_every_orphan() {
    let dir = TempDir::new().unwrap();
    let (mut vault, a, b) = vault_with_lost_store(&dir);

    let recovered = vault.recover_missing().unwrap();
    assert_eq!(recovered, vec![a, b]);
    assert_eq!(vault.stats().active_total, 2);
    assert!(vault.check().unwrap().is_healthy());

    // A second scan finds nothing left to repair
    assert!(vault.recover_missing().unwrap().is_empty());
}
