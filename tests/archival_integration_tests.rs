//! End-to-end archival flow through the Vault facade.

use chrono::{Duration, Utc};
use samplevault::{AuditKind, OrderForm, OrderStatus, Vault, VaultConfig, VaultError};
use tempfile::TempDir;

fn sample_form(name: &str) -> OrderForm {
    OrderForm {
        customer_name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
        company_name: "Menadue Floor Coverings".to_string(),
        street_address: "4 Harbour St".to_string(),
        city: "Hobart".to_string(),
        state_province: "TAS".to_string(),
        postal_code: "7000".to_string(),
        country: "Australia".to_string(),
        fabric_cuttings: vec!["Herringbone Slate".to_string(), "Twill Storm".to_string()],
        reference: Some("PO-2290".to_string()),
        ..OrderForm::default()
    }
}

#[test]
fn test_full_retention_flow() {
    let dir = TempDir::new().unwrap();
    let mut vault = Vault::open(VaultConfig::new(dir.path())).unwrap();

    let a = vault.create_request(sample_form("Suzanne Brennan")).unwrap();
    let b = vault.create_request(sample_form("David Hall")).unwrap();
    let c = vault.create_request(sample_form("Philippa Beak")).unwrap();

    vault.update_status(a, OrderStatus::Dispatched).unwrap();
    vault.update_status(b, OrderStatus::InProgress).unwrap();
    vault.update_status(b, OrderStatus::Dispatched).unwrap();

    // Five months later the two dispatched orders qualify, the outstanding
    // one does not.
    let sweep_at = Utc::now() + Duration::days(150);
    let report = vault.archive_eligible_at(sweep_at).unwrap();
    assert!(report.is_clean());
    assert_eq!(report.archived_count(), 2);

    assert_eq!(vault.stats().active_total, 1);
    assert_eq!(vault.stats().archived_total, 2);
    assert!(vault.get(c).is_ok());
    assert!(matches!(vault.get(a), Err(VaultError::NotFound(_))));

    let archived = vault.get_archived(a).unwrap();
    assert_eq!(archived.record.customer_name, "Suzanne Brennan");
    assert!(
        archived.date_archived - archived.record.date_dispatched.unwrap() >= Duration::days(120)
    );
}

#[test]
fn test_archival_appends_exactly_one_archive_entry() {
    let dir = TempDir::new().unwrap();
    let mut vault = Vault::open(VaultConfig::new(dir.path())).unwrap();

    let id = vault.create_request(sample_form("Suzanne Brennan")).unwrap();
    vault.update_status(id, OrderStatus::Dispatched).unwrap();
    vault
        .archive_eligible_at(Utc::now() + Duration::days(121))
        .unwrap();

    let kinds: Vec<AuditKind> = vault
        .audit()
        .entries_for(id)
        .unwrap()
        .iter()
        .map(|e| e.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![AuditKind::Create, AuditKind::Update, AuditKind::Archive]
    );
}

#[test]
fn test_second_sweep_is_noop() {
    let dir = TempDir::new().unwrap();
    let mut vault = Vault::open(VaultConfig::new(dir.path())).unwrap();

    let id = vault.create_request(sample_form("Suzanne Brennan")).unwrap();
    vault.update_status(id, OrderStatus::Dispatched).unwrap();

    let sweep_at = Utc::now() + Duration::days(121);
    assert_eq!(vault.archive_eligible_at(sweep_at).unwrap().archived_count(), 1);
    let second = vault.archive_eligible_at(sweep_at).unwrap();
    assert_eq!(second.archived_count(), 0);
    assert!(second.is_clean());
    assert_eq!(vault.stats().archived_total, 1);
}

#[test]
fn test_record_lives_in_exactly_one_set() {
    let dir = TempDir::new().unwrap();
    let mut vault = Vault::open(VaultConfig::new(dir.path())).unwrap();

    let id = vault.create_request(sample_form("Suzanne Brennan")).unwrap();
    assert!(vault.get(id).is_ok());
    assert!(vault.get_archived(id).is_err());

    vault.update_status(id, OrderStatus::Dispatched).unwrap();
    vault
        .archive_eligible_at(Utc::now() + Duration::days(121))
        .unwrap();

    assert!(vault.get(id).is_err());
    assert!(vault.get_archived(id).is_ok());
}

#[test]
fn test_direct_dispatch_jump_is_allowed() {
    let dir = TempDir::new().unwrap();
    let mut vault = Vault::open(VaultConfig::new(dir.path())).unwrap();

    let id = vault.create_request(sample_form("Suzanne Brennan")).unwrap();
    let record = vault.update_status(id, OrderStatus::Dispatched).unwrap();
    assert_eq!(record.status, OrderStatus::Dispatched);
    assert!(record.date_dispatched.is_some());
}

#[test]
fn test_dispatch_is_never_reversed() {
    let dir = TempDir::new().unwrap();
    let mut vault = Vault::open(VaultConfig::new(dir.path())).unwrap();

    let id = vault.create_request(sample_form("Suzanne Brennan")).unwrap();
    vault.update_status(id, OrderStatus::Dispatched).unwrap();

    let err = vault.update_status(id, OrderStatus::Outstanding).unwrap_err();
    assert!(matches!(err, VaultError::InvalidTransition { .. }));
    assert_eq!(vault.get(id).unwrap().status, OrderStatus::Dispatched);
}

#[test]
fn test_update_unknown_record_is_not_found() {
    let dir = TempDir::new().unwrap();
    let mut vault = Vault::open(VaultConfig::new(dir.path())).unwrap();
    assert!(matches!(
        vault.update_status(404, OrderStatus::InProgress),
        Err(VaultError::NotFound(404))
    ));
}

#[test]
fn test_sweep_takes_pre_operation_snapshot() {
    let dir = TempDir::new().unwrap();
    let mut vault = Vault::open(VaultConfig::new(dir.path())).unwrap();
    vault.create_request(sample_form("Suzanne Brennan")).unwrap();

    assert!(vault.list_snapshots().unwrap().is_empty());
    vault.archive_eligible().unwrap();
    assert_eq!(vault.list_snapshots().unwrap().len(), 1);

    // And it can be turned off
    let dir2 = TempDir::new().unwrap();
    let mut quiet = Vault::open(
        VaultConfig::new(dir2.path()).without_pre_operation_backup(),
    )
    .unwrap();
    quiet.create_request(sample_form("David Hall")).unwrap();
    quiet.archive_eligible().unwrap();
    assert!(quiet.list_snapshots().unwrap().is_empty());
}
