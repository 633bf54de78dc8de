use crate::core::record::OrderStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Record #{0} not found")]
    NotFound(u64),

    #[error("Snapshot '{0}' not found")]
    SnapshotNotFound(String),

    #[error("Record #{0} is unrecoverable: no audit trail exists")]
    Unrecoverable(u64),

    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, VaultError>;
