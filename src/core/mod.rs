pub mod error;
pub mod record;

pub use error::{Result, VaultError};
pub use record::{ArchivedRecord, OrderForm, OrderRecord, OrderStatus};
