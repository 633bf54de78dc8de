use super::{Result, VaultError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// Field ceilings for customer-submitted data
pub const MAX_FABRIC_CUTTINGS: usize = 5;
pub const MAX_NAME_LEN: usize = 100;
pub const MAX_EMAIL_LEN: usize = 120;
pub const MAX_PHONE_LEN: usize = 20;
pub const MAX_REFERENCE_LEN: usize = 100;
pub const MAX_STREET_LEN: usize = 200;
pub const MAX_REGION_LEN: usize = 100;
pub const MAX_POSTAL_LEN: usize = 20;
pub const MAX_CUTTING_LEN: usize = 200;
pub const MAX_NOTES_LEN: usize = 1000;

/// Order lifecycle status. Transitions are monotonic: a record only moves
/// forward along `Outstanding -> InProgress -> Dispatched`, and dispatch is
/// never reversed. Skipping a stage is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Outstanding,
    #[serde(rename = "In Progress")]
    InProgress,
    Dispatched,
}

impl OrderStatus {
    fn rank(self) -> u8 {
        match self {
            OrderStatus::Outstanding => 0,
            OrderStatus::InProgress => 1,
            OrderStatus::Dispatched => 2,
        }
    }

    /// A transition is valid only when it strictly advances the lifecycle.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        next.rank() > self.rank()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderStatus::Outstanding => "Outstanding",
            OrderStatus::InProgress => "In Progress",
            OrderStatus::Dispatched => "Dispatched",
        };
        write!(f, "{}", name)
    }
}

/// One customer fabric-cutting request, as held in the active or archive set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: u64,
    pub customer_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company_name: String,
    pub street_address: String,
    pub city: String,
    pub state_province: String,
    pub postal_code: String,
    pub country: String,
    pub fabric_cuttings: Vec<String>,
    pub reference: Option<String>,
    pub additional_notes: Option<String>,
    pub status: OrderStatus,
    pub date_submitted: DateTime<Utc>,
    pub date_dispatched: Option<DateTime<Utc>>,
    pub supplier_notified: bool,
}

impl OrderRecord {
    /// Names of required fields that are empty on this record.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.customer_name.trim().is_empty() {
            missing.push("customer_name");
        }
        if self.email.trim().is_empty() {
            missing.push("email");
        }
        if self.street_address.trim().is_empty() {
            missing.push("street_address");
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Case-insensitive substring match over the searchable fields.
    pub fn matches_search(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.customer_name.to_lowercase().contains(&needle)
            || self.company_name.to_lowercase().contains(&needle)
            || self.email.to_lowercase().contains(&needle)
            || self
                .reference
                .as_deref()
                .is_some_and(|r| r.to_lowercase().contains(&needle))
    }
}

/// An order record that has left the active set. The payload is the record
/// exactly as it stood at archive time; archive membership is permanent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedRecord {
    pub original_id: u64,
    pub record: OrderRecord,
    pub date_archived: DateTime<Utc>,
}

impl ArchivedRecord {
    pub fn matches_search(&self, query: &str) -> bool {
        self.record.matches_search(query)
    }
}

/// Validated intake payload for a new order. The store assigns the id,
/// status and timestamps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderForm {
    pub customer_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company_name: String,
    pub street_address: String,
    pub city: String,
    pub state_province: String,
    pub postal_code: String,
    pub country: String,
    pub fabric_cuttings: Vec<String>,
    pub reference: Option<String>,
    pub additional_notes: Option<String>,
}

fn trim_opt(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl OrderForm {
    /// Trim surrounding whitespace from every field and drop blank cuttings,
    /// matching how the intake layer sanitizes submissions.
    pub fn normalized(mut self) -> Self {
        self.customer_name = self.customer_name.trim().to_string();
        self.email = self.email.trim().to_string();
        self.phone = trim_opt(self.phone);
        self.company_name = self.company_name.trim().to_string();
        self.street_address = self.street_address.trim().to_string();
        self.city = self.city.trim().to_string();
        self.state_province = self.state_province.trim().to_string();
        self.postal_code = self.postal_code.trim().to_string();
        self.country = self.country.trim().to_string();
        self.fabric_cuttings = self
            .fabric_cuttings
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        self.reference = trim_opt(self.reference);
        self.additional_notes = self.additional_notes.map(|n| n.trim().to_string());
        self
    }

    pub fn validate(&self) -> Result<()> {
        let required: [(&str, &str); 8] = [
            ("customer_name", &self.customer_name),
            ("email", &self.email),
            ("company_name", &self.company_name),
            ("street_address", &self.street_address),
            ("city", &self.city),
            ("state_province", &self.state_province),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(VaultError::Validation(format!(
                    "Required field '{}' is missing",
                    name
                )));
            }
        }

        if !self.email.contains('@') {
            return Err(VaultError::Validation(format!(
                "Invalid email address: '{}'",
                self.email
            )));
        }

        if self.fabric_cuttings.is_empty() {
            return Err(VaultError::Validation(
                "At least one fabric cutting is required".to_string(),
            ));
        }
        if self.fabric_cuttings.len() > MAX_FABRIC_CUTTINGS {
            return Err(VaultError::Validation(format!(
                "At most {} fabric cuttings are accepted, got {}",
                MAX_FABRIC_CUTTINGS,
                self.fabric_cuttings.len()
            )));
        }

        self.check_lengths()
    }

    fn check_lengths(&self) -> Result<()> {
        let limits: [(&str, usize, usize); 9] = [
            ("customer_name", self.customer_name.len(), MAX_NAME_LEN),
            ("email", self.email.len(), MAX_EMAIL_LEN),
            ("company_name", self.company_name.len(), MAX_NAME_LEN),
            ("street_address", self.street_address.len(), MAX_STREET_LEN),
            ("city", self.city.len(), MAX_REGION_LEN),
            ("state_province", self.state_province.len(), MAX_REGION_LEN),
            ("postal_code", self.postal_code.len(), MAX_POSTAL_LEN),
            ("country", self.country.len(), MAX_REGION_LEN),
            (
                "additional_notes",
                self.additional_notes.as_deref().map_or(0, str::len),
                MAX_NOTES_LEN,
            ),
        ];
        for (name, len, max) in limits {
            if len > max {
                return Err(VaultError::Validation(format!(
                    "Field '{}' exceeds {} characters",
                    name, max
                )));
            }
        }
        if self.phone.as_deref().map_or(0, str::len) > MAX_PHONE_LEN {
            return Err(VaultError::Validation(format!(
                "Field 'phone' exceeds {} characters",
                MAX_PHONE_LEN
            )));
        }
        if self.reference.as_deref().map_or(0, str::len) > MAX_REFERENCE_LEN {
            return Err(VaultError::Validation(format!(
                "Field 'reference' exceeds {} characters",
                MAX_REFERENCE_LEN
            )));
        }
        for cutting in &self.fabric_cuttings {
            if cutting.len() > MAX_CUTTING_LEN {
                return Err(VaultError::Validation(format!(
                    "Fabric cutting exceeds {} characters",
                    MAX_CUTTING_LEN
                )));
            }
        }
        Ok(())
    }

    /// Materialize a newly submitted order record.
    pub fn into_record(self, id: u64, submitted_at: DateTime<Utc>) -> OrderRecord {
        OrderRecord {
            id,
            customer_name: self.customer_name,
            email: self.email,
            phone: self.phone,
            company_name: self.company_name,
            street_address: self.street_address,
            city: self.city,
            state_province: self.state_province,
            postal_code: self.postal_code,
            country: self.country,
            fabric_cuttings: self.fabric_cuttings,
            reference: self.reference,
            additional_notes: self.additional_notes,
            status: OrderStatus::Outstanding,
            date_submitted: submitted_at,
            date_dispatched: None,
            supplier_notified: false,
        }
    }
}
