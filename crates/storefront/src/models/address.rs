//! Saved shipping addresses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use animart_core::{AddressId, UserId};

/// A saved address belonging to a user.
#[derive(Debug, Clone, Serialize)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub full_name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create/update payload for an address.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct AddressInput {
    pub full_name: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    pub postal_code: String,
    pub country: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl AddressInput {
    const MAX_FIELD_LEN: usize = 200;

    /// Trim every field, turn blank optionals into `None` and reject blanks
    /// in required fields.
    ///
    /// # Errors
    ///
    /// Returns the name of the first invalid field.
    pub fn normalized(self) -> Result<Self, &'static str> {
        fn required(value: String, field: &'static str) -> Result<String, &'static str> {
            let v = value.trim();
            if v.is_empty() || v.len() > AddressInput::MAX_FIELD_LEN {
                return Err(field);
            }
            Ok(v.to_owned())
        }
        fn optional(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        }

        Ok(Self {
            full_name: required(self.full_name, "full_name")?,
            line1: required(self.line1, "line1")?,
            line2: optional(self.line2),
            city: required(self.city, "city")?,
            state: optional(self.state),
            postal_code: required(self.postal_code, "postal_code")?,
            country: required(self.country, "country")?,
            phone: optional(self.phone),
            is_default: self.is_default,
        })
    }
}
