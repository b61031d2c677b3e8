//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use animart_core::{Email, UserId, UserRole};

/// A storefront account.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub name: String,
    pub role: UserRole,
    pub is_blocked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether this account may open a session at all.
    #[must_use]
    pub const fn can_sign_in(&self) -> bool {
        !self.is_blocked && self.role.can_sign_in()
    }
}

/// A user with order totals, for the admin customer list.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerSummary {
    #[serde(flatten)]
    pub user: User,
    pub order_count: i64,
    pub total_spent: rust_decimal::Decimal,
}
