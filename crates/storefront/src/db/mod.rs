//! Database operations for the storefront `PostgreSQL` database.
//!
//! ## Tables (schema `shop`)
//!
//! - `user`, `address` - Accounts and saved shipping addresses
//! - `category`, `product` - Catalog
//! - `product_variant` - Legacy (color, size) rows with their own price and stock
//! - `product_color`, `product_size_stock` - Decomposed options
//! - `wishlist_item` - Saved products per user
//! - `coupon`, `order`, `order_item` - Checkout
//! - `contact_message` - Contact form submissions
//! - `tower_sessions.session` - Created by the session store itself
//!
//! # Migrations
//!
//! Migrations live in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p animart-cli -- migrate
//! ```
//!
//! Queries are built at runtime with `sqlx::query_as` and `FromRow` row types,
//! so the crate builds without a live database.

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub mod addresses;
pub mod categories;
pub mod coupons;
pub mod messages;
pub mod orders;
pub mod products;
pub mod users;
pub mod wishlist;

pub use addresses::AddressRepository;
pub use categories::CategoryRepository;
pub use coupons::CouponRepository;
pub use messages::MessageRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use users::UserRepository;
pub use wishlist::WishlistRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique-constraint violation to `Conflict(message)`.
    pub(crate) fn unique_violation(e: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(e)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Offset-based page request, clamped to sane bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub per_page: i64,
}

impl Page {
    pub const DEFAULT_PER_PAGE: i64 = 20;
    pub const MAX_PER_PAGE: i64 = 100;

    /// Build from optional query parameters.
    #[must_use]
    pub fn new(page: Option<i64>, per_page: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page
                .unwrap_or(Self::DEFAULT_PER_PAGE)
                .clamp(1, Self::MAX_PER_PAGE),
        }
    }

    #[must_use]
    pub const fn offset(self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }

    #[must_use]
    pub const fn limit(self) -> i64 {
        self.per_page
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_clamps() {
        let p = Page::new(Some(0), Some(1000));
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, Page::MAX_PER_PAGE);
        assert_eq!(p.offset(), 0);

        let p = Page::new(Some(3), Some(10));
        assert_eq!(p.offset(), 20);
        assert_eq!(p.limit(), 10);

        assert_eq!(Page::default().per_page, Page::DEFAULT_PER_PAGE);

        let p = Page::new(Some(i64::MAX), Some(20));
        assert_eq!(p.offset(), i64::MAX);
        let p = Page::new(Some(i64::MIN), None);
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn test_not_found_display() {
        assert_eq!(RepositoryError::NotFound.to_string(), "not found");
        assert_eq!(
            RepositoryError::Conflict("slug taken".into()).to_string(),
            "constraint violation: slug taken"
        );
    }
}
