//! Coupon repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};

use animart_core::coupon::{Coupon, normalize_code};
use animart_core::{CouponId, DiscountType};

use super::RepositoryError;

const COUPON_COLUMNS: &str = "id, code, discount_type, discount_value, min_order_amount, \
                              max_uses, used_count, expires_at, is_active";

/// Admin payload for creating or replacing a coupon.
#[derive(Debug, Clone, Deserialize)]
pub struct CouponInput {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    #[serde(default)]
    pub min_order_amount: Decimal,
    #[serde(default)]
    pub max_uses: Option<i32>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

/// Repository for coupon database operations.
pub struct CouponRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CouponRepository<'a> {
    /// Create a new coupon repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Look up a coupon by code. The code is normalized first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_code(&self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        let coupon = sqlx::query_as::<_, Coupon>(&format!(
            "SELECT {COUPON_COLUMNS} FROM shop.coupon WHERE code = $1"
        ))
        .bind(normalize_code(code))
        .fetch_optional(self.pool)
        .await?;
        Ok(coupon)
    }

    /// All coupons, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Coupon>, RepositoryError> {
        let coupons = sqlx::query_as::<_, Coupon>(&format!(
            "SELECT {COUPON_COLUMNS} FROM shop.coupon ORDER BY created_at DESC"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(coupons)
    }

    /// Create a coupon. The code is stored normalized.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the code already exists.
    pub async fn create(&self, input: &CouponInput) -> Result<Coupon, RepositoryError> {
        let coupon = sqlx::query_as::<_, Coupon>(&format!(
            r"
            INSERT INTO shop.coupon
                (code, discount_type, discount_value, min_order_amount, max_uses, expires_at, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {COUPON_COLUMNS}
            "
        ))
        .bind(normalize_code(&input.code))
        .bind(input.discount_type)
        .bind(input.discount_value)
        .bind(input.min_order_amount)
        .bind(input.max_uses)
        .bind(input.expires_at)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "coupon code already exists"))?;
        Ok(coupon)
    }

    /// Replace a coupon's definition. `used_count` is left alone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon doesn't exist.
    /// Returns `RepositoryError::Conflict` if the new code is taken.
    pub async fn update(
        &self,
        id: CouponId,
        input: &CouponInput,
    ) -> Result<Coupon, RepositoryError> {
        let coupon = sqlx::query_as::<_, Coupon>(&format!(
            r"
            UPDATE shop.coupon
            SET code = $2, discount_type = $3, discount_value = $4, min_order_amount = $5,
                max_uses = $6, expires_at = $7, is_active = $8
            WHERE id = $1
            RETURNING {COUPON_COLUMNS}
            "
        ))
        .bind(id)
        .bind(normalize_code(&input.code))
        .bind(input.discount_type)
        .bind(input.discount_value)
        .bind(input.min_order_amount)
        .bind(input.max_uses)
        .bind(input.expires_at)
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "coupon code already exists"))?
        .ok_or(RepositoryError::NotFound)?;
        Ok(coupon)
    }

    /// Delete a coupon. Orders keep the code they were placed with.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon doesn't exist.
    pub async fn delete(&self, id: CouponId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.coupon WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

/// Count one use of a coupon, guarded so concurrent checkouts cannot push
/// `used_count` past `max_uses`.
///
/// Returns `false` if the coupon is exhausted, inactive or expired by the
/// time the update runs.
pub(crate) async fn redeem(conn: &mut PgConnection, id: CouponId) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE shop.coupon SET used_count = used_count + 1
        WHERE id = $1
          AND is_active
          AND (expires_at IS NULL OR expires_at >= NOW())
          AND (max_uses IS NULL OR used_count < max_uses)
        ",
    )
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Give back one use of a coupon, never going below zero.
pub(crate) async fn release(conn: &mut PgConnection, id: CouponId) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE shop.coupon SET used_count = used_count - 1 WHERE id = $1 AND used_count > 0")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
