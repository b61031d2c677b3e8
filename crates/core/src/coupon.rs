//! Coupon eligibility and discount calculation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::round_cents;
use crate::types::{CouponId, DiscountType};

/// A coupon as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub min_order_amount: Decimal,
    /// `None` means unlimited.
    pub max_uses: Option<i32>,
    pub used_count: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// Why a coupon cannot be applied. The message is shown to the shopper.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponRejection {
    #[error("Invalid coupon code")]
    NotFound,

    #[error("This coupon is no longer active")]
    Inactive,

    #[error("This coupon has expired")]
    Expired,

    #[error("This coupon has reached its usage limit")]
    UsageLimitReached,

    #[error("Minimum order amount of ${minimum} required")]
    BelowMinimum { minimum: Decimal },
}

/// A coupon that passed validation, with the discount it grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedCoupon {
    pub coupon_id: CouponId,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub discount: Decimal,
}

/// Problems with a coupon definition submitted by an admin.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponDefinitionError {
    #[error("coupon code cannot be empty")]
    EmptyCode,

    #[error("coupon code may only contain letters, digits, '-' and '_'")]
    InvalidCode,

    #[error("percentage discount must be greater than 0 and at most 100")]
    InvalidPercentage,

    #[error("fixed discount must be greater than 0")]
    InvalidFixedAmount,

    #[error("minimum order amount cannot be negative")]
    NegativeMinimum,

    #[error("max uses must be at least 1")]
    InvalidMaxUses,
}

/// Canonical form of a shopper-typed code.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

impl Coupon {
    /// Whether the coupon has been redeemed as often as allowed.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.max_uses.is_some_and(|max| self.used_count >= max)
    }

    /// Whether `expires_at` is strictly before `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at < now)
    }

    /// Discount on `subtotal`, rounded to cents and never more than it.
    #[must_use]
    pub fn discount_for(&self, subtotal: Decimal) -> Decimal {
        let subtotal = subtotal.max(Decimal::ZERO);
        let raw = match self.discount_type {
            DiscountType::Percentage => (self.discount_value / Decimal::ONE_HUNDRED)
                .checked_mul(subtotal)
                .unwrap_or(subtotal),
            DiscountType::Fixed => self.discount_value,
        };
        round_cents(raw).clamp(Decimal::ZERO, subtotal)
    }
}

/// Decide whether `coupon` applies to an order of `subtotal` at `now`.
///
/// Checks run in a fixed order (existence, active flag, expiry, minimum,
/// usage) and the first failure is reported.
///
/// # Errors
///
/// Returns the [`CouponRejection`] for the first failed check.
pub fn validate_coupon(
    coupon: Option<&Coupon>,
    subtotal: Decimal,
    now: DateTime<Utc>,
) -> Result<AppliedCoupon, CouponRejection> {
    let coupon = coupon.ok_or(CouponRejection::NotFound)?;

    if !coupon.is_active {
        return Err(CouponRejection::Inactive);
    }
    if coupon.is_expired(now) {
        return Err(CouponRejection::Expired);
    }
    if subtotal < coupon.min_order_amount {
        return Err(CouponRejection::BelowMinimum {
            minimum: coupon.min_order_amount,
        });
    }
    if coupon.is_exhausted() {
        return Err(CouponRejection::UsageLimitReached);
    }

    Ok(AppliedCoupon {
        coupon_id: coupon.id,
        code: coupon.code.clone(),
        discount_type: coupon.discount_type,
        discount_value: coupon.discount_value,
        discount: coupon.discount_for(subtotal),
    })
}

/// Validate the parts of a coupon an admin controls.
///
/// # Errors
///
/// Returns the first [`CouponDefinitionError`] found.
pub fn validate_definition(
    code: &str,
    discount_type: DiscountType,
    discount_value: Decimal,
    min_order_amount: Decimal,
    max_uses: Option<i32>,
) -> Result<(), CouponDefinitionError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(CouponDefinitionError::EmptyCode);
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(CouponDefinitionError::InvalidCode);
    }

    match discount_type {
        DiscountType::Percentage
            if discount_value <= Decimal::ZERO || discount_value > Decimal::ONE_HUNDRED =>
        {
            return Err(CouponDefinitionError::InvalidPercentage);
        }
        DiscountType::Fixed if discount_value <= Decimal::ZERO => {
            return Err(CouponDefinitionError::InvalidFixedAmount);
        }
        _ => {}
    }

    if min_order_amount < Decimal::ZERO {
        return Err(CouponDefinitionError::NegativeMinimum);
    }
    if max_uses.is_some_and(|m| m < 1) {
        return Err(CouponDefinitionError::InvalidMaxUses);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn coupon() -> Coupon {
        Coupon {
            id: CouponId::new(1),
            code: "OTAKU10".into(),
            discount_type: DiscountType::Percentage,
            discount_value: dec("10"),
            min_order_amount: dec("30"),
            max_uses: Some(100),
            used_count: 0,
            expires_at: None,
            is_active: true,
        }
    }

    #[test]
    fn test_percentage_discount() {
        let applied = validate_coupon(Some(&coupon()), dec("45.55"), Utc::now()).unwrap();
        assert_eq!(applied.discount, dec("4.56"));
        assert_eq!(applied.code, "OTAKU10");
    }

    #[test]
    fn test_fixed_discount_capped_at_subtotal() {
        let c = Coupon {
            discount_type: DiscountType::Fixed,
            discount_value: dec("50"),
            min_order_amount: Decimal::ZERO,
            ..coupon()
        };
        let applied = validate_coupon(Some(&c), dec("20"), Utc::now()).unwrap();
        assert_eq!(applied.discount, dec("20"));
    }

    #[test]
    fn test_missing_coupon() {
        assert_eq!(
            validate_coupon(None, dec("100"), Utc::now()).unwrap_err(),
            CouponRejection::NotFound
        );
    }

    #[test]
    fn test_expired_coupon_rejected() {
        let now = Utc::now();
        let c = Coupon {
            expires_at: Some(now - Duration::seconds(1)),
            ..coupon()
        };
        assert_eq!(
            validate_coupon(Some(&c), dec("100"), now).unwrap_err(),
            CouponRejection::Expired
        );

        // Expiring exactly now is still valid.
        let c = Coupon {
            expires_at: Some(now),
            ..coupon()
        };
        assert!(validate_coupon(Some(&c), dec("100"), now).is_ok());
    }

    #[test]
    fn test_usage_limit() {
        for used in [100, 101] {
            let c = Coupon {
                used_count: used,
                ..coupon()
            };
            assert_eq!(
                validate_coupon(Some(&c), dec("100"), Utc::now()).unwrap_err(),
                CouponRejection::UsageLimitReached
            );
        }
        let unlimited = Coupon {
            max_uses: None,
            used_count: 10_000,
            ..coupon()
        };
        assert!(validate_coupon(Some(&unlimited), dec("100"), Utc::now()).is_ok());
    }

    #[test]
    fn test_below_minimum() {
        let err = validate_coupon(Some(&coupon()), dec("29.99"), Utc::now()).unwrap_err();
        assert_eq!(err, CouponRejection::BelowMinimum { minimum: dec("30") });
        assert_eq!(err.to_string(), "Minimum order amount of $30 required");
    }

    #[test]
    fn test_minimum_checked_before_usage() {
        let c = Coupon {
            used_count: 100,
            ..coupon()
        };
        assert_eq!(
            validate_coupon(Some(&c), dec("10"), Utc::now()).unwrap_err(),
            CouponRejection::BelowMinimum { minimum: dec("30") }
        );
    }

    #[test]
    fn test_discount_at_decimal_bounds() {
        let full = Coupon {
            discount_value: dec("100"),
            ..coupon()
        };
        let applied = validate_coupon(Some(&full), Decimal::MAX, Utc::now()).unwrap();
        assert_eq!(applied.discount, Decimal::MAX);

        let applied = validate_coupon(Some(&coupon()), Decimal::MAX, Utc::now()).unwrap();
        assert!(applied.discount > Decimal::ZERO && applied.discount < Decimal::MAX);

        let fixed = Coupon {
            discount_type: DiscountType::Fixed,
            discount_value: dec("5"),
            min_order_amount: Decimal::ZERO,
            ..coupon()
        };
        assert_eq!(fixed.discount_for(Decimal::MIN), Decimal::ZERO);
        assert_eq!(fixed.discount_for(Decimal::MAX), dec("5"));
        assert!(validate_coupon(Some(&fixed), Decimal::MIN, Utc::now()).is_err());
    }

    #[test]
    fn test_inactive_checked_before_expiry() {
        let c = Coupon {
            is_active: false,
            expires_at: Some(Utc::now() - Duration::days(3)),
            used_count: 100,
            ..coupon()
        };
        assert_eq!(
            validate_coupon(Some(&c), dec("1"), Utc::now()).unwrap_err(),
            CouponRejection::Inactive
        );
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("  otaku10 "), "OTAKU10");
    }

    #[test]
    fn test_definition_validation() {
        let ok = validate_definition("SUMMER-24", DiscountType::Percentage, dec("15"), dec("0"), None);
        assert!(ok.is_ok());
        assert_eq!(
            validate_definition("X", DiscountType::Percentage, dec("101"), dec("0"), None),
            Err(CouponDefinitionError::InvalidPercentage)
        );
        assert_eq!(
            validate_definition("X", DiscountType::Percentage, dec("0"), dec("0"), None),
            Err(CouponDefinitionError::InvalidPercentage)
        );
        assert_eq!(
            validate_definition("X", DiscountType::Fixed, dec("-1"), dec("0"), None),
            Err(CouponDefinitionError::InvalidFixedAmount)
        );
        assert_eq!(
            validate_definition("bad code", DiscountType::Fixed, dec("5"), dec("0"), None),
            Err(CouponDefinitionError::InvalidCode)
        );
        assert_eq!(
            validate_definition("X", DiscountType::Fixed, dec("5"), dec("0"), Some(0)),
            Err(CouponDefinitionError::InvalidMaxUses)
        );
    }
}
