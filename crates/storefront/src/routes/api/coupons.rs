//! Coupon preview.

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::Deserialize;

use animart_core::coupon::AppliedCoupon;
use animart_core::money::MAX_AMOUNT;

use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::routes::ApiOk;
use crate::services::pricing::PricingService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ValidateCouponRequest {
    pub code: String,
    pub subtotal: Decimal,
}

/// Check a coupon against a cart subtotal without redeeming it.
///
/// POST /api/coupons/validate
///
/// The discount shown here is recomputed at checkout.
///
/// # Errors
///
/// 400 with the rejection reason if the coupon cannot be applied.
pub async fn validate(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Json(req): Json<ValidateCouponRequest>,
) -> Result<ApiOk<AppliedCoupon>, AppError> {
    if req.code.trim().is_empty() {
        return Err(AppError::BadRequest("Coupon code is required".into()));
    }
    check_subtotal(req.subtotal)?;

    let applied = PricingService::new(state.pool(), &state.config().shipping)
        .preview_coupon(&req.code, req.subtotal)
        .await?;
    Ok(ApiOk(applied))
}

fn check_subtotal(subtotal: Decimal) -> Result<(), AppError> {
    if subtotal.is_sign_negative() || subtotal > MAX_AMOUNT {
        return Err(AppError::BadRequest("Invalid subtotal".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtotal_bounds() {
        assert!(check_subtotal(Decimal::ZERO).is_ok());
        assert!(check_subtotal(MAX_AMOUNT).is_ok());
        assert!(check_subtotal(Decimal::new(-1, 2)).is_err());
        assert!(check_subtotal(Decimal::MAX).is_err());
        assert!(check_subtotal(Decimal::MIN).is_err());
    }
}
