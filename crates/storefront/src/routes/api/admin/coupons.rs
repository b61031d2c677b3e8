//! Coupon management.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::instrument;

use animart_core::CouponId;
use animart_core::coupon::{Coupon, CouponDefinitionError, validate_definition};

use crate::db::CouponRepository;
use crate::db::coupons::CouponInput;
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::routes::{ApiOk, not_found};
use crate::state::AppState;

/// Check the discount rules of an admin-submitted coupon.
fn check(input: &CouponInput) -> Result<(), CouponDefinitionError> {
    validate_definition(
        &input.code,
        input.discount_type,
        input.discount_value,
        input.min_order_amount,
        input.max_uses,
    )
}

/// GET /api/admin/coupons
///
/// # Errors
///
/// 500 on database failure.
pub async fn index(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<ApiOk<Vec<Coupon>>, AppError> {
    let coupons = CouponRepository::new(state.pool()).list().await?;
    Ok(ApiOk(coupons))
}

/// POST /api/admin/coupons
///
/// # Errors
///
/// 400 for an invalid definition, 409 if the code exists.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<CouponInput>,
) -> Result<impl IntoResponse, AppError> {
    check(&input).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let coupon = CouponRepository::new(state.pool()).create(&input).await?;
    tracing::info!(coupon_id = %coupon.id, code = %coupon.code, "Coupon created");
    Ok((StatusCode::CREATED, ApiOk(coupon)))
}

/// Replace a coupon's definition. Its usage count is kept.
///
/// PUT /api/admin/coupons/{id}
///
/// # Errors
///
/// 400 for an invalid definition, 404 if missing, 409 if the code exists.
#[instrument(skip_all, fields(admin_id = %admin.id, coupon_id = %id))]
pub async fn update(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CouponId>,
    Json(input): Json<CouponInput>,
) -> Result<ApiOk<Coupon>, AppError> {
    check(&input).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let coupon = CouponRepository::new(state.pool())
        .update(id, &input)
        .await
        .map_err(not_found("Coupon not found"))?;
    tracing::info!("Coupon updated");
    Ok(ApiOk(coupon))
}

/// DELETE /api/admin/coupons/{id}
///
/// # Errors
///
/// 404 if the coupon doesn't exist.
#[instrument(skip_all, fields(admin_id = %admin.id, coupon_id = %id))]
pub async fn delete(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CouponId>,
) -> Result<StatusCode, AppError> {
    CouponRepository::new(state.pool())
        .delete(id)
        .await
        .map_err(not_found("Coupon not found"))?;
    tracing::info!("Coupon deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use animart_core::DiscountType;

    use super::*;

    fn input(code: &str, discount_type: DiscountType, value: i64) -> CouponInput {
        CouponInput {
            code: code.into(),
            discount_type,
            discount_value: Decimal::from(value),
            min_order_amount: Decimal::ZERO,
            max_uses: None,
            expires_at: None,
            is_active: true,
        }
    }

    #[test]
    fn test_check_accepts_sane_definitions() {
        assert!(check(&input("SUMMER10", DiscountType::Percentage, 10)).is_ok());
        assert!(check(&input("FLAT-5", DiscountType::Fixed, 5)).is_ok());
    }

    #[test]
    fn test_check_rejects_bad_definitions() {
        assert_eq!(
            check(&input("BIG", DiscountType::Percentage, 150)),
            Err(CouponDefinitionError::InvalidPercentage)
        );
        assert_eq!(
            check(&input("   ", DiscountType::Fixed, 5)),
            Err(CouponDefinitionError::EmptyCode)
        );
    }
}
