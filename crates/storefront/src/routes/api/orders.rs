//! Checkout and order history.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use animart_core::{AddressId, OrderId, UserRole};

use crate::db::orders::NewOrder;
use crate::db::{AddressRepository, OrderRepository, UserRepository};
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::order::{Order, ShippingAddress};
use crate::routes::ApiOk;
use crate::services::authorization;
use crate::services::pricing::{CheckoutLine, PricingService};
use crate::state::AppState;

/// Most lines accepted in one checkout.
const MAX_ORDER_LINES: usize = 50;

/// Roles that may place orders.
const BUYER_ROLES: &[UserRole] = &[UserRole::Customer, UserRole::Admin];

/// Checkout request. Prices and shipping are what the client displayed and
/// are only used to detect tampering.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<CheckoutLine>,
    /// Ship to a saved address.
    #[serde(default)]
    pub address_id: Option<AddressId>,
    /// Or ship to an address entered at checkout.
    #[serde(default)]
    pub shipping_address: Option<ShippingAddress>,
    pub shipping_cost: Decimal,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

/// Place an order.
///
/// POST /api/orders
///
/// # Errors
///
/// - 400 if prices, shipping, coupon or options don't check out
/// - 403 if the account is blocked
/// - 409 if stock or the coupon ran out meanwhile
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(req): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    let users = UserRepository::new(state.pool());
    authorization::require_role(&users, Some(&user), BUYER_ROLES).await?;

    if req.items.len() > MAX_ORDER_LINES {
        return Err(AppError::BadRequest(format!(
            "An order can have at most {MAX_ORDER_LINES} lines"
        )));
    }

    let shipping_address = match (req.address_id, req.shipping_address) {
        (Some(id), _) => AddressRepository::new(state.pool())
            .get(user.id, id)
            .await?
            .map(ShippingAddress::from)
            .ok_or_else(|| AppError::NotFound("Address not found".into()))?,
        (None, Some(address)) => address
            .normalized()
            .map_err(|field| AppError::BadRequest(format!("Invalid shipping address: {field}")))?,
        (None, None) => {
            return Err(AppError::BadRequest("Shipping address is required".into()));
        }
    };

    let (quote, lines) = PricingService::new(state.pool(), &state.config().shipping)
        .quote_checkout(&req.items, req.shipping_cost, req.coupon_code.as_deref())
        .await?;

    let new_order = NewOrder {
        user_id: user.id,
        email: user.email.to_string(),
        shipping_address,
        subtotal: quote.cart.subtotal,
        discount: quote.discount,
        shipping_cost: quote.shipping_cost,
        total: quote.total,
        coupon: quote.coupon.map(|c| (c.coupon_id, c.code)),
        lines,
    };
    let order = OrderRepository::new(state.pool()).place(&new_order).await?;

    tracing::info!(
        order_id = %order.id,
        order_number = %order.order_number,
        total = %order.total,
        "Order placed"
    );

    Ok((StatusCode::CREATED, ApiOk(order)))
}

/// The caller's orders, newest first.
///
/// GET /api/orders
///
/// # Errors
///
/// 500 on database failure.
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<ApiOk<Vec<Order>>, AppError> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(ApiOk(orders))
}

/// One of the caller's orders.
///
/// GET /api/orders/{id}
///
/// # Errors
///
/// 404 if the order doesn't exist or belongs to someone else.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<ApiOk<Order>, AppError> {
    let order = OrderRepository::new(state.pool())
        .get(id, Some(user.id))
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;
    Ok(ApiOk(order))
}
