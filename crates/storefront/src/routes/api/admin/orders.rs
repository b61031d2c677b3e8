//! Order management.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use animart_core::{OrderId, OrderStatus};

use crate::db::orders::StatusChange;
use crate::db::{OrderRepository, Page};
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::order::Order;
use crate::routes::{ApiOk, Paginated, not_found};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}

/// GET /api/admin/orders?status=
///
/// # Errors
///
/// 500 on database failure.
pub async fn index(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> Result<ApiOk<Paginated<Order>>, AppError> {
    let page = Page::new(query.page, query.per_page);
    let (orders, total) = OrderRepository::new(state.pool())
        .list(query.status, page)
        .await?;
    Ok(ApiOk(Paginated::new(orders, total, page)))
}

/// GET /api/admin/orders/{id}
///
/// # Errors
///
/// 404 if the order doesn't exist.
pub async fn show(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<ApiOk<Order>, AppError> {
    let order = OrderRepository::new(state.pool())
        .get(id, None)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;
    Ok(ApiOk(order))
}

/// Move an order along its lifecycle. Cancelling returns stock and coupon
/// usage; a refund keeps them consumed.
///
/// PUT /api/admin/orders/{id}/status
///
/// # Errors
///
/// - 404 if the order doesn't exist
/// - 409 if the transition isn't allowed from the current status
#[instrument(skip_all, fields(admin_id = %admin.id, order_id = %id, status = %update.status))]
pub async fn update_status(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(update): Json<StatusUpdate>,
) -> Result<ApiOk<Order>, AppError> {
    let order = OrderRepository::new(state.pool())
        .change_status(
            id,
            StatusChange {
                next: update.status,
                owner: None,
                only_from: None,
            },
        )
        .await
        .map_err(not_found("Order not found"))
        .inspect_err(|e| tracing::warn!("Status change rejected: {e}"))?;

    tracing::info!(order_number = %order.order_number, "Order status changed");
    Ok(ApiOk(order))
}
