//! Customer accounts.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use animart_core::{UserId, UserRole};

use crate::db::{OrderRepository, Page, UserRepository};
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::order::Order;
use crate::models::user::{CustomerSummary, User};
use crate::routes::{ApiOk, not_found};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CustomerListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BlockUpdate {
    pub blocked: bool,
}

#[derive(Debug, Deserialize)]
pub struct RoleUpdate {
    pub role: UserRole,
}

/// An account with its order history.
#[derive(Debug, Serialize)]
pub struct CustomerDetail {
    pub user: User,
    pub orders: Vec<Order>,
}

/// GET /api/admin/customers?search=
///
/// # Errors
///
/// 500 on database failure.
pub async fn index(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<CustomerListQuery>,
) -> Result<ApiOk<Vec<CustomerSummary>>, AppError> {
    let search = query.search.as_deref().filter(|s| !s.trim().is_empty());
    let customers = UserRepository::new(state.pool())
        .list_customers(search, Page::new(query.page, query.per_page))
        .await?;
    Ok(ApiOk(customers))
}

/// GET /api/admin/customers/{id}
///
/// # Errors
///
/// 404 if the account doesn't exist.
pub async fn show(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<ApiOk<CustomerDetail>, AppError> {
    let user = UserRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Customer not found".into()))?;
    let orders = OrderRepository::new(state.pool()).list_for_user(id).await?;
    Ok(ApiOk(CustomerDetail { user, orders }))
}

/// Block or unblock an account. Blocked accounts cannot sign in; sessions
/// already open are stopped the next time their claims are checked against
/// the database.
///
/// PUT /api/admin/customers/{id}/block
///
/// # Errors
///
/// - 400 if an admin tries to block themself
/// - 404 if the account doesn't exist
#[instrument(skip_all, fields(admin_id = %admin.id, user_id = %id, blocked = update.blocked))]
pub async fn set_blocked(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(update): Json<BlockUpdate>,
) -> Result<ApiOk<User>, AppError> {
    if id == admin.id {
        return Err(AppError::BadRequest("You cannot block your own account".into()));
    }
    let user = UserRepository::new(state.pool())
        .set_blocked(id, update.blocked)
        .await
        .map_err(not_found("Customer not found"))?;
    tracing::info!("Account block status changed");
    Ok(ApiOk(user))
}

/// PUT /api/admin/customers/{id}/role
///
/// # Errors
///
/// - 400 if an admin tries to change their own role
/// - 404 if the account doesn't exist
#[instrument(skip_all, fields(admin_id = %admin.id, user_id = %id, role = %update.role))]
pub async fn set_role(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(update): Json<RoleUpdate>,
) -> Result<ApiOk<User>, AppError> {
    if id == admin.id {
        return Err(AppError::BadRequest("You cannot change your own role".into()));
    }
    let user = UserRepository::new(state.pool())
        .set_role(id, update.role)
        .await
        .map_err(not_found("Customer not found"))?;
    tracing::info!("Account role changed");
    Ok(ApiOk(user))
}
