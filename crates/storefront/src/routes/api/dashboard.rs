//! Customer dashboard: profile, addresses, wishlist and order history.
//!
//! Every handler requires a signed-in user and only ever touches that
//! user's rows.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde::Deserialize;
use tower_sessions::Session;

use animart_core::{AddressId, OrderId, OrderStatus, ProductId};

use crate::db::orders::StatusChange;
use crate::db::{
    AddressRepository, OrderRepository, ProductRepository, RepositoryError, UserRepository,
    WishlistRepository,
};
use crate::error::AppError;
use crate::middleware::{RequireAuth, set_current_user};
use crate::models::address::{Address, AddressInput};
use crate::models::catalog::Product;
use crate::models::order::Order;
use crate::models::session::CurrentUser;
use crate::models::user::User;
use crate::routes::{ApiOk, not_found};
use crate::services::auth::{AuthService, validate_name};
use crate::state::AppState;

/// Dashboard routes, nested under `/api/dashboard`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(profile).put(update_profile))
        .route("/password", put(change_password))
        .route("/addresses", get(addresses).post(create_address))
        .route(
            "/addresses/{id}",
            put(update_address).delete(delete_address),
        )
        .route("/wishlist", get(wishlist))
        .route(
            "/wishlist/{product_id}",
            put(add_to_wishlist).delete(remove_from_wishlist),
        )
        .route("/orders", get(orders))
        .route("/orders/{id}/cancel", post(cancel_order))
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdate {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

/// GET /api/dashboard/profile
///
/// # Errors
///
/// 401 if the account no longer exists.
pub async fn profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<ApiOk<User>, AppError> {
    let user = UserRepository::new(state.pool())
        .get_by_id(user.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))?;
    Ok(ApiOk(user))
}

/// Change the display name. Email and role are not editable here.
///
/// PUT /api/dashboard/profile
///
/// # Errors
///
/// 400 for an empty or overlong name.
pub async fn update_profile(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Json(form): Json<ProfileUpdate>,
) -> Result<ApiOk<User>, AppError> {
    let name = validate_name(&form.name)?;
    let updated = UserRepository::new(state.pool())
        .update_name(user.id, &name)
        .await?;
    set_current_user(&session, &CurrentUser::from(&updated)).await?;
    Ok(ApiOk(updated))
}

/// PUT /api/dashboard/password
///
/// # Errors
///
/// 401 if the current password is wrong, 400 if the new one is weak.
pub async fn change_password(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Json(form): Json<PasswordChange>,
) -> Result<ApiOk<()>, AppError> {
    AuthService::new(state.pool())
        .change_password(user.id, &form.current_password, &form.new_password)
        .await
        .inspect_err(|e| tracing::warn!(user_id = %user.id, "Password change failed: {e}"))?;

    // Other sessions keep their cookie; at least this one gets a new ID.
    session.cycle_id().await?;
    tracing::info!(user_id = %user.id, "Password changed");
    Ok(ApiOk(()))
}

/// GET /api/dashboard/addresses
///
/// # Errors
///
/// 500 on database failure.
pub async fn addresses(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<ApiOk<Vec<Address>>, AppError> {
    let list = AddressRepository::new(state.pool()).list(user.id).await?;
    Ok(ApiOk(list))
}

/// POST /api/dashboard/addresses
///
/// # Errors
///
/// 400 if a required field is missing.
pub async fn create_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(input): Json<AddressInput>,
) -> Result<impl IntoResponse, AppError> {
    let input = normalize_address(input)?;
    let address = AddressRepository::new(state.pool())
        .create(user.id, &input)
        .await?;
    Ok((StatusCode::CREATED, ApiOk(address)))
}

/// PUT /api/dashboard/addresses/{id}
///
/// # Errors
///
/// 404 if the address belongs to someone else.
pub async fn update_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<AddressId>,
    Json(input): Json<AddressInput>,
) -> Result<ApiOk<Address>, AppError> {
    let input = normalize_address(input)?;
    let address = AddressRepository::new(state.pool())
        .update(user.id, id, &input)
        .await
        .map_err(not_found("Address not found"))?;
    Ok(ApiOk(address))
}

/// DELETE /api/dashboard/addresses/{id}
///
/// # Errors
///
/// 404 if the address belongs to someone else.
pub async fn delete_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<AddressId>,
) -> Result<StatusCode, AppError> {
    AddressRepository::new(state.pool())
        .delete(user.id, id)
        .await
        .map_err(not_found("Address not found"))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Saved products that are still on sale, in the order they were saved.
///
/// GET /api/dashboard/wishlist
///
/// # Errors
///
/// 500 on database failure.
pub async fn wishlist(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<ApiOk<Vec<Product>>, AppError> {
    let ids = WishlistRepository::new(state.pool())
        .product_ids(user.id)
        .await?;
    let mut products = ProductRepository::new(state.pool())
        .get_active_many(&ids)
        .await?;
    let saved = ids.iter().filter_map(|id| products.remove(id)).collect();
    Ok(ApiOk(saved))
}

/// PUT /api/dashboard/wishlist/{product_id}
///
/// # Errors
///
/// 404 if the product doesn't exist or is not on sale.
pub async fn add_to_wishlist(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
) -> Result<StatusCode, AppError> {
    WishlistRepository::new(state.pool())
        .add(user.id, product_id)
        .await
        .map_err(not_found("Product not found"))?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/dashboard/wishlist/{product_id}
///
/// # Errors
///
/// 404 if the product wasn't saved.
pub async fn remove_from_wishlist(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
) -> Result<StatusCode, AppError> {
    let removed = WishlistRepository::new(state.pool())
        .remove(user.id, product_id)
        .await?;
    if !removed {
        return Err(AppError::NotFound("Product is not in your wishlist".into()));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/dashboard/orders
///
/// # Errors
///
/// 500 on database failure.
pub async fn orders(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<ApiOk<Vec<Order>>, AppError> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(ApiOk(orders))
}

/// Cancel one of the caller's orders. Only pending orders can be cancelled
/// by the customer; stock and coupon usage are returned.
///
/// POST /api/dashboard/orders/{id}/cancel
///
/// # Errors
///
/// - 404 if the order belongs to someone else
/// - 409 if the order is no longer pending
pub async fn cancel_order(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<ApiOk<Order>, AppError> {
    let order = OrderRepository::new(state.pool())
        .change_status(
            id,
            StatusChange {
                next: OrderStatus::Cancelled,
                owner: Some(user.id),
                only_from: Some(OrderStatus::Pending),
            },
        )
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AppError::NotFound("Order not found".into()),
            RepositoryError::Conflict(_) => {
                AppError::Conflict("Only pending orders can be cancelled".into())
            }
            other => other.into(),
        })?;

    tracing::info!(order_id = %order.id, user_id = %user.id, "Order cancelled by customer");
    Ok(ApiOk(order))
}

fn normalize_address(input: AddressInput) -> Result<AddressInput, AppError> {
    input
        .normalized()
        .map_err(|field| AppError::BadRequest(format!("Invalid address: {field}")))
}
