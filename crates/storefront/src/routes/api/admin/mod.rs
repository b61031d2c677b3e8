//! Admin back-office API.
//!
//! Every handler takes [`RequireAdmin`], which trusts the session's role
//! claim and falls back to the database when the claim doesn't permit access.
//!
//! [`RequireAdmin`]: crate::middleware::RequireAdmin

pub mod catalog;
pub mod coupons;
pub mod customers;
pub mod messages;
pub mod orders;

use axum::{
    Router,
    extract::State,
    routing::{get, put},
};
use serde::Serialize;
use tracing::instrument;

use animart_core::UserRole;

use crate::db::orders::OrderStats;
use crate::db::{MessageRepository, OrderRepository, ProductRepository, UserRepository};
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::routes::ApiOk;
use crate::state::AppState;

/// Admin routes, nested under `/api/admin`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(stats))
        .route("/products", get(catalog::products).post(catalog::create_product))
        .route(
            "/products/{id}",
            get(catalog::product)
                .put(catalog::update_product)
                .delete(catalog::delete_product),
        )
        .route(
            "/categories",
            get(catalog::categories).post(catalog::create_category),
        )
        .route(
            "/categories/{id}",
            put(catalog::update_category).delete(catalog::delete_category),
        )
        .route("/coupons", get(coupons::index).post(coupons::create))
        .route(
            "/coupons/{id}",
            put(coupons::update).delete(coupons::delete),
        )
        .route("/orders", get(orders::index))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/status", put(orders::update_status))
        .route("/customers", get(customers::index))
        .route("/customers/{id}", get(customers::show))
        .route("/customers/{id}/block", put(customers::set_blocked))
        .route("/customers/{id}/role", put(customers::set_role))
        .route("/messages", get(messages::index))
        .route(
            "/messages/{id}",
            put(messages::mark).delete(messages::delete),
        )
}

/// Dashboard headline numbers.
#[derive(Debug, Serialize)]
pub struct Stats {
    #[serde(flatten)]
    pub orders: OrderStats,
    pub active_products: i64,
    pub customers: i64,
    pub unread_messages: i64,
}

/// GET /api/admin/stats
///
/// # Errors
///
/// 500 on database failure.
#[instrument(skip_all)]
pub async fn stats(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<ApiOk<Stats>, AppError> {
    let pool = state.pool();
    let order_repo = OrderRepository::new(pool);
    let product_repo = ProductRepository::new(pool);
    let user_repo = UserRepository::new(pool);
    let message_repo = MessageRepository::new(pool);
    let (orders, active_products, customers, unread_messages) = tokio::try_join!(
        order_repo.stats(),
        product_repo.count_active(),
        user_repo.count_by_role(UserRole::Customer),
        message_repo.count_unread(),
    )?;

    Ok(ApiOk(Stats {
        orders,
        active_products,
        customers,
        unread_messages,
    }))
}
