//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! # Auth                                   (auth limiter on register/login)
//! POST /api/auth/register              - Create an account and sign in
//! POST /api/auth/login                 - Sign in
//! POST /api/auth/logout                - Sign out
//! GET  /api/auth/me                    - Current account
//!
//! # Catalog
//! GET  /api/products                   - Product listing (products limiter)
//! GET  /api/products/search?q=         - Search (search limiter)
//! GET  /api/products/{slug}            - Product detail with normalized options
//! GET  /api/categories                 - Categories with product counts
//! GET  /api/categories/{slug}          - Category with its products
//!
//! # Checkout (requires auth)
//! POST /api/coupons/validate           - Coupon preview
//! POST /api/orders                     - Place an order (orders limiter)
//! GET  /api/orders                     - Caller's orders
//! GET  /api/orders/{id}                - Caller's order
//!
//! # Contact
//! POST /api/contact                    - Contact form (contact limiter)
//!
//! # Dashboard (requires auth)
//! GET|PUT     /api/dashboard/profile
//! PUT         /api/dashboard/password
//! GET|POST    /api/dashboard/addresses
//! PUT|DELETE  /api/dashboard/addresses/{id}
//! GET         /api/dashboard/wishlist
//! PUT|DELETE  /api/dashboard/wishlist/{product_id}
//! GET         /api/dashboard/orders
//! POST        /api/dashboard/orders/{id}/cancel
//!
//! # Admin (requires admin)
//! GET         /api/admin/stats
//! GET|POST    /api/admin/products
//! GET|PUT|DELETE /api/admin/products/{id}
//! GET|POST    /api/admin/categories
//! PUT|DELETE  /api/admin/categories/{id}
//! GET|POST    /api/admin/coupons
//! PUT|DELETE  /api/admin/coupons/{id}
//! GET         /api/admin/orders
//! GET         /api/admin/orders/{id}
//! PUT         /api/admin/orders/{id}/status
//! GET         /api/admin/customers
//! GET         /api/admin/customers/{id}
//! PUT         /api/admin/customers/{id}/block
//! PUT         /api/admin/customers/{id}/role
//! GET         /api/admin/messages
//! PUT|DELETE  /api/admin/messages/{id}
//! ```
//!
//! Every route group not listed with a specific limiter uses the general one.

pub mod api;

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::db::{Page, RepositoryError};
use crate::error::AppError;
use crate::state::AppState;

/// Create all routes for the storefront.
pub fn routes(state: &AppState) -> axum::Router<AppState> {
    axum::Router::new().nest("/api", api::routes(state))
}

/// Successful response body: `{ "success": true, "data": ... }`.
#[derive(Debug)]
pub struct ApiOk<T>(pub T);

#[derive(Serialize)]
struct Envelope<T> {
    success: bool,
    data: T,
}

impl<T: Serialize> IntoResponse for ApiOk<T> {
    fn into_response(self) -> Response {
        Json(Envelope {
            success: true,
            data: self.0,
        })
        .into_response()
    }
}

/// `?page=&per_page=` query parameters.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl PageQuery {
    #[must_use]
    pub fn page(self) -> Page {
        Page::new(self.page, self.per_page)
    }
}

/// One page of a listing plus the numbers needed to paginate it.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl<T> Paginated<T> {
    #[must_use]
    pub fn new(items: Vec<T>, total: i64, page: Page) -> Self {
        Self {
            items,
            total,
            page: page.page,
            per_page: page.per_page,
            total_pages: (total + page.per_page - 1) / page.per_page,
        }
    }
}

/// Map a repository `NotFound` to a 404 carrying `message`.
pub(crate) fn not_found(message: &'static str) -> impl Fn(RepositoryError) -> AppError {
    move |e| match e {
        RepositoryError::NotFound => AppError::NotFound(message.into()),
        other => other.into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_paginated_total_pages() {
        let page = Page::new(Some(2), Some(20));
        assert_eq!(Paginated::new(Vec::<()>::new(), 41, page).total_pages, 3);
        assert_eq!(Paginated::new(Vec::<()>::new(), 40, page).total_pages, 2);
        assert_eq!(Paginated::new(Vec::<()>::new(), 0, page).total_pages, 0);
    }

    #[tokio::test]
    async fn test_api_ok_envelope() {
        let response = ApiOk(serde_json::json!({ "id": 1 })).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["id"], 1);
    }

    #[test]
    fn test_not_found_keeps_other_errors() {
        let mapped = not_found("Coupon not found")(RepositoryError::NotFound);
        assert!(matches!(mapped, AppError::NotFound(m) if m == "Coupon not found"));

        let mapped = not_found("Coupon not found")(RepositoryError::Conflict("taken".into()));
        assert!(matches!(mapped, AppError::Database(RepositoryError::Conflict(_))));
    }
}
