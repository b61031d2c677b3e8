//! JSON API under `/api`.

pub mod admin;
pub mod auth;
pub mod categories;
pub mod contact;
pub mod coupons;
pub mod dashboard;
pub mod orders;
pub mod products;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::middleware::{LimitClass, rate_limit};
use crate::state::AppState;

/// Build the `/api` router with each group behind its rate limiter.
pub fn routes(state: &AppState) -> Router<AppState> {
    let limit = |class: LimitClass| middleware::from_fn_with_state(state.limiter_for(class), rate_limit);

    let auth_strict = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route_layer(limit(LimitClass::Auth));
    let auth_session = Router::new()
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route_layer(limit(LimitClass::General));

    let catalog = Router::new()
        .route("/products", get(products::index))
        .route("/products/{slug}", get(products::show))
        .route("/categories", get(categories::index))
        .route("/categories/{slug}", get(categories::show))
        .route_layer(limit(LimitClass::Products));
    let search = Router::new()
        .route("/products/search", get(products::search))
        .route_layer(limit(LimitClass::Search));

    let place_order = Router::new()
        .route("/orders", post(orders::create))
        .route_layer(limit(LimitClass::Orders));
    let checkout = Router::new()
        .route("/orders", get(orders::index))
        .route("/orders/{id}", get(orders::show))
        .route("/coupons/validate", post(coupons::validate))
        .route_layer(limit(LimitClass::General));

    let contact = Router::new()
        .route("/contact", post(contact::submit))
        .route_layer(limit(LimitClass::Contact));

    Router::new()
        .nest("/auth", auth_strict.merge(auth_session))
        .merge(catalog)
        .merge(search)
        .merge(place_order)
        .merge(checkout)
        .merge(contact)
        .nest(
            "/dashboard",
            dashboard::routes().route_layer(limit(LimitClass::General)),
        )
        .nest(
            "/admin",
            admin::routes().route_layer(limit(LimitClass::General)),
        )
}
