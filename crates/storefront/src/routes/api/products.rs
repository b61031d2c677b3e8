//! Public catalog routes.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::db::{Page, ProductRepository, WishlistRepository};
use crate::db::products::{ProductFilter, ProductSort};
use crate::error::AppError;
use crate::middleware::OptionalAuth;
use crate::routes::{ApiOk, Paginated};
use crate::state::AppState;

/// Longest accepted search query.
const MAX_SEARCH_LEN: usize = 100;

/// Listing filters.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub category: Option<String>,
    pub featured: Option<bool>,
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    #[serde(default)]
    pub sort: ProductSort,
}

/// Search parameters.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// List active products.
///
/// GET /api/products
///
/// # Errors
///
/// 400 for a negative or inverted price range.
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    if query.min_price.is_some_and(|p| p.is_sign_negative())
        || query.max_price.is_some_and(|p| p.is_sign_negative())
    {
        return Err(AppError::BadRequest("Prices cannot be negative".into()));
    }
    if let (Some(min), Some(max)) = (query.min_price, query.max_price)
        && min > max
    {
        return Err(AppError::BadRequest(
            "min_price cannot exceed max_price".into(),
        ));
    }

    let page = Page::new(query.page, query.per_page);
    let filter = ProductFilter {
        category_slug: query.category,
        featured: query.featured,
        search: query.search,
        min_price: query.min_price,
        max_price: query.max_price,
        include_inactive: false,
        sort: query.sort,
    };
    let (items, total) = ProductRepository::new(state.pool())
        .list(&filter, page)
        .await?;

    Ok(ApiOk(Paginated::new(items, total, page)))
}

/// Search active products by name and description.
///
/// GET /api/products/search?q=
///
/// # Errors
///
/// 400 if the query is blank or too long.
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, AppError> {
    let q = query.q.trim();
    if q.is_empty() {
        return Err(AppError::BadRequest("Search query is required".into()));
    }
    if q.chars().count() > MAX_SEARCH_LEN {
        return Err(AppError::BadRequest("Search query is too long".into()));
    }

    let page = Page::new(query.page, query.per_page);
    let filter = ProductFilter {
        search: Some(q.to_owned()),
        sort: ProductSort::Name,
        ..ProductFilter::default()
    };
    let (items, total) = ProductRepository::new(state.pool())
        .list(&filter, page)
        .await?;

    Ok(ApiOk(Paginated::new(items, total, page)))
}

/// Product detail with colors, sizes and purchasable offers. Signed-in
/// shoppers also get `in_wishlist`.
///
/// GET /api/products/{slug}
///
/// # Errors
///
/// 404 if no active product has this slug.
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let product = ProductRepository::new(state.pool())
        .get_by_slug(&slug, false)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".into()))?;

    let mut detail = product.detail();
    if let Some(user) = user {
        detail.in_wishlist = Some(
            WishlistRepository::new(state.pool())
                .contains(user.id, product.id)
                .await?,
        );
    }

    Ok(ApiOk(detail).into_response())
}
