//! Product and category management.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::instrument;

use animart_core::{CategoryId, ProductId};

use crate::db::products::{ProductFilter, ProductSort};
use crate::db::{CategoryRepository, Page, ProductRepository};
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::catalog::{Category, CategoryInput, Product, ProductInput, ProductSummary};
use crate::routes::{ApiOk, Paginated, not_found};
use crate::state::AppState;

/// Admin product listing filters. Inactive products are included.
#[derive(Debug, Default, Deserialize)]
pub struct ProductListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub search: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub sort: ProductSort,
}

/// GET /api/admin/products
///
/// # Errors
///
/// 500 on database failure.
pub async fn products(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<ApiOk<Paginated<ProductSummary>>, AppError> {
    let page = Page::new(query.page, query.per_page);
    let filter = ProductFilter {
        category_slug: query.category,
        search: query.search,
        include_inactive: true,
        sort: query.sort,
        ..ProductFilter::default()
    };
    let (items, total) = ProductRepository::new(state.pool())
        .list(&filter, page)
        .await?;
    Ok(ApiOk(Paginated::new(items, total, page)))
}

/// GET /api/admin/products/{id}
///
/// # Errors
///
/// 404 if the product doesn't exist.
pub async fn product(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<ApiOk<Product>, AppError> {
    let product = ProductRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".into()))?;
    Ok(ApiOk(product))
}

/// POST /api/admin/products
///
/// # Errors
///
/// 400 for invalid input, 409 if the slug is taken.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create_product(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<ProductInput>,
) -> Result<impl IntoResponse, AppError> {
    let input = input.normalized().map_err(AppError::BadRequest)?;
    let product = ProductRepository::new(state.pool()).create(&input).await?;
    tracing::info!(product_id = %product.id, slug = %product.slug, "Product created");
    Ok((StatusCode::CREATED, ApiOk(product)))
}

/// Replace a product and its options.
///
/// PUT /api/admin/products/{id}
///
/// # Errors
///
/// 400 for invalid input, 404 if missing, 409 if the slug is taken.
#[instrument(skip_all, fields(admin_id = %admin.id, product_id = %id))]
pub async fn update_product(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(input): Json<ProductInput>,
) -> Result<ApiOk<Product>, AppError> {
    let input = input.normalized().map_err(AppError::BadRequest)?;
    let product = ProductRepository::new(state.pool())
        .update(id, &input)
        .await
        .map_err(not_found("Product not found"))?;
    tracing::info!("Product updated");
    Ok(ApiOk(product))
}

/// DELETE /api/admin/products/{id}
///
/// # Errors
///
/// 404 if the product doesn't exist.
#[instrument(skip_all, fields(admin_id = %admin.id, product_id = %id))]
pub async fn delete_product(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<StatusCode, AppError> {
    ProductRepository::new(state.pool())
        .delete(id)
        .await
        .map_err(not_found("Product not found"))?;
    tracing::info!("Product deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/admin/categories
///
/// # Errors
///
/// 500 on database failure.
pub async fn categories(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<ApiOk<Vec<Category>>, AppError> {
    let categories = CategoryRepository::new(state.pool()).list().await?;
    Ok(ApiOk(categories))
}

/// POST /api/admin/categories
///
/// # Errors
///
/// 400 for invalid input, 409 if the slug is taken.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create_category(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<CategoryInput>,
) -> Result<impl IntoResponse, AppError> {
    let input = input.normalized().map_err(AppError::BadRequest)?;
    let category = CategoryRepository::new(state.pool()).create(&input).await?;
    tracing::info!(category_id = %category.id, slug = %category.slug, "Category created");
    Ok((StatusCode::CREATED, ApiOk(category)))
}

/// PUT /api/admin/categories/{id}
///
/// # Errors
///
/// 400 for invalid input, 404 if missing, 409 if the slug is taken.
#[instrument(skip_all, fields(admin_id = %admin.id, category_id = %id))]
pub async fn update_category(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
    Json(input): Json<CategoryInput>,
) -> Result<ApiOk<Category>, AppError> {
    let input = input.normalized().map_err(AppError::BadRequest)?;
    let category = CategoryRepository::new(state.pool())
        .update(id, &input)
        .await
        .map_err(not_found("Category not found"))?;
    Ok(ApiOk(category))
}

/// Delete a category. Its products stay, uncategorized.
///
/// DELETE /api/admin/categories/{id}
///
/// # Errors
///
/// 404 if the category doesn't exist.
#[instrument(skip_all, fields(admin_id = %admin.id, category_id = %id))]
pub async fn delete_category(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
) -> Result<StatusCode, AppError> {
    CategoryRepository::new(state.pool())
        .delete(id)
        .await
        .map_err(not_found("Category not found"))?;
    tracing::info!("Category deleted");
    Ok(StatusCode::NO_CONTENT)
}
