//! Public category routes.

use axum::extract::{Path, Query, State};
use serde::Serialize;

use crate::db::products::ProductFilter;
use crate::db::{CategoryRepository, ProductRepository};
use crate::error::AppError;
use crate::models::catalog::{Category, ProductSummary};
use crate::routes::{ApiOk, PageQuery, Paginated};
use crate::state::AppState;

/// A category with one page of its products.
#[derive(Debug, Serialize)]
pub struct CategoryPage {
    pub category: Category,
    pub products: Paginated<ProductSummary>,
}

/// All categories with active product counts.
///
/// GET /api/categories
///
/// # Errors
///
/// 500 on database failure.
pub async fn index(State(state): State<AppState>) -> Result<ApiOk<Vec<Category>>, AppError> {
    let categories = CategoryRepository::new(state.pool()).list().await?;
    Ok(ApiOk(categories))
}

/// One category and its products.
///
/// GET /api/categories/{slug}
///
/// # Errors
///
/// 404 if the category doesn't exist.
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<ApiOk<CategoryPage>, AppError> {
    let category = CategoryRepository::new(state.pool())
        .get_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound("Category not found".into()))?;

    let page = query.page();
    let filter = ProductFilter {
        category_slug: Some(category.slug.clone()),
        ..ProductFilter::default()
    };
    let (items, total) = ProductRepository::new(state.pool())
        .list(&filter, page)
        .await?;

    Ok(ApiOk(CategoryPage {
        category,
        products: Paginated::new(items, total, page),
    }))
}
