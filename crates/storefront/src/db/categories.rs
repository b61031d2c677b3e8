//! Category repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use animart_core::CategoryId;

use super::RepositoryError;
use crate::models::catalog::{Category, CategoryInput};

const CATEGORY_WITH_COUNT: &str = r"
    SELECT c.id, c.name, c.slug, c.description, c.image_url, c.created_at, c.updated_at,
           COUNT(p.id) FILTER (WHERE p.is_active) AS product_count
    FROM shop.category c
    LEFT JOIN shop.product p ON p.category_id = c.id
";

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: CategoryId,
    name: String,
    slug: String,
    description: Option<String>,
    image_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[sqlx(default)]
    product_count: Option<i64>,
}

impl From<CategoryRow> for Category {
    fn from(r: CategoryRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            slug: r.slug,
            description: r.description,
            image_url: r.image_url,
            product_count: r.product_count,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Repository for category database operations.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    /// Create a new category repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All categories by name, each with its active product count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(&format!(
            "{CATEGORY_WITH_COUNT} GROUP BY c.id ORDER BY c.name"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    /// Get a category by slug, with its active product count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "{CATEGORY_WITH_COUNT} WHERE c.slug = $1 GROUP BY c.id"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Category::from))
    }

    /// Create a category. `input` must already be normalized.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, input: &CategoryInput) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r"
            INSERT INTO shop.category (name, slug, description, image_url)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, slug, description, image_url, created_at, updated_at
            ",
        )
        .bind(&input.name)
        .bind(input.slug.as_deref().unwrap_or_default())
        .bind(input.description.as_deref())
        .bind(input.image_url.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "category slug already exists"))?;
        Ok(row.into())
    }

    /// Replace a category's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category doesn't exist.
    /// Returns `RepositoryError::Conflict` if the new slug is taken.
    pub async fn update(
        &self,
        id: CategoryId,
        input: &CategoryInput,
    ) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r"
            UPDATE shop.category
            SET name = $2, slug = $3, description = $4, image_url = $5
            WHERE id = $1
            RETURNING id, name, slug, description, image_url, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(&input.name)
        .bind(input.slug.as_deref().unwrap_or_default())
        .bind(input.description.as_deref())
        .bind(input.image_url.as_deref())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "category slug already exists"))?
        .ok_or(RepositoryError::NotFound)?;
        Ok(row.into())
    }

    /// Delete a category. Its products become uncategorized.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category doesn't exist.
    pub async fn delete(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.category WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
