//! Wishlist repository.

use sqlx::PgPool;

use animart_core::{ProductId, UserId};

use super::RepositoryError;

/// Repository for saved products.
pub struct WishlistRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> WishlistRepository<'a> {
    /// Create a new wishlist repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// IDs of the active products a user saved, most recent first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn product_ids(&self, user_id: UserId) -> Result<Vec<ProductId>, RepositoryError> {
        let ids = sqlx::query_scalar(
            r"
            SELECT w.product_id FROM shop.wishlist_item w
            JOIN shop.product p ON p.id = w.product_id
            WHERE w.user_id = $1 AND p.is_active
            ORDER BY w.created_at DESC
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(ids)
    }

    /// Whether a user saved a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn contains(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let saved = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM shop.wishlist_item WHERE user_id = $1 AND product_id = $2)",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;
        Ok(saved)
    }

    /// Save a product. Saving it twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist or is inactive.
    pub async fn add(&self, user_id: UserId, product_id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            INSERT INTO shop.wishlist_item (user_id, product_id)
            SELECT $1, id FROM shop.product WHERE id = $2 AND is_active
            ON CONFLICT (user_id, product_id) DO NOTHING
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM shop.product WHERE id = $1 AND is_active)",
            )
            .bind(product_id)
            .fetch_one(self.pool)
            .await?;
            if !exists {
                return Err(RepositoryError::NotFound);
            }
        }
        Ok(())
    }

    /// Remove a product. Returns whether it was saved.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM shop.wishlist_item WHERE user_id = $1 AND product_id = $2")
                .bind(user_id)
                .bind(product_id)
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
