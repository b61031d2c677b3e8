//! Product repository.
//!
//! Product rows and their options are loaded separately and joined in Rust
//! through [`ProductOptions::from_rows`], so callers only ever see the
//! normalized shape.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use animart_core::catalog::{ColorOption, LegacyVariant, ProductOptions, SizeStock, StockKey};
use animart_core::{CategoryId, PrintPosition, ProductId, VariantId};

use super::users::escape_like;
use super::{Page, RepositoryError};
use crate::models::catalog::{CategoryRef, OptionsInput, Product, ProductInput, ProductSummary};

const PRODUCT_COLUMNS: &str = r"
    p.id, p.name, p.slug, p.description, p.base_price, p.print_position,
    p.images, p.is_active, p.is_featured, p.use_new_format, p.created_at, p.updated_at,
    c.id AS category_id, c.name AS category_name, c.slug AS category_slug
";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    slug: String,
    description: String,
    base_price: Decimal,
    print_position: PrintPosition,
    images: Vec<String>,
    is_active: bool,
    is_featured: bool,
    use_new_format: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    category_id: Option<CategoryId>,
    category_name: Option<String>,
    category_slug: Option<String>,
}

impl ProductRow {
    fn category(&self) -> Option<CategoryRef> {
        Some(CategoryRef {
            id: self.category_id?,
            name: self.category_name.clone()?,
            slug: self.category_slug.clone()?,
        })
    }

    fn into_product(self, options: ProductOptions) -> Product {
        let category = self.category();
        Product {
            id: self.id,
            name: self.name,
            slug: self.slug,
            description: self.description,
            base_price: self.base_price,
            print_position: self.print_position,
            category,
            images: self.images,
            is_active: self.is_active,
            is_featured: self.is_featured,
            options,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn into_summary(self, options: &ProductOptions) -> ProductSummary {
        ProductSummary {
            id: self.id,
            name: self.name,
            slug: self.slug,
            base_price: self.base_price,
            print_position: self.print_position,
            images: self.images,
            is_active: self.is_active,
            is_featured: self.is_featured,
            category_slug: self.category_slug,
            category_name: self.category_name,
            total_stock: options.total_stock(),
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct VariantRow {
    id: VariantId,
    product_id: ProductId,
    color: String,
    size: String,
    price: Decimal,
    stock: i32,
}

#[derive(sqlx::FromRow)]
struct ColorRow {
    product_id: ProductId,
    name: String,
    hex: Option<String>,
    images: Vec<String>,
}

#[derive(sqlx::FromRow)]
struct SizeRow {
    product_id: ProductId,
    size: String,
    stock: i32,
}

/// Sort order for product listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
}

impl ProductSort {
    const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => " ORDER BY p.created_at DESC, p.id DESC",
            Self::PriceAsc => " ORDER BY p.base_price ASC, p.id",
            Self::PriceDesc => " ORDER BY p.base_price DESC, p.id",
            Self::Name => " ORDER BY p.name ASC, p.id",
        }
    }
}

/// Filters for product listings.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category_slug: Option<String>,
    pub featured: Option<bool>,
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    /// Include inactive products (admin only).
    pub include_inactive: bool,
    pub sort: ProductSort,
}

impl ProductFilter {
    fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE TRUE");
        if !self.include_inactive {
            qb.push(" AND p.is_active");
        }
        if let Some(slug) = &self.category_slug {
            qb.push(" AND c.slug = ").push_bind(slug.clone());
        }
        if let Some(featured) = self.featured {
            qb.push(" AND p.is_featured = ").push_bind(featured);
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", escape_like(search));
            qb.push(" AND (p.name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR p.description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(min) = self.min_price {
            qb.push(" AND p.base_price >= ").push_bind(min);
        }
        if let Some(max) = self.max_price {
            qb.push(" AND p.base_price <= ").push_bind(max);
        }
    }
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products matching `filter`, returning the page and the total count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        page: Page,
    ) -> Result<(Vec<ProductSummary>, i64), RepositoryError> {
        let mut count_qb = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM shop.product p LEFT JOIN shop.category c ON c.id = p.category_id",
        );
        filter.push_where(&mut count_qb);
        let total: i64 = count_qb.build_query_scalar().fetch_one(self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product p LEFT JOIN shop.category c ON c.id = p.category_id"
        ));
        filter.push_where(&mut qb);
        qb.push(filter.sort.order_by());
        qb.push(" LIMIT ").push_bind(page.limit());
        qb.push(" OFFSET ").push_bind(page.offset());

        let rows: Vec<ProductRow> = qb.build_query_as().fetch_all(self.pool).await?;
        let mut options = self.load_options(&rows).await?;

        let summaries = rows
            .into_iter()
            .map(|r| {
                let opts = options.remove(&r.id).unwrap_or_default();
                r.into_summary(&opts)
            })
            .collect();
        Ok((summaries, total))
    }

    /// Get a product by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_by_slug(
        &self,
        slug: &str,
        include_inactive: bool,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM shop.product p LEFT JOIN shop.category c ON c.id = p.category_id
            WHERE p.slug = $1 AND (p.is_active OR $2)
            "
        ))
        .bind(slug)
        .bind(include_inactive)
        .fetch_optional(self.pool)
        .await?;

        self.hydrate_one(row).await
    }

    /// Get a product by ID, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM shop.product p LEFT JOIN shop.category c ON c.id = p.category_id
            WHERE p.id = $1
            "
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        self.hydrate_one(row).await
    }

    /// Load active products by ID, with options. Unknown or inactive IDs are
    /// simply absent from the result.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_active_many(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM shop.product p LEFT JOIN shop.category c ON c.id = p.category_id
            WHERE p.id = ANY($1) AND p.is_active
            "
        ))
        .bind(raw_ids(ids))
        .fetch_all(self.pool)
        .await?;

        let mut options = self.load_options(&rows).await?;
        Ok(rows
            .into_iter()
            .map(|r| {
                let opts = options.remove(&r.id).unwrap_or_default();
                (r.id, r.into_product(opts))
            })
            .collect())
    }

    /// Trusted base prices of the active products among `ids`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn base_prices(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Decimal>, RepositoryError> {
        let rows: Vec<(ProductId, Decimal)> = sqlx::query_as(
            "SELECT id, base_price FROM shop.product WHERE id = ANY($1) AND is_active",
        )
        .bind(raw_ids(ids))
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    /// Create a product together with its options.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id: ProductId = sqlx::query_scalar(
            r"
            INSERT INTO shop.product
                (name, slug, description, base_price, print_position, category_id,
                 images, is_active, is_featured, use_new_format)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            ",
        )
        .bind(&input.name)
        .bind(input.slug.as_deref().unwrap_or_default())
        .bind(&input.description)
        .bind(input.base_price)
        .bind(input.print_position)
        .bind(input.category_id)
        .bind(&input.images)
        .bind(input.is_active)
        .bind(input.is_featured)
        .bind(input.options.uses_new_format())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "product slug already exists"))?;

        insert_options(&mut tx, id, &input.options).await?;
        tx.commit().await?;

        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Replace a product's fields and options.
    ///
    /// Existing option rows are dropped and rewritten, so legacy variant IDs
    /// change. Past orders keep their own snapshot of color and size.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    /// Returns `RepositoryError::Conflict` if the new slug is taken.
    pub async fn update(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r"
            UPDATE shop.product
            SET name = $2, slug = $3, description = $4, base_price = $5,
                print_position = $6, category_id = $7, images = $8,
                is_active = $9, is_featured = $10, use_new_format = $11
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(&input.name)
        .bind(input.slug.as_deref().unwrap_or_default())
        .bind(&input.description)
        .bind(input.base_price)
        .bind(input.print_position)
        .bind(input.category_id)
        .bind(&input.images)
        .bind(input.is_active)
        .bind(input.is_featured)
        .bind(input.options.uses_new_format())
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "product slug already exists"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        for table in [
            "shop.product_variant",
            "shop.product_color",
            "shop.product_size_stock",
        ] {
            sqlx::query(&format!("DELETE FROM {table} WHERE product_id = $1"))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        insert_options(&mut tx, id, &input.options).await?;
        tx.commit().await?;

        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.product WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Number of active products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_active(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM shop.product WHERE is_active")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    async fn hydrate_one(
        &self,
        row: Option<ProductRow>,
    ) -> Result<Option<Product>, RepositoryError> {
        let Some(row) = row else {
            return Ok(None);
        };
        let mut options = self.load_options(std::slice::from_ref(&row)).await?;
        let opts = options.remove(&row.id).unwrap_or_default();
        Ok(Some(row.into_product(opts)))
    }

    /// Load the options of every product in `rows`, three queries in total.
    async fn load_options(
        &self,
        rows: &[ProductRow],
    ) -> Result<HashMap<ProductId, ProductOptions>, RepositoryError> {
        if rows.is_empty() {
            return Ok(HashMap::new());
        }
        let ids: Vec<i32> = rows.iter().map(|r| r.id.as_i32()).collect();

        let variants = sqlx::query_as::<_, VariantRow>(
            r"
            SELECT id, product_id, color, size, price, stock
            FROM shop.product_variant WHERE product_id = ANY($1)
            ORDER BY product_id, id
            ",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let colors = sqlx::query_as::<_, ColorRow>(
            r"
            SELECT product_id, name, hex, images
            FROM shop.product_color WHERE product_id = ANY($1)
            ORDER BY product_id, position, id
            ",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let sizes = sqlx::query_as::<_, SizeRow>(
            r"
            SELECT product_id, size, stock
            FROM shop.product_size_stock WHERE product_id = ANY($1)
            ORDER BY product_id, position, size
            ",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let mut variants_by = group(variants, |v| v.product_id);
        let mut colors_by = group(colors, |c| c.product_id);
        let mut sizes_by = group(sizes, |s| s.product_id);

        Ok(rows
            .iter()
            .map(|r| {
                let variants = variants_by
                    .remove(&r.id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|v| LegacyVariant {
                        id: v.id,
                        color: v.color,
                        size: v.size,
                        price: v.price,
                        stock: v.stock,
                    })
                    .collect();
                let colors = colors_by
                    .remove(&r.id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|c| ColorOption {
                        name: c.name,
                        hex: c.hex,
                        images: c.images,
                    })
                    .collect();
                let sizes = sizes_by
                    .remove(&r.id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|s| SizeStock {
                        size: s.size,
                        stock: s.stock,
                    })
                    .collect();
                (
                    r.id,
                    ProductOptions::from_rows(r.use_new_format, variants, colors, sizes),
                )
            })
            .collect())
    }
}

async fn insert_options(
    conn: &mut PgConnection,
    product_id: ProductId,
    options: &OptionsInput,
) -> Result<(), RepositoryError> {
    match options {
        OptionsInput::Legacy { variants } => {
            for v in variants {
                sqlx::query(
                    r"
                    INSERT INTO shop.product_variant (product_id, color, size, price, stock)
                    VALUES ($1, $2, $3, $4, $5)
                    ",
                )
                .bind(product_id)
                .bind(v.color.trim())
                .bind(v.size.trim())
                .bind(v.price)
                .bind(v.stock)
                .execute(&mut *conn)
                .await?;
            }
        }
        OptionsInput::Decomposed { colors, sizes } => {
            for (position, c) in (0_i32..).zip(colors) {
                sqlx::query(
                    r"
                    INSERT INTO shop.product_color (product_id, name, hex, images, position)
                    VALUES ($1, $2, $3, $4, $5)
                    ",
                )
                .bind(product_id)
                .bind(c.name.trim())
                .bind(c.hex.as_deref())
                .bind(&c.images)
                .bind(position)
                .execute(&mut *conn)
                .await
                .map_err(|e| RepositoryError::unique_violation(e, "duplicate color"))?;
            }
            for (position, s) in (0_i32..).zip(sizes) {
                sqlx::query(
                    r"
                    INSERT INTO shop.product_size_stock (product_id, size, stock, position)
                    VALUES ($1, $2, $3, $4)
                    ",
                )
                .bind(product_id)
                .bind(s.size.trim())
                .bind(s.stock)
                .bind(position)
                .execute(&mut *conn)
                .await?;
            }
        }
    }
    Ok(())
}

/// Take `quantity` units from the row behind `key`.
///
/// Returns `false` without changing anything if there is not enough stock.
pub(crate) async fn take_stock(
    conn: &mut PgConnection,
    product_id: ProductId,
    key: &StockKey,
    quantity: i32,
) -> Result<bool, RepositoryError> {
    let result = match key {
        StockKey::Variant { id } => {
            sqlx::query(
                r"
                UPDATE shop.product_variant SET stock = stock - $3
                WHERE id = $1 AND product_id = $2 AND stock >= $3
                ",
            )
            .bind(id)
            .bind(product_id)
            .bind(quantity)
            .execute(&mut *conn)
            .await?
        }
        StockKey::Size { size } => {
            sqlx::query(
                r"
                UPDATE shop.product_size_stock SET stock = stock - $3
                WHERE product_id = $1 AND size = $2 AND stock >= $3
                ",
            )
            .bind(product_id)
            .bind(size)
            .bind(quantity)
            .execute(&mut *conn)
            .await?
        }
    };
    Ok(result.rows_affected() == 1)
}

/// Put `quantity` units back on the row behind `key`. Rows that no longer
/// exist are skipped.
pub(crate) async fn return_stock(
    conn: &mut PgConnection,
    product_id: ProductId,
    key: &StockKey,
    quantity: i32,
) -> Result<(), RepositoryError> {
    match key {
        StockKey::Variant { id } => {
            sqlx::query("UPDATE shop.product_variant SET stock = stock + $2 WHERE id = $1")
                .bind(id)
                .bind(quantity)
                .execute(&mut *conn)
                .await?;
        }
        StockKey::Size { size } => {
            sqlx::query(
                "UPDATE shop.product_size_stock SET stock = stock + $3 WHERE product_id = $1 AND size = $2",
            )
            .bind(product_id)
            .bind(size)
            .bind(quantity)
            .execute(&mut *conn)
            .await?;
        }
    }
    Ok(())
}

fn raw_ids(ids: &[ProductId]) -> Vec<i32> {
    ids.iter().map(|id| id.as_i32()).collect()
}

fn group<T>(items: Vec<T>, key: impl Fn(&T) -> ProductId) -> HashMap<ProductId, Vec<T>> {
    let mut map: HashMap<ProductId, Vec<T>> = HashMap::new();
    for item in items {
        map.entry(key(&item)).or_default().push(item);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_sql() {
        let filter = ProductFilter {
            category_slug: Some("hoodies".into()),
            search: Some(" naruto ".into()),
            max_price: Some(Decimal::new(60, 0)),
            sort: ProductSort::PriceAsc,
            ..ProductFilter::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM shop.product p");
        filter.push_where(&mut qb);
        qb.push(filter.sort.order_by());
        let sql = qb.sql();
        assert!(sql.contains("AND p.is_active"));
        assert!(sql.contains("AND c.slug = $1"));
        assert!(sql.contains("p.name ILIKE $2 OR p.description ILIKE $3"));
        assert!(sql.contains("p.base_price <= $4"));
        assert!(sql.ends_with("ORDER BY p.base_price ASC, p.id"));
    }

    #[test]
    fn test_admin_filter_includes_inactive() {
        let filter = ProductFilter {
            include_inactive: true,
            ..ProductFilter::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1");
        filter.push_where(&mut qb);
        assert!(!qb.sql().contains("is_active"));
    }

    #[test]
    fn test_sort_deserializes_snake_case() {
        let sort: ProductSort = serde_json::from_str("\"price_desc\"").unwrap_or_default();
        assert_eq!(sort, ProductSort::PriceDesc);
    }
}
