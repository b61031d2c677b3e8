//! Seed the catalog from a YAML file.
//!
//! Entries whose slug or code already exists are skipped, so a seed file can
//! be applied more than once. Products may only name categories defined in
//! the same file.
//!
//! ```yaml
//! categories:
//!   - name: Hoodies
//!     description: Heavyweight hoodies with front and back prints
//! products:
//!   - name: Straw Hat Crew Hoodie
//!     category: hoodies
//!     base_price: "59.99"
//!     print_position: BOTH
//!     options:
//!       format: decomposed
//!       colors: [{ name: Black, hex: "#111111" }]
//!       sizes: [{ size: M, stock: 20 }, { size: L, stock: 15 }]
//! coupons:
//!   - code: LAUNCH10
//!     discount_type: PERCENTAGE
//!     discount_value: "10"
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use animart_core::CategoryId;
use animart_core::coupon::validate_definition;
use animart_storefront::db::coupons::CouponInput;
use animart_storefront::db::{
    CategoryRepository, CouponRepository, ProductRepository, RepositoryError,
};
use animart_storefront::models::catalog::{CategoryInput, ProductInput};

use super::{CliError, connect};

/// Top-level seed document.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SeedFile {
    pub categories: Vec<CategoryInput>,
    pub products: Vec<SeedProduct>,
    pub coupons: Vec<CouponInput>,
}

/// A product that names its category by slug.
#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(flatten)]
    pub product: ProductInput,
}

/// What a seed run did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub inserted: usize,
    pub skipped: usize,
}

impl SeedFile {
    /// Parse and validate a seed document without touching the database.
    ///
    /// # Errors
    ///
    /// Returns `CliError::Yaml` for malformed YAML and
    /// `CliError::InvalidSeed` for the first entry that fails validation.
    pub fn parse(content: &str) -> Result<Self, CliError> {
        let file: Self = serde_yaml::from_str(content)?;
        file.normalized()
    }

    fn normalized(self) -> Result<Self, CliError> {
        let categories = self
            .categories
            .into_iter()
            .map(|c| {
                let entry = c.name.clone();
                c.normalized()
                    .map_err(|reason| CliError::InvalidSeed { entry, reason })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let known: Vec<&str> = categories
            .iter()
            .filter_map(|c| c.slug.as_deref())
            .collect();
        let mut products = Vec::with_capacity(self.products.len());
        for p in self.products {
            let entry = p.product.name.clone();
            if let Some(slug) = p.category.as_deref()
                && !known.contains(&slug)
            {
                return Err(CliError::InvalidSeed {
                    entry,
                    reason: format!("unknown category '{slug}'"),
                });
            }
            let product = p
                .product
                .normalized()
                .map_err(|reason| CliError::InvalidSeed { entry, reason })?;
            products.push(SeedProduct {
                category: p.category,
                product,
            });
        }

        for c in &self.coupons {
            validate_definition(
                &c.code,
                c.discount_type,
                c.discount_value,
                c.min_order_amount,
                c.max_uses,
            )
            .map_err(|e| CliError::InvalidSeed {
                entry: c.code.clone(),
                reason: e.to_string(),
            })?;
        }

        Ok(Self {
            categories,
            products,
            coupons: self.coupons,
        })
    }
}

/// Apply a seed file.
///
/// # Errors
///
/// Returns an error if the file is unreadable or invalid, or a database
/// operation fails for a reason other than a duplicate.
pub async fn run(path: &Path) -> Result<SeedSummary, CliError> {
    tracing::info!(path = %path.display(), "Loading seed file");
    let content = tokio::fs::read_to_string(path).await?;
    let seed = SeedFile::parse(&content)?;
    tracing::info!(
        categories = seed.categories.len(),
        products = seed.products.len(),
        coupons = seed.coupons.len(),
        "Seed file validated"
    );

    let pool = connect().await?;
    let mut summary = SeedSummary::default();

    let categories = CategoryRepository::new(&pool);
    for input in &seed.categories {
        let outcome = categories.create(input).await.map(|_| ());
        record(&mut summary, &input.name, outcome)?;
    }

    let category_ids: HashMap<String, CategoryId> = categories
        .list()
        .await?
        .into_iter()
        .map(|c| (c.slug, c.id))
        .collect();

    let products = ProductRepository::new(&pool);
    for SeedProduct { category, product } in seed.products {
        let product = ProductInput {
            category_id: category
                .as_deref()
                .and_then(|slug| category_ids.get(slug).copied()),
            ..product
        };
        let outcome = products.create(&product).await.map(|_| ());
        record(&mut summary, &product.name, outcome)?;
    }

    let coupons = CouponRepository::new(&pool);
    for input in &seed.coupons {
        let outcome = coupons.create(input).await.map(|_| ());
        record(&mut summary, &input.code, outcome)?;
    }

    tracing::info!("Seeding complete!");
    tracing::info!("  Inserted: {}", summary.inserted);
    tracing::info!("  Skipped (already exist): {}", summary.skipped);
    Ok(summary)
}

fn record(
    summary: &mut SeedSummary,
    entry: &str,
    outcome: Result<(), RepositoryError>,
) -> Result<(), CliError> {
    match outcome {
        Ok(()) => {
            summary.inserted += 1;
            Ok(())
        }
        Err(RepositoryError::Conflict(reason)) => {
            tracing::info!("Skipping {entry}: {reason}");
            summary.skipped += 1;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SEED: &str = r##"
categories:
  - name: Hoodies
products:
  - name: "  Straw Hat Crew Hoodie "
    category: hoodies
    base_price: "59.99"
    options:
      format: decomposed
      colors: [{ name: Black, hex: "#111111" }]
      sizes: [{ size: M, stock: 20 }, { size: L, stock: 15 }]
  - name: Survey Corps Tee
    base_price: "29.99"
    options:
      format: legacy
      variants:
        - { color: Green, size: M, price: "29.99", stock: 5 }
coupons:
  - code: LAUNCH10
    discount_type: PERCENTAGE
    discount_value: "10"
"##;

    #[test]
    fn test_parse_normalizes_entries() {
        let seed = SeedFile::parse(SEED).unwrap();
        assert_eq!(seed.categories[0].slug.as_deref(), Some("hoodies"));
        assert_eq!(seed.products.len(), 2);
        assert_eq!(seed.products[0].product.name, "Straw Hat Crew Hoodie");
        assert_eq!(
            seed.products[0].product.slug.as_deref(),
            Some("straw-hat-crew-hoodie")
        );
        assert_eq!(seed.products[1].category, None);
        assert_eq!(seed.coupons[0].code, "LAUNCH10");
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        let yaml = r#"
products:
  - name: Orphan
    category: nowhere
    base_price: "10"
    options: { format: decomposed, sizes: [{ size: M, stock: 1 }] }
"#;
        let err = SeedFile::parse(yaml).unwrap_err();
        assert!(matches!(err, CliError::InvalidSeed { entry, .. } if entry == "Orphan"));
    }

    #[test]
    fn test_bad_coupon_is_rejected() {
        let yaml = r#"
coupons:
  - code: HALFOFF
    discount_type: PERCENTAGE
    discount_value: "150"
"#;
        assert!(matches!(
            SeedFile::parse(yaml),
            Err(CliError::InvalidSeed { .. })
        ));
    }

    #[test]
    fn test_record_skips_conflicts_only() {
        let mut summary = SeedSummary::default();
        record(&mut summary, "a", Ok(())).unwrap();
        record(&mut summary, "b", Err(RepositoryError::Conflict("dup".into()))).unwrap();
        assert!(record(&mut summary, "c", Err(RepositoryError::NotFound)).is_err());
        assert_eq!(
            summary,
            SeedSummary {
                inserted: 1,
                skipped: 1
            }
        );
    }
}
