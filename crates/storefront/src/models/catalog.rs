//! Catalog domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use animart_core::catalog::{ColorOption, Offer, ProductOptions, SizeStock};
use animart_core::{CategoryId, PrintPosition, ProductId};

/// A product category.
#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    /// Active products in this category, when the query computed it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_count: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Category reference embedded in product responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRef {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
}

/// A product with its options in whichever shape it is stored.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub base_price: Decimal,
    pub print_position: PrintPosition,
    pub category: Option<CategoryRef>,
    pub images: Vec<String>,
    pub is_active: bool,
    pub is_featured: bool,
    pub options: ProductOptions,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Every purchasable (color, size) combination.
    #[must_use]
    pub fn offers(&self) -> Vec<Offer> {
        self.options.offers(self.base_price)
    }

    /// Find the offer for a cart line.
    #[must_use]
    pub fn find_offer(&self, color: Option<&str>, size: &str) -> Option<Offer> {
        self.options.find_offer(self.base_price, color, size)
    }

    /// Response body for the product detail endpoint.
    #[must_use]
    pub fn detail(&self) -> ProductDetail<'_> {
        let offers = self.offers();
        let in_stock = offers.iter().any(|o| o.stock > 0);
        ProductDetail {
            product: self,
            colors: self.options.colors(),
            sizes: self.options.sizes(),
            total_stock: self.options.total_stock(),
            in_stock,
            offers,
            in_wishlist: None,
        }
    }
}

/// Product plus the normalized view clients render from.
#[derive(Debug, Serialize)]
pub struct ProductDetail<'a> {
    #[serde(flatten)]
    pub product: &'a Product,
    pub colors: Vec<String>,
    pub sizes: Vec<String>,
    pub offers: Vec<Offer>,
    pub total_stock: i64,
    pub in_stock: bool,
    /// Only present for signed-in shoppers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_wishlist: Option<bool>,
}

/// List-view projection of a product.
#[derive(Debug, Clone, Serialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub base_price: Decimal,
    pub print_position: PrintPosition,
    pub images: Vec<String>,
    pub is_active: bool,
    pub is_featured: bool,
    pub category_slug: Option<String>,
    pub category_name: Option<String>,
    pub total_stock: i64,
    pub created_at: DateTime<Utc>,
}

/// Admin payload for creating or replacing a category.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl CategoryInput {
    /// Trim fields and derive the slug from the name when none is given.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn normalized(self) -> Result<Self, String> {
        let name = self.name.trim().to_owned();
        if name.is_empty() {
            return Err("category name is required".to_owned());
        }
        let slug = normalize_slug(self.slug.as_deref(), &name)?;
        Ok(Self {
            name,
            slug: Some(slug),
            description: self.description.filter(|d| !d.trim().is_empty()),
            image_url: self.image_url.filter(|u| !u.trim().is_empty()),
        })
    }
}

/// A legacy variant as submitted by an admin.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VariantInput {
    pub color: String,
    pub size: String,
    pub price: Decimal,
    pub stock: i32,
}

/// Product options as submitted by an admin, in either shape.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum OptionsInput {
    Legacy {
        variants: Vec<VariantInput>,
    },
    Decomposed {
        #[serde(default)]
        colors: Vec<ColorOption>,
        sizes: Vec<SizeStock>,
    },
}

impl OptionsInput {
    #[must_use]
    pub const fn uses_new_format(&self) -> bool {
        matches!(self, Self::Decomposed { .. })
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            Self::Legacy { variants } => {
                let mut seen = Vec::with_capacity(variants.len());
                for v in variants {
                    if v.color.trim().is_empty() || v.size.trim().is_empty() {
                        return Err("variant color and size are required".to_owned());
                    }
                    if v.price < Decimal::ZERO || v.stock < 0 {
                        return Err("variant price and stock cannot be negative".to_owned());
                    }
                    let key = (v.color.trim().to_lowercase(), v.size.trim().to_lowercase());
                    if seen.contains(&key) {
                        return Err(format!("duplicate variant {} / {}", v.color, v.size));
                    }
                    seen.push(key);
                }
            }
            Self::Decomposed { colors, sizes } => {
                if sizes.iter().any(|s| s.size.trim().is_empty() || s.stock < 0) {
                    return Err("sizes need a name and non-negative stock".to_owned());
                }
                if colors.iter().any(|c| c.name.trim().is_empty()) {
                    return Err("colors need a name".to_owned());
                }
                let mut names: Vec<String> =
                    sizes.iter().map(|s| s.size.trim().to_lowercase()).collect();
                names.sort();
                names.dedup();
                if names.len() != sizes.len() {
                    return Err("duplicate size".to_owned());
                }
            }
        }
        Ok(())
    }
}

/// Admin payload for creating or replacing a product.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    pub base_price: Decimal,
    #[serde(default)]
    pub print_position: PrintPosition,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
    pub options: OptionsInput,
}

const fn default_true() -> bool {
    true
}

impl ProductInput {
    /// Trim fields, derive the slug and check the options.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn normalized(self) -> Result<Self, String> {
        let name = self.name.trim().to_owned();
        if name.is_empty() {
            return Err("product name is required".to_owned());
        }
        if self.base_price < Decimal::ZERO {
            return Err("base price cannot be negative".to_owned());
        }
        self.options.validate()?;
        let slug = normalize_slug(self.slug.as_deref(), &name)?;
        Ok(Self {
            name,
            slug: Some(slug),
            description: self.description.trim().to_owned(),
            images: self
                .images
                .into_iter()
                .map(|i| i.trim().to_owned())
                .filter(|i| !i.is_empty())
                .collect(),
            ..self
        })
    }
}

fn normalize_slug(explicit: Option<&str>, name: &str) -> Result<String, String> {
    let slug = slugify(explicit.filter(|s| !s.trim().is_empty()).unwrap_or(name));
    if slug.is_empty() {
        return Err("slug must contain at least one letter or digit".to_owned());
    }
    Ok(slug)
}

/// Lowercase ASCII slug: alphanumerics kept, everything else collapsed to `-`.
#[must_use]
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use animart_core::catalog::{ColorOption, SizeStock};

    use super::*;

    fn hoodie() -> Product {
        Product {
            id: ProductId::new(5),
            name: "Akatsuki Cloud Hoodie".into(),
            slug: "akatsuki-cloud-hoodie".into(),
            description: String::new(),
            base_price: Decimal::new(5499, 2),
            print_position: PrintPosition::Back,
            category: None,
            images: vec![],
            is_active: true,
            is_featured: false,
            options: ProductOptions::Decomposed {
                colors: vec![ColorOption {
                    name: "Black".into(),
                    hex: None,
                    images: vec![],
                }],
                sizes: vec![
                    SizeStock {
                        size: "M".into(),
                        stock: 0,
                    },
                    SizeStock {
                        size: "L".into(),
                        stock: 2,
                    },
                ],
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_detail_json_flattens_product() {
        let p = hoodie();
        let json = serde_json::to_value(p.detail()).unwrap();
        assert_eq!(json["slug"], "akatsuki-cloud-hoodie");
        assert_eq!(json["options"]["format"], "decomposed");
        assert_eq!(json["offers"].as_array().unwrap().len(), 2);
        assert_eq!(json["total_stock"], 2);
        assert!(json.get("in_wishlist").is_none());
        assert_eq!(json["in_stock"], true);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Attack on Titan: Survey Corps!"), "attack-on-titan-survey-corps");
        assert_eq!(slugify("  --Jujutsu  Kaisen-- "), "jujutsu-kaisen");
        assert_eq!(slugify("日本"), "");
    }

    #[test]
    fn test_product_input_derives_slug_and_validates_options() {
        let json = serde_json::json!({
            "name": " Spy x Family Tee ",
            "base_price": "29.99",
            "options": {
                "format": "legacy",
                "variants": [
                    { "color": "Pink", "size": "M", "price": "29.99", "stock": 3 },
                    { "color": "pink", "size": "m", "price": "31.00", "stock": 1 }
                ]
            }
        });
        let input: ProductInput = serde_json::from_value(json).unwrap();
        assert!(input.is_active);
        let err = input.normalized().unwrap_err();
        assert!(err.contains("duplicate variant"));

        let json = serde_json::json!({
            "name": " Spy x Family Tee ",
            "base_price": "29.99",
            "options": { "format": "decomposed", "sizes": [{ "size": "M", "stock": 2 }] }
        });
        let input: ProductInput = serde_json::from_value(json).unwrap();
        let input = input.normalized().unwrap();
        assert_eq!(input.slug.as_deref(), Some("spy-x-family-tee"));
        assert_eq!(input.name, "Spy x Family Tee");
        assert!(input.options.uses_new_format());
    }

    #[test]
    fn test_single_color_product_needs_no_color() {
        let offer = hoodie().find_offer(None, "l").unwrap();
        assert_eq!(offer.color, "Black");
        assert_eq!(offer.price, Decimal::new(5499, 2));
    }
}
