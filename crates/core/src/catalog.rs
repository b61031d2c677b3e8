//! Product option shapes and their normalization.
//!
//! Products are stored in one of two shapes:
//!
//! - **Legacy**: a flat list of variants, each a (color, size) pair with its
//!   own price and stock.
//! - **Decomposed**: a list of colors (each with its own images) and an
//!   independent list of sizes with stock. Every color is available in every
//!   size, priced at the product's base price, and stock is tracked per size.
//!
//! [`ProductOptions`] is the only place that knows about the difference.
//! Everything downstream works with [`Offer`]s.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::VariantId;

/// A legacy (color, size) variant row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyVariant {
    pub id: VariantId,
    pub color: String,
    pub size: String,
    pub price: Decimal,
    pub stock: i32,
}

/// A color in the decomposed shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorOption {
    pub name: String,
    pub hex: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

/// A size and its stock in the decomposed shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeStock {
    pub size: String,
    pub stock: i32,
}

/// Which row holds the stock for an offer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StockKey {
    /// A legacy variant row.
    Variant { id: VariantId },
    /// A decomposed size row, shared by every color.
    Size { size: String },
}

/// A purchasable (color, size) combination, whichever shape it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    /// Empty when the product has no colors.
    pub color: String,
    pub size: String,
    pub price: Decimal,
    pub stock: i32,
    pub stock_key: StockKey,
}

/// The options of a single product in either storage shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum ProductOptions {
    Legacy {
        variants: Vec<LegacyVariant>,
    },
    Decomposed {
        colors: Vec<ColorOption>,
        sizes: Vec<SizeStock>,
    },
}

impl Default for ProductOptions {
    fn default() -> Self {
        Self::Decomposed {
            colors: Vec::new(),
            sizes: Vec::new(),
        }
    }
}

impl ProductOptions {
    /// Pick the shape according to the product's `use_new_format` flag.
    ///
    /// Rows belonging to the other shape are ignored.
    #[must_use]
    pub fn from_rows(
        use_new_format: bool,
        variants: Vec<LegacyVariant>,
        colors: Vec<ColorOption>,
        sizes: Vec<SizeStock>,
    ) -> Self {
        if use_new_format {
            Self::Decomposed { colors, sizes }
        } else {
            Self::Legacy { variants }
        }
    }

    /// Whether this is the decomposed shape.
    #[must_use]
    pub const fn uses_new_format(&self) -> bool {
        matches!(self, Self::Decomposed { .. })
    }

    /// Every purchasable combination.
    ///
    /// Decomposed offers are priced at `base_price`.
    #[must_use]
    pub fn offers(&self, base_price: Decimal) -> Vec<Offer> {
        match self {
            Self::Legacy { variants } => variants
                .iter()
                .map(|v| Offer {
                    color: v.color.clone(),
                    size: v.size.clone(),
                    price: v.price,
                    stock: v.stock,
                    stock_key: StockKey::Variant { id: v.id },
                })
                .collect(),
            Self::Decomposed { colors, sizes } => {
                let color_names: Vec<&str> = if colors.is_empty() {
                    vec![""]
                } else {
                    colors.iter().map(|c| c.name.as_str()).collect()
                };
                color_names
                    .into_iter()
                    .flat_map(|color| {
                        sizes.iter().map(move |s| Offer {
                            color: color.to_owned(),
                            size: s.size.clone(),
                            price: base_price,
                            stock: s.stock,
                            stock_key: StockKey::Size {
                                size: s.size.clone(),
                            },
                        })
                    })
                    .collect()
            }
        }
    }

    /// Find the offer matching a color and size (case-insensitive).
    ///
    /// `color` may be omitted only when the product has at most one color.
    #[must_use]
    pub fn find_offer(
        &self,
        base_price: Decimal,
        color: Option<&str>,
        size: &str,
    ) -> Option<Offer> {
        let colors = self.colors();
        let wanted = match color.map(str::trim).filter(|c| !c.is_empty()) {
            Some(c) => Some(c),
            None if colors.len() <= 1 => None,
            None => return None,
        };

        self.offers(base_price).into_iter().find(|o| {
            o.size.eq_ignore_ascii_case(size.trim())
                && wanted.is_none_or(|c| o.color.eq_ignore_ascii_case(c))
        })
    }

    /// Distinct color names, in first-seen order.
    #[must_use]
    pub fn colors(&self) -> Vec<String> {
        match self {
            Self::Legacy { variants } => distinct(variants.iter().map(|v| v.color.as_str())),
            Self::Decomposed { colors, .. } => distinct(colors.iter().map(|c| c.name.as_str())),
        }
    }

    /// Distinct sizes, in first-seen order.
    #[must_use]
    pub fn sizes(&self) -> Vec<String> {
        match self {
            Self::Legacy { variants } => distinct(variants.iter().map(|v| v.size.as_str())),
            Self::Decomposed { sizes, .. } => distinct(sizes.iter().map(|s| s.size.as_str())),
        }
    }

    /// Units on hand across all stock rows.
    #[must_use]
    pub fn total_stock(&self) -> i64 {
        match self {
            Self::Legacy { variants } => variants.iter().map(|v| i64::from(v.stock.max(0))).sum(),
            Self::Decomposed { sizes, .. } => sizes.iter().map(|s| i64::from(s.stock.max(0))).sum(),
        }
    }

    /// Lowest and highest offer price, if there are any offers.
    #[must_use]
    pub fn price_range(&self, base_price: Decimal) -> Option<(Decimal, Decimal)> {
        let offers = self.offers(base_price);
        let min = offers.iter().map(|o| o.price).min()?;
        let max = offers.iter().map(|o| o.price).max()?;
        Some((min, max))
    }
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for v in values {
        if !out.iter().any(|seen| seen.eq_ignore_ascii_case(v)) {
            out.push(v.to_owned());
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn legacy() -> ProductOptions {
        ProductOptions::Legacy {
            variants: vec![
                LegacyVariant {
                    id: VariantId::new(1),
                    color: "Black".into(),
                    size: "M".into(),
                    price: Decimal::new(4500, 2),
                    stock: 3,
                },
                LegacyVariant {
                    id: VariantId::new(2),
                    color: "Black".into(),
                    size: "L".into(),
                    price: Decimal::new(4700, 2),
                    stock: 0,
                },
                LegacyVariant {
                    id: VariantId::new(3),
                    color: "White".into(),
                    size: "M".into(),
                    price: Decimal::new(4500, 2),
                    stock: 5,
                },
            ],
        }
    }

    fn decomposed() -> ProductOptions {
        ProductOptions::Decomposed {
            colors: vec![
                ColorOption {
                    name: "Navy".into(),
                    hex: Some("#000080".into()),
                    images: vec![],
                },
                ColorOption {
                    name: "Sakura".into(),
                    hex: None,
                    images: vec!["/img/sakura.png".into()],
                },
            ],
            sizes: vec![
                SizeStock {
                    size: "S".into(),
                    stock: 4,
                },
                SizeStock {
                    size: "XL".into(),
                    stock: 1,
                },
            ],
        }
    }

    #[test]
    fn test_from_rows_picks_shape_by_flag() {
        let v = vec![];
        let opts = ProductOptions::from_rows(true, v.clone(), vec![], vec![]);
        assert!(opts.uses_new_format());
        let opts = ProductOptions::from_rows(false, v, vec![], vec![]);
        assert!(!opts.uses_new_format());
    }

    #[test]
    fn test_legacy_offers_keep_variant_prices() {
        let offers = legacy().offers(Decimal::new(4000, 2));
        assert_eq!(offers.len(), 3);
        assert_eq!(offers[1].price, Decimal::new(4700, 2));
        assert_eq!(
            offers[1].stock_key,
            StockKey::Variant {
                id: VariantId::new(2)
            }
        );
    }

    #[test]
    fn test_decomposed_offers_are_cross_product_at_base_price() {
        let base = Decimal::new(5200, 2);
        let offers = decomposed().offers(base);
        assert_eq!(offers.len(), 4);
        assert!(offers.iter().all(|o| o.price == base));
        let xl: Vec<_> = offers.iter().filter(|o| o.size == "XL").collect();
        assert_eq!(xl.len(), 2);
        assert!(xl.iter().all(|o| o.stock == 1));
    }

    #[test]
    fn test_decomposed_without_colors_still_sells_sizes() {
        let opts = ProductOptions::Decomposed {
            colors: vec![],
            sizes: vec![SizeStock {
                size: "M".into(),
                stock: 2,
            }],
        };
        let offer = opts.find_offer(Decimal::ONE, None, "m").unwrap();
        assert_eq!(offer.color, "");
        assert_eq!(offer.stock, 2);
    }

    #[test]
    fn test_find_offer_is_case_insensitive() {
        let offer = legacy()
            .find_offer(Decimal::ZERO, Some("white"), "m")
            .unwrap();
        assert_eq!(offer.stock, 5);
    }

    #[test]
    fn test_find_offer_requires_color_when_ambiguous() {
        assert!(legacy().find_offer(Decimal::ZERO, None, "M").is_none());
        assert!(decomposed().find_offer(Decimal::ZERO, None, "S").is_none());
        assert!(
            decomposed()
                .find_offer(Decimal::ZERO, Some("Purple"), "S")
                .is_none()
        );
    }

    #[test]
    fn test_colors_sizes_and_stock() {
        let l = legacy();
        assert_eq!(l.colors(), vec!["Black", "White"]);
        assert_eq!(l.sizes(), vec!["M", "L"]);
        assert_eq!(l.total_stock(), 8);

        let d = decomposed();
        assert_eq!(d.colors(), vec!["Navy", "Sakura"]);
        assert_eq!(d.total_stock(), 5);
    }

    #[test]
    fn test_price_range() {
        let (min, max) = legacy().price_range(Decimal::ZERO).unwrap();
        assert_eq!(min, Decimal::new(4500, 2));
        assert_eq!(max, Decimal::new(4700, 2));
        assert!(ProductOptions::default().price_range(Decimal::ONE).is_none());
    }
}
