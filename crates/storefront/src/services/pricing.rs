//! Checkout pricing against trusted database records.
//!
//! The client sends what it displayed: unit prices, a shipping cost and an
//! optional coupon code. [`PricingService::quote`] recomputes every figure
//! from the database and rejects the checkout if the client's numbers are
//! implausible. The recomputed figures are what gets stored.

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;

use animart_core::ProductId;
use animart_core::coupon::{AppliedCoupon, CouponRejection, validate_coupon};
use animart_core::pricing::{
    PricedCart, PricingError, ShippingPolicy, SubmittedLine, calculate_total_price,
    validate_and_calculate_prices, validate_shipping_cost,
};

use crate::db::orders::NewOrderLine;
use crate::db::{CouponRepository, ProductRepository, RepositoryError};
use crate::models::catalog::Product;

/// Errors from quoting a checkout.
#[derive(Debug, Error)]
pub enum QuoteError {
    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error(transparent)]
    Coupon(#[from] CouponRejection),

    /// The requested color/size does not exist on the product.
    #[error("{product} is not available in {option}")]
    UnavailableOption { product: String, option: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// A cart line as submitted at checkout.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutLine {
    pub product_id: ProductId,
    #[serde(default)]
    pub color: Option<String>,
    pub size: String,
    pub quantity: i32,
    /// Unit price the client displayed.
    pub price: Decimal,
}

impl CheckoutLine {
    fn submitted(&self) -> SubmittedLine {
        SubmittedLine {
            product_id: self.product_id,
            quantity: self.quantity,
            price: self.price,
        }
    }
}

/// Server-computed figures for a checkout.
#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    pub cart: PricedCart,
    pub coupon: Option<AppliedCoupon>,
    pub discount: Decimal,
    pub shipping_cost: Decimal,
    pub total: Decimal,
}

/// Recomputes checkout figures from the database.
pub struct PricingService<'a> {
    products: ProductRepository<'a>,
    coupons: CouponRepository<'a>,
    shipping: &'a ShippingPolicy,
}

impl<'a> PricingService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, shipping: &'a ShippingPolicy) -> Self {
        Self {
            products: ProductRepository::new(pool),
            coupons: CouponRepository::new(pool),
            shipping,
        }
    }

    /// Run price, coupon, shipping and total validation in that order.
    ///
    /// Shipping is computed from the subtotal before any discount.
    ///
    /// # Errors
    ///
    /// Returns the first failed check as a [`QuoteError`].
    #[tracing::instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn quote(
        &self,
        lines: &[SubmittedLine],
        shipping_cost: Decimal,
        coupon_code: Option<&str>,
    ) -> Result<Quote, QuoteError> {
        let ids = distinct_ids(lines.iter().map(|l| l.product_id));
        let server_prices = self.products.base_prices(&ids).await?;
        let cart = validate_and_calculate_prices(lines, &server_prices)?;

        let coupon = match coupon_code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => Some(self.preview_coupon(code, cart.subtotal).await?),
            None => None,
        };
        let discount = coupon.as_ref().map_or(Decimal::ZERO, |c| c.discount);

        let shipping_cost = validate_shipping_cost(cart.subtotal, shipping_cost, self.shipping)?;
        let total = calculate_total_price(cart.subtotal, discount, shipping_cost);

        Ok(Quote {
            cart,
            coupon,
            discount,
            shipping_cost,
            total,
        })
    }

    /// Validate a coupon code against a subtotal without redeeming it.
    ///
    /// # Errors
    ///
    /// Returns `QuoteError::Coupon` if the coupon cannot be applied.
    pub async fn preview_coupon(
        &self,
        code: &str,
        subtotal: Decimal,
    ) -> Result<AppliedCoupon, QuoteError> {
        let coupon = self.coupons.get_by_code(code).await?;
        Ok(validate_coupon(coupon.as_ref(), subtotal, Utc::now())?)
    }

    /// Quote a checkout and resolve each line to the offer it buys.
    ///
    /// # Errors
    ///
    /// Returns the first failed check as a [`QuoteError`].
    pub async fn quote_checkout(
        &self,
        lines: &[CheckoutLine],
        shipping_cost: Decimal,
        coupon_code: Option<&str>,
    ) -> Result<(Quote, Vec<NewOrderLine>), QuoteError> {
        let submitted: Vec<SubmittedLine> = lines.iter().map(CheckoutLine::submitted).collect();
        let quote = self.quote(&submitted, shipping_cost, coupon_code).await?;

        let ids = distinct_ids(lines.iter().map(|l| l.product_id));
        let products = self.products.get_active_many(&ids).await?;
        let order_lines = resolve_lines(lines, &quote.cart, &products)?;
        Ok((quote, order_lines))
    }
}

/// Pair each checkout line with its priced line and the offer it selects.
///
/// `cart.lines` must be in the same order as `lines`, as produced by
/// [`validate_and_calculate_prices`].
///
/// # Errors
///
/// Returns `QuoteError::UnavailableOption` if a color/size does not exist,
/// or `PricingError::UnknownProduct` if a product disappeared.
pub fn resolve_lines(
    lines: &[CheckoutLine],
    cart: &PricedCart,
    products: &HashMap<ProductId, Product>,
) -> Result<Vec<NewOrderLine>, QuoteError> {
    lines
        .iter()
        .zip(&cart.lines)
        .map(|(line, priced)| {
            let product = products
                .get(&line.product_id)
                .ok_or(PricingError::UnknownProduct {
                    product_id: line.product_id,
                })?;
            let offer = product
                .find_offer(line.color.as_deref(), &line.size)
                .ok_or_else(|| QuoteError::UnavailableOption {
                    product: product.name.clone(),
                    option: describe_option(line.color.as_deref(), &line.size),
                })?;
            Ok(NewOrderLine {
                product_id: product.id,
                product_name: product.name.clone(),
                color: offer.color,
                size: offer.size,
                stock_key: offer.stock_key,
                quantity: priced.quantity,
                unit_price: priced.unit_price,
                total_price: priced.total_price,
            })
        })
        .collect()
}

fn describe_option(color: Option<&str>, size: &str) -> String {
    match color.map(str::trim).filter(|c| !c.is_empty()) {
        Some(color) => format!("{color} / {size}"),
        None => format!("size {size}"),
    }
}

fn distinct_ids(ids: impl Iterator<Item = ProductId>) -> Vec<ProductId> {
    let mut out: Vec<ProductId> = Vec::new();
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}
