//! Server-side price recomputation for checkout.
//!
//! Clients send the prices they displayed. None of those numbers are used
//! for the order: unit prices come from the database, shipping is derived
//! from the subtotal, and the total is computed here. The client's figures
//! only serve as a tamper check, and a checkout whose figures are wildly off
//! is rejected outright.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::{round_cents, within_a_cent};
use crate::types::ProductId;

/// Largest tolerated `|server - client| / server` for any single line.
pub const MAX_PRICE_VARIANCE: Decimal = Decimal::ONE;

/// Largest quantity accepted for a single line.
pub const MAX_LINE_QUANTITY: i32 = 99;

/// Reasons a checkout's figures are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("invalid quantity for product {product_id}")]
    InvalidQuantity { product_id: ProductId },

    #[error("product {product_id} is not available")]
    UnknownProduct { product_id: ProductId },

    #[error("price mismatch for product {product_id}")]
    PriceMismatch { product_id: ProductId },

    #[error("invalid shipping cost: expected {expected}, got {provided}")]
    ShippingMismatch { expected: Decimal, provided: Decimal },
}

/// A line as submitted by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedLine {
    pub product_id: ProductId,
    pub quantity: i32,
    /// Unit price the client displayed.
    pub price: Decimal,
}

/// A line after recomputation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub product_id: ProductId,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

/// All lines after recomputation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    pub subtotal: Decimal,
}

/// Relative difference between the server and client unit price.
///
/// Returns `None` when the ratio is unbounded: the server price is zero
/// and the client claims something else, or the difference doesn't fit in
/// a `Decimal`.
#[must_use]
pub fn price_variance(server: Decimal, client: Decimal) -> Option<Decimal> {
    if server.is_zero() {
        return client.is_zero().then_some(Decimal::ZERO);
    }
    server.checked_sub(client)?.abs().checked_div(server.abs())
}

/// Recompute every line from `server_prices` (product ID → base price).
///
/// The whole batch is rejected if any line references an unknown product,
/// has a quantity outside `1..=MAX_LINE_QUANTITY`, or carries a client price
/// whose variance exceeds [`MAX_PRICE_VARIANCE`].
///
/// # Errors
///
/// Returns the first [`PricingError`] encountered.
pub fn validate_and_calculate_prices(
    lines: &[SubmittedLine],
    server_prices: &HashMap<ProductId, Decimal>,
) -> Result<PricedCart, PricingError> {
    if lines.is_empty() {
        return Err(PricingError::EmptyCart);
    }

    let mut priced = Vec::with_capacity(lines.len());
    let mut subtotal = Decimal::ZERO;

    for line in lines {
        let product_id = line.product_id;
        if !(1..=MAX_LINE_QUANTITY).contains(&line.quantity) {
            return Err(PricingError::InvalidQuantity { product_id });
        }

        let server = *server_prices
            .get(&product_id)
            .ok_or(PricingError::UnknownProduct { product_id })?;

        match price_variance(server, line.price) {
            Some(v) if v <= MAX_PRICE_VARIANCE => {}
            _ => return Err(PricingError::PriceMismatch { product_id }),
        }

        let unit_price = round_cents(server);
        let total_price = unit_price
            .checked_mul(Decimal::from(line.quantity))
            .map(round_cents)
            .ok_or(PricingError::PriceMismatch { product_id })?;
        subtotal = subtotal
            .checked_add(total_price)
            .ok_or(PricingError::PriceMismatch { product_id })?;

        priced.push(PricedLine {
            product_id,
            quantity: line.quantity,
            unit_price,
            total_price,
        });
    }

    Ok(PricedCart {
        lines: priced,
        subtotal,
    })
}

/// Free-shipping threshold and flat rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingPolicy {
    /// Subtotals at or above this ship free.
    pub free_threshold: Decimal,
    /// Charged below the threshold.
    pub flat_rate: Decimal,
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self {
            free_threshold: Decimal::new(50, 0),
            flat_rate: Decimal::new(599, 2),
        }
    }
}

impl ShippingPolicy {
    /// Shipping owed for `subtotal`.
    #[must_use]
    pub fn cost_for(&self, subtotal: Decimal) -> Decimal {
        if subtotal >= self.free_threshold {
            Decimal::ZERO
        } else {
            self.flat_rate
        }
    }
}

/// Check the client's shipping figure against the policy.
///
/// # Errors
///
/// Returns [`PricingError::ShippingMismatch`] if `provided` is more than a
/// cent away from what the policy charges for `subtotal`.
pub fn validate_shipping_cost(
    subtotal: Decimal,
    provided: Decimal,
    policy: &ShippingPolicy,
) -> Result<Decimal, PricingError> {
    let expected = policy.cost_for(subtotal);
    if within_a_cent(expected, provided) {
        Ok(expected)
    } else {
        Err(PricingError::ShippingMismatch { expected, provided })
    }
}

/// `subtotal - discount + shipping`, never below zero.
///
/// Saturates instead of overflowing at the edges of `Decimal`.
#[must_use]
pub fn calculate_total_price(subtotal: Decimal, discount: Decimal, shipping: Decimal) -> Decimal {
    round_cents(subtotal.saturating_sub(discount).saturating_add(shipping)).max(Decimal::ZERO)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn prices() -> HashMap<ProductId, Decimal> {
        HashMap::from([
            (ProductId::new(1), dec("45.00")),
            (ProductId::new(2), dec("12.50")),
            (ProductId::new(3), Decimal::ZERO),
        ])
    }

    fn line(id: i32, quantity: i32, price: &str) -> SubmittedLine {
        SubmittedLine {
            product_id: ProductId::new(id),
            quantity,
            price: dec(price),
        }
    }

    #[test]
    fn test_recomputes_from_server_prices() {
        let cart =
            validate_and_calculate_prices(&[line(1, 2, "44.00"), line(2, 1, "12.50")], &prices())
                .unwrap();
        assert_eq!(cart.lines[0].unit_price, dec("45.00"));
        assert_eq!(cart.lines[0].total_price, dec("90.00"));
        assert_eq!(cart.subtotal, dec("102.50"));
    }

    #[test]
    fn test_variance_of_exactly_one_is_tolerated() {
        // client says 0 for a 45.00 item: |45 - 0| / 45 = 1
        assert!(validate_and_calculate_prices(&[line(1, 1, "0")], &prices()).is_ok());
        // client says 90: |45 - 90| / 45 = 1
        assert!(validate_and_calculate_prices(&[line(1, 1, "90")], &prices()).is_ok());
    }

    #[test]
    fn test_any_line_over_variance_rejects_batch() {
        let err = validate_and_calculate_prices(
            &[line(2, 1, "12.50"), line(1, 1, "90.01")],
            &prices(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            PricingError::PriceMismatch {
                product_id: ProductId::new(1)
            }
        );
    }

    #[test]
    fn test_variance_property_over_grid() {
        let server = dec("20.00");
        let map = HashMap::from([(ProductId::new(7), server)]);
        for cents in (-4000_i64..=8000).step_by(37) {
            let client = Decimal::new(cents, 2);
            let ratio = (server - client).abs() / server;
            let result = validate_and_calculate_prices(
                &[SubmittedLine {
                    product_id: ProductId::new(7),
                    quantity: 1,
                    price: client,
                }],
                &map,
            );
            assert_eq!(result.is_ok(), ratio <= Decimal::ONE, "client={client}");
        }
    }

    #[test]
    fn test_zero_server_price() {
        assert!(validate_and_calculate_prices(&[line(3, 1, "0")], &prices()).is_ok());
        assert!(validate_and_calculate_prices(&[line(3, 1, "0.01")], &prices()).is_err());
        assert_eq!(price_variance(Decimal::ZERO, Decimal::ONE), None);
    }

    #[test]
    fn test_unknown_product_and_bad_quantity() {
        assert_eq!(
            validate_and_calculate_prices(&[line(99, 1, "1")], &prices()).unwrap_err(),
            PricingError::UnknownProduct {
                product_id: ProductId::new(99)
            }
        );
        for qty in [0, -1, MAX_LINE_QUANTITY + 1] {
            assert!(matches!(
                validate_and_calculate_prices(&[line(1, qty, "45")], &prices()),
                Err(PricingError::InvalidQuantity { .. })
            ));
        }
        assert_eq!(
            validate_and_calculate_prices(&[], &prices()).unwrap_err(),
            PricingError::EmptyCart
        );
    }

    #[test]
    fn test_shipping_below_threshold() {
        let policy = ShippingPolicy::default();
        assert_eq!(
            validate_shipping_cost(dec("40"), dec("5.99"), &policy).unwrap(),
            dec("5.99")
        );
        assert!(matches!(
            validate_shipping_cost(dec("40"), Decimal::ZERO, &policy),
            Err(PricingError::ShippingMismatch { .. })
        ));
    }

    #[test]
    fn test_shipping_at_and_above_threshold_is_free() {
        let policy = ShippingPolicy::default();
        assert_eq!(
            validate_shipping_cost(dec("50"), Decimal::ZERO, &policy).unwrap(),
            Decimal::ZERO
        );
        assert!(validate_shipping_cost(dec("80"), dec("5.99"), &policy).is_err());
    }

    #[test]
    fn test_extreme_client_prices_are_rejected() {
        for price in [Decimal::MIN, Decimal::MAX] {
            let lines = [SubmittedLine {
                product_id: ProductId::new(1),
                quantity: 1,
                price,
            }];
            assert_eq!(
                validate_and_calculate_prices(&lines, &prices()).unwrap_err(),
                PricingError::PriceMismatch {
                    product_id: ProductId::new(1)
                }
            );
        }
        assert_eq!(price_variance(dec("45.00"), Decimal::MIN), None);
        assert_eq!(price_variance(Decimal::MIN, Decimal::MAX), None);
    }

    #[test]
    fn test_extreme_server_price_does_not_overflow() {
        let map = HashMap::from([(ProductId::new(1), Decimal::MAX)]);
        let lines = [SubmittedLine {
            product_id: ProductId::new(1),
            quantity: 2,
            price: Decimal::MAX,
        }];
        assert!(validate_and_calculate_prices(&lines, &map).is_err());
    }

    #[test]
    fn test_extreme_shipping_is_a_mismatch() {
        let policy = ShippingPolicy::default();
        for provided in [Decimal::MIN, Decimal::MAX] {
            assert!(matches!(
                validate_shipping_cost(dec("40"), provided, &policy),
                Err(PricingError::ShippingMismatch { .. })
            ));
        }
    }

    #[test]
    fn test_total_at_decimal_bounds() {
        assert_eq!(
            calculate_total_price(Decimal::MIN, Decimal::MAX, Decimal::ZERO),
            Decimal::ZERO
        );
        assert_eq!(
            calculate_total_price(Decimal::MAX, Decimal::MIN, Decimal::MAX),
            Decimal::MAX
        );
        assert_eq!(
            calculate_total_price(dec("10"), Decimal::MAX, Decimal::MAX),
            dec("10")
        );
    }

    #[test]
    fn test_total_never_negative() {
        assert_eq!(
            calculate_total_price(dec("40"), dec("10"), dec("5.99")),
            dec("35.99")
        );
        assert_eq!(
            calculate_total_price(dec("10"), dec("500"), Decimal::ZERO),
            Decimal::ZERO
        );
        for sub in [-50_i64, 0, 13, 999] {
            for disc in [-5_i64, 0, 20, 10_000] {
                for ship in [-3_i64, 0, 599] {
                    let total = calculate_total_price(
                        Decimal::new(sub, 0),
                        Decimal::new(disc, 0),
                        Decimal::new(ship, 2),
                    );
                    assert!(total >= Decimal::ZERO);
                }
            }
        }
    }
}
