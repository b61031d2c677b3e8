//! Decimal helpers for currency amounts.
//!
//! Amounts are plain [`Decimal`] values in the store currency's major unit
//! (dollars, not cents). The database stores them as `NUMERIC(10, 2)`.

use rust_decimal::{Decimal, RoundingStrategy};

/// One cent.
pub const CENT: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Largest amount a `NUMERIC(10, 2)` column holds.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_410_065_407, 2, 0, false, 2);

/// Round to two decimal places, half away from zero.
#[must_use]
pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Whether two amounts are equal to within one cent.
///
/// Amounts too far apart to subtract are not within a cent.
#[must_use]
pub fn within_a_cent(a: Decimal, b: Decimal) -> bool {
    a.checked_sub(b).is_some_and(|d| d.abs() <= CENT)
}
