//! Fixed-point decimal helpers.
//!
//! Every amount on the money path is a [`Money`] (scale-6, precision-20
//! `rust_decimal::Decimal`). No floating point is used anywhere the value of
//! a pool or transaction is computed.

use rust_decimal::{Decimal, RoundingStrategy};

/// Money is a plain alias, not a newtype: `rust_decimal::Decimal` already
/// enforces exact arithmetic, and a newtype would only get in the way of the
/// `sqlx` impls the storage layer needs.
pub type Money = Decimal;

/// The scale mandated by the data model: `NUMERIC(20, 6)`.
pub const SCALE: u32 = 6;

/// Rounds to [`SCALE`] decimal places using half-even (banker's) rounding, as
/// required after every multiplication on the quote path.
pub fn round6(value: Money) -> Money {
    value.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointNearestEven)
}
