//! Decimal arithmetic utilities for financial calculations.

use rust_decimal::Decimal;

/// Round down to lot size (order amount precision).
///
/// Rounding down keeps a buy's notional from exceeding the computed target
/// and a sell from overshooting the held position.
pub fn round_down_to_lot(value: Decimal, lot_size: Decimal) -> Decimal {
    if lot_size == Decimal::ZERO {
        return value;
    }
    (value / lot_size).floor() * lot_size
}
