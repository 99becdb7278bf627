//! Money helpers.
//!
//! All currency amounts in the client are `rust_decimal::Decimal`. The API
//! deals in a single currency (INR), so amounts carry no currency code; this
//! module only provides display formatting.

use rust_decimal::Decimal;

/// Format an amount for display with two decimal places (e.g., "₹249.50").
#[must_use]
pub fn format_amount(amount: Decimal) -> String {
    format!("₹{:.2}", amount.round_dp(2))
}
