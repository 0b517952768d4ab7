//! Exact decimal helpers for money and percentage math
//!
//! Every price, amount and percentage that reaches an API response goes
//! through this module. Values are `rust_decimal::Decimal`, never `f64`, so a
//! displayed percentage and the comparison behind it can never disagree.
//!
//! Rounding rules:
//! - percentages: 2 fractional digits, half-up
//! - currency totals: 2 fractional digits, half-up, always rendered with two digits
//! - DCA averages: 8 fractional digits
//!
//! Division by zero (or by a missing operand) yields `None`.

use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Fractional digits kept on percentage values
pub const PERCENT_DP: u32 = 2;
/// Fractional digits kept on currency totals
pub const CURRENCY_DP: u32 = 2;
/// Fractional digits kept on dollar-cost averages
pub const DCA_DP: u32 = 8;

/// Round half-up ("away from zero" on ties) to `dp` fractional digits.
///
/// Values that already have fewer digits keep their scale.
pub fn round_half_up(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// Round half-up and pad to exactly `dp` fractional digits (`300` -> `300.00`).
pub fn fixed(value: Decimal, dp: u32) -> Decimal {
    let mut rounded = round_half_up(value, dp);
    rounded.rescale(dp);
    rounded
}

pub fn round_percent(value: Decimal) -> Decimal {
    fixed(value, PERCENT_DP)
}

pub fn round_currency(value: Decimal) -> Decimal {
    fixed(value, CURRENCY_DP)
}

/// DCA averages keep up to 8 digits; trailing zeros are dropped.
pub fn round_dca(value: Decimal) -> Decimal {
    round_half_up(value, DCA_DP).normalize()
}

/// `numerator / denominator`, or `None` when the denominator is zero or the
/// quotient overflows.
pub fn checked_ratio(numerator: Decimal, denominator: Decimal) -> Option<Decimal> {
    if denominator.is_zero() {
        return None;
    }
    numerator.checked_div(denominator)
}

/// `(current / reference - 1) * 100`, rounded to 2 digits.
///
/// Absent operands or a zero reference give `None`.
pub fn percent_change(current: Option<Decimal>, reference: Option<Decimal>) -> Option<Decimal> {
    let ratio = checked_ratio(current?, reference?)?;
    let change = (ratio - Decimal::ONE).checked_mul(Decimal::ONE_HUNDRED)?;
    Some(round_percent(change))
}

/// `base * (1 + pct / 100)`
pub fn mark_up(base: Decimal, pct: Decimal) -> Option<Decimal> {
    base.checked_mul(Decimal::ONE + pct / Decimal::ONE_HUNDRED)
}

/// `base * (1 - pct / 100)`
pub fn mark_down(base: Decimal, pct: Decimal) -> Option<Decimal> {
    base.checked_mul(Decimal::ONE - pct / Decimal::ONE_HUNDRED)
}

/// Size-weighted average price: `sum(amount * price) / sum(amount)`.
///
/// Fills with a missing amount or price are skipped. Returns `None` for an
/// empty set or when the amounts sum to zero. The result is rounded to the
/// DCA precision.
pub fn weighted_average<I>(fills: I) -> Option<Decimal>
where
    I: IntoIterator<Item = (Option<Decimal>, Option<Decimal>)>,
{
    let mut notional = Decimal::ZERO;
    let mut quantity = Decimal::ZERO;

    for (amount, price) in fills {
        let (Some(amount), Some(price)) = (amount, price) else {
            continue;
        };
        notional = notional.checked_add(amount.checked_mul(price)?)?;
        quantity = quantity.checked_add(amount)?;
    }

    checked_ratio(notional, quantity).map(round_dca)
}

/// Parse a stored decimal. Accepts plain (`"0.001"`) and scientific
/// (`"1e-8"`) notation since SQLite may hand back either.
pub fn parse_decimal(raw: &str) -> Result<Decimal, rust_decimal::Error> {
    let raw = raw.trim();
    Decimal::from_str(raw).or_else(|_| Decimal::from_scientific(raw))
}
