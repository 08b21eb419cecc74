//! Raw token units → human-denominated amounts.
//!
//! The raw integer is rendered as a decimal string with the point shifted by
//! `decimals` places and then parsed, so the result is the nearest `f64` to
//! `raw / 10^decimals` rather than the product of two rounded values.

use alloy_primitives::{I256, U256};

/// Exact decimal rendering of `raw / 10^decimals` (trailing zeros trimmed).
pub fn to_decimal_string(raw: U256, decimals: u8) -> String {
    let digits = raw.to_string();
    let decimals = usize::from(decimals);
    if decimals == 0 {
        return digits;
    }
    let padded = if digits.len() <= decimals {
        format!("{}{digits}", "0".repeat(decimals - digits.len() + 1))
    } else {
        digits
    };
    let (int_part, frac_part) = padded.split_at(padded.len() - decimals);
    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{int_part}.{frac_part}")
    }
}

/// `raw / 10^decimals` as `f64`.
pub fn rescale(raw: U256, decimals: u8) -> f64 {
    to_decimal_string(raw, decimals)
        .parse::<f64>()
        .unwrap_or(f64::NAN)
}

/// Signed variant; negative values are kept (callers clamp).
pub fn rescale_signed(raw: I256, decimals: u8) -> f64 {
    let magnitude = rescale(raw.unsigned_abs(), decimals);
    if raw.is_negative() {
        -magnitude
    } else {
        magnitude
    }
}

/// Balances are never negative; NaN / infinity / negatives collapse to zero.
pub fn clamp_balance(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}
