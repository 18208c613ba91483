//! Minor-unit money handling
//!
//! All amounts inside the engine are `i64` minor units (cents, pence, fen).
//! `rust_decimal` is used only at the edges: parsing decimal strings from
//! provider payloads and formatting amounts for display/metadata.
//!
//! Floating point never touches an amount.

use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use thiserror::Error;

/// Errors from parsing or scaling decimal amounts
#[derive(Debug, Error, PartialEq)]
pub enum MoneyError {
    #[error("Invalid amount format: '{0}'")]
    InvalidFormat(String),

    #[error("Amount must be greater than zero")]
    NonPositive,

    #[error("Amount precision exceeds currency minor units")]
    PrecisionOverflow,

    #[error("Amount out of range")]
    Overflow,
}

/// Number of minor-unit digits for a currency code.
///
/// Zero-decimal currencies follow the ISO 4217 exponent (and what the
/// payment providers themselves use on the wire).
pub fn currency_exponent(currency: &str) -> u32 {
    match currency {
        "JPY" | "KRW" | "VND" => 0,
        _ => 2,
    }
}

/// Parse a decimal string (e.g. "100.00") into minor units for `currency`.
///
/// Rejects non-positive values and values with more fractional digits than
/// the currency carries.
pub fn parse_minor_units(s: &str, currency: &str) -> Result<i64, MoneyError> {
    let dec = Decimal::from_str(s.trim()).map_err(|_| MoneyError::InvalidFormat(s.to_string()))?;

    if dec <= Decimal::ZERO {
        return Err(MoneyError::NonPositive);
    }

    let exponent = currency_exponent(currency);
    let scaled = dec * Decimal::from(10u64.pow(exponent));
    if scaled.fract() != Decimal::ZERO {
        return Err(MoneyError::PrecisionOverflow);
    }

    scaled.to_i64().ok_or(MoneyError::Overflow)
}

/// Format minor units back to a human-readable decimal string.
///
/// e.g. `(7000, "USD")` -> `"70.00"`, `(500, "JPY")` -> `"500"`.
pub fn format_minor_units(amount: i64, currency: &str) -> String {
    let exponent = currency_exponent(currency);
    let dec = Decimal::from(amount) / Decimal::from(10u64.pow(exponent));
    format!("{:.prec$}", dec, prec = exponent as usize)
}
