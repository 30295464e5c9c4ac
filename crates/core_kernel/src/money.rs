//! Currency amounts with precise decimal arithmetic
//!
//! Claim costs are plain amounts in a single currency, held as `rust_decimal`
//! values so that totals never drift. This module owns the conversions between
//! those values and the free-text a human types into a cost field.

use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

/// Labor is billed at a flat rate of 100 currency units per hour
pub const LABOR_RATE_PER_HOUR: Decimal = Decimal::ONE_HUNDRED;

/// Errors that can occur while reading an amount
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Amount must not be negative: {0}")]
    Negative(String),
}

/// Parses a strictly formatted amount such as `"1,250.50"` or `"$300"`
///
/// Thousands separators, a leading currency symbol and surrounding whitespace
/// are accepted. Anything else is rejected.
pub fn parse_amount(text: &str) -> Result<Decimal, MoneyError> {
    let cleaned: String = text
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',')
        .collect();

    if cleaned.is_empty() {
        return Err(MoneyError::InvalidAmount(text.to_string()));
    }

    let amount = Decimal::from_str(&cleaned)
        .map_err(|_| MoneyError::InvalidAmount(text.to_string()))?;

    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(MoneyError::Negative(text.to_string()));
    }

    Ok(amount)
}

/// Leniently reads an amount typed into an override field
///
/// Keeps only digits and the first decimal point, so the result is never
/// negative. Empty or unreadable input reads as zero.
pub fn parse_formatted_amount(text: &str) -> Decimal {
    let numeric = numeric_chars(text);
    let mut parts = numeric.splitn(3, '.');
    let integer = parts.next().unwrap_or_default();
    let fraction = parts.next().unwrap_or_default();

    let candidate = match (integer.is_empty(), fraction.is_empty()) {
        (true, true) => return Decimal::ZERO,
        (true, false) => format!("0.{fraction}"),
        (false, true) => integer.to_string(),
        (false, false) => format!("{integer}.{fraction}"),
    };

    Decimal::from_str(&candidate).unwrap_or(Decimal::ZERO)
}

/// Normalises override input for display: `"1234567.891"` becomes `"1,234,567.89"`
///
/// Non-numeric characters are dropped, the integer part gets thousands
/// separators and the fraction is capped at two digits. Empty input stays empty.
pub fn format_amount_input(text: &str) -> String {
    let numeric = numeric_chars(text);
    if numeric.is_empty() {
        return String::new();
    }

    let mut parts = numeric.split('.');
    let integer = parts.next().unwrap_or_default();
    let fraction = parts.next().unwrap_or_default();

    let grouped = group_thousands(integer);
    if fraction.is_empty() {
        grouped
    } else {
        let capped: String = fraction.chars().take(2).collect();
        format!("{grouped}.{capped}")
    }
}

/// Formats an amount with thousands separators and a fixed number of decimals
pub fn format_amount(amount: Decimal, decimals: u32) -> String {
    let rounded = amount.round_dp(decimals);
    let rendered = format!("{:.*}", decimals as usize, rounded);
    let (sign, unsigned) = match rendered.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", rendered.as_str()),
    };

    match unsigned.split_once('.') {
        Some((integer, fraction)) => format!("{sign}{}.{fraction}", group_thousands(integer)),
        None => format!("{sign}{}", group_thousands(unsigned)),
    }
}

/// Labor hours implied by a labor cost at the flat hourly rate
pub fn labor_hours_for(labor_cost: Decimal) -> Decimal {
    labor_cost / LABOR_RATE_PER_HOUR
}

fn numeric_chars(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect()
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut grouped = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}
