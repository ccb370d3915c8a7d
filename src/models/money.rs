use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

/// Largest amount a single transaction may carry.
pub(crate) const MAX_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Parse user input into a positive amount with two-decimal precision.
/// Returns `None` for empty, non-numeric, zero, negative or over-limit input.
pub(crate) fn parse_amount(input: &str) -> Option<Decimal> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    let value = Decimal::from_str(trimmed).ok()?;
    if value > MAX_AMOUNT {
        return None;
    }
    let value = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    (value > Decimal::ZERO).then(|| value.normalize())
}

/// Format a decimal amount with thousand separators and 2 decimal places.
/// e.g. `1234567.89` → `"$1,234,567.89"`
pub(crate) fn format_money(val: Decimal) -> String {
    let abs = val.abs();
    let formatted = format!("{abs:.2}");
    let mut parts = formatted.split('.');
    let int_part = parts.next().unwrap_or("0");
    let dec_part = parts.next().unwrap_or("00");

    let with_commas: String = int_part
        .as_bytes()
        .rchunks(3)
        .rev()
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or(""))
        .collect::<Vec<_>>()
        .join(",");

    if val < Decimal::ZERO {
        format!("-${with_commas}.{dec_part}")
    } else {
        format!("${with_commas}.{dec_part}")
    }
}
