use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use super::{clean_str, Parsed};

static DIGITS_AND_DOT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+\.?\d*|\.\d+)$").expect("decimal regex"));

static NOT_DIGIT_OR_DOT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^0-9.]").expect("currency strip regex"));

/// Parse an unsigned digit string, optionally with a fractional part.
/// Fractions round half away from zero (`36.5` → 37).
pub fn parse_integer(raw: &str) -> Parsed<i64> {
    let Some(s) = clean_str(raw) else {
        return Parsed::Missing;
    };
    if !DIGITS_AND_DOT.is_match(s) {
        return Parsed::Invalid(raw.to_string());
    }
    match decimal_from_digits(s)
        .map(|d| d.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|d| d.to_i64())
    {
        Some(v) => Parsed::Value(v),
        None => Parsed::Invalid(raw.to_string()),
    }
}

/// Integer that must be strictly positive; zero counts as unreadable.
/// Used for loan terms, where `0` means "not recorded".
pub fn parse_positive_integer(raw: &str) -> Parsed<u32> {
    parse_integer(raw).and_then(raw, |v| u32::try_from(v).ok().filter(|v| *v > 0))
}

/// Integer clamped into `[0, ceiling]`.
pub fn parse_bounded_integer(raw: &str, ceiling: u32) -> Parsed<u32> {
    parse_integer(raw).map(|v| v.clamp(0, i64::from(ceiling)) as u32)
}

/// Parse a non-negative currency amount at 2 decimal places.
///
/// Currency symbols, thousands separators and other decoration are stripped
/// before parsing. A leading minus or accounting parentheses mark a negative
/// amount, which is never stored.
pub fn parse_currency(raw: &str) -> Parsed<Decimal> {
    let Some(s) = clean_str(raw) else {
        return Parsed::Missing;
    };
    let lead = s.find(|c: char| c.is_ascii_digit()).unwrap_or(s.len());
    if s[..lead].contains('-') || (s.starts_with('(') && s.ends_with(')')) {
        return Parsed::Invalid(raw.to_string());
    }

    let stripped = NOT_DIGIT_OR_DOT.replace_all(s, "");
    if stripped.is_empty() || !DIGITS_AND_DOT.is_match(&stripped) {
        return Parsed::Invalid(raw.to_string());
    }
    match decimal_from_digits(&stripped).and_then(to_cents) {
        Some(d) => Parsed::Value(d),
        None => Parsed::Invalid(raw.to_string()),
    }
}

/// Round to 2 dp and pin the scale there. Amounts too large to carry two
/// decimal places are refused rather than stored with fewer.
fn to_cents(d: Decimal) -> Option<Decimal> {
    let mut cents = d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    cents.rescale(2);
    (cents.scale() == 2).then_some(cents)
}

/// `s` must already match `DIGITS_AND_DOT`.
fn decimal_from_digits(s: &str) -> Option<Decimal> {
    let mut owned = String::with_capacity(s.len() + 2);
    if s.starts_with('.') {
        owned.push('0');
    }
    owned.push_str(s);
    if owned.ends_with('.') {
        owned.push('0');
    }
    Decimal::from_str(&owned).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn integers_round_half_away_from_zero() {
        assert_eq!(parse_integer("84"), Parsed::Value(84));
        assert_eq!(parse_integer("36.6"), Parsed::Value(37));
        assert_eq!(parse_integer("36.5"), Parsed::Value(37));
        assert_eq!(parse_integer("36.4"), Parsed::Value(36));
        assert_eq!(parse_integer("7."), Parsed::Value(7));
        assert_eq!(parse_integer(".5"), Parsed::Value(1));
    }

    #[test]
    fn integers_reject_signs_and_text() {
        for raw in ["-3", "+3", "3a", "1,000", "1.2.3", "."] {
            assert!(parse_integer(raw).is_invalid(), "{raw} should be invalid");
        }
        assert_eq!(parse_integer(" "), Parsed::Missing);
    }

    #[test]
    fn integer_overflow_is_invalid() {
        assert!(parse_integer("99999999999999999999999").is_invalid());
    }

    #[test]
    fn term_zero_is_invalid_not_zero() {
        assert_eq!(parse_positive_integer("0"), Parsed::Invalid("0".into()));
        assert_eq!(parse_positive_integer("0.4"), Parsed::Invalid("0.4".into()));
        assert_eq!(parse_positive_integer("36.6"), Parsed::Value(37));
        assert_eq!(parse_positive_integer(""), Parsed::Missing);
    }

    #[test]
    fn bounded_integers_clamp_to_ceiling() {
        assert_eq!(parse_bounded_integer("12", 9999), Parsed::Value(12));
        assert_eq!(parse_bounded_integer("0", 9999), Parsed::Value(0));
        assert_eq!(parse_bounded_integer("150000", 9999), Parsed::Value(9999));
        assert!(parse_bounded_integer("many", 9999).is_invalid());
    }

    #[test]
    fn currency_strips_decoration() {
        assert_eq!(parse_currency("$1,234.50"), Parsed::Value(dec("1234.50")));
        assert_eq!(parse_currency("1234.5"), Parsed::Value(dec("1234.50")));
        assert_eq!(parse_currency("$60,000.00 "), Parsed::Value(dec("60000")));
        assert_eq!(parse_currency("USD 10"), Parsed::Value(dec("10")));
        assert_eq!(parse_currency("0"), Parsed::Value(Decimal::ZERO));
    }

    #[test]
    fn currency_rounds_to_cents() {
        assert_eq!(parse_currency("10.005"), Parsed::Value(dec("10.01")));
        assert_eq!(parse_currency("10.004"), Parsed::Value(dec("10.00")));
    }

    #[test]
    fn currency_too_wide_for_cents_is_invalid() {
        assert!(parse_currency("79228162514264337593543950335").is_invalid());
        assert!(parse_currency("1234567890123456789012345678.99").is_invalid());
        let big = parse_currency("$123,456,789,012,345,678,901,234.56").value().unwrap();
        assert_eq!(big.scale(), 2);
        assert_eq!(big.mantissa(), 12_345_678_901_234_567_890_123_456);
    }

    #[test]
    fn currency_rejects_garbage_and_negatives() {
        assert_eq!(parse_currency("abc"), Parsed::Invalid("abc".into()));
        assert!(parse_currency("$").is_invalid());
        assert!(parse_currency("1.2.3").is_invalid());
        assert!(parse_currency("-500").is_invalid());
        assert!(parse_currency("($500.00)").is_invalid());
        assert!(parse_currency("-$500.00").is_invalid());
        assert_eq!(parse_currency(""), Parsed::Missing);
    }
}
