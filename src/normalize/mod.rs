// src/normalize/mod.rs
//! Raw text to typed value coercions, one function per field kind.
//!
//! Nothing in here fails: every function answers with a [`Parsed`], and a
//! value that cannot be read comes back as [`Parsed::Invalid`] together with
//! the original text so callers can report it.

pub mod date;
pub mod number;
pub mod pattern;
pub mod text;

pub use date::parse_date;
pub use number::{
    parse_bounded_integer, parse_currency, parse_integer, parse_positive_integer,
};
pub use pattern::{classify, Matcher, Rule};
pub use text::{parse_naics, parse_state_code, parse_text};

/// Outcome of normalizing one raw field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed<T> {
    Value(T),
    /// Absent from the row or blank after trimming.
    Missing,
    /// Present but unreadable; carries the raw text.
    Invalid(String),
}

impl<T> Parsed<T> {
    pub fn value(self) -> Option<T> {
        match self {
            Parsed::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Parsed::Invalid(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Parsed<U> {
        match self {
            Parsed::Value(v) => Parsed::Value(f(v)),
            Parsed::Missing => Parsed::Missing,
            Parsed::Invalid(raw) => Parsed::Invalid(raw),
        }
    }

    /// Chain a further check on a parsed value; `None` turns it invalid.
    pub fn and_then<U>(self, raw: &str, f: impl FnOnce(T) -> Option<U>) -> Parsed<U> {
        match self {
            Parsed::Value(v) => match f(v) {
                Some(u) => Parsed::Value(u),
                None => Parsed::Invalid(raw.to_string()),
            },
            Parsed::Missing => Parsed::Missing,
            Parsed::Invalid(raw) => Parsed::Invalid(raw),
        }
    }
}

/// Trim whitespace and strip one pair of outer quotes, if present.
/// Returns `None` when nothing is left.
pub(crate) fn clean_str(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    let unquoted = if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].trim()
    } else {
        trimmed
    };
    if unquoted.is_empty() {
        None
    } else {
        Some(unquoted)
    }
}
