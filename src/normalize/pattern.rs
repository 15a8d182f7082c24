use super::{clean_str, Parsed};

/// How a rule inspects the (trimmed, uppercased) raw value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Matcher {
    Exact(&'static str),
    Contains(&'static str),
    /// Every fragment must appear somewhere in the value.
    ContainsAll(&'static [&'static str]),
    /// Value parses as a finite number below the bound.
    NumberBelow(f64),
    /// Value parses as a finite number at or above the bound.
    NumberAtLeast(f64),
}

impl Matcher {
    /// `value` must already be uppercased; patterns are written uppercase.
    fn matches(&self, value: &str) -> bool {
        match *self {
            Matcher::Exact(p) => value == p,
            Matcher::Contains(p) => value.contains(p),
            Matcher::ContainsAll(ps) => ps.iter().all(|p| value.contains(p)),
            Matcher::NumberBelow(bound) => as_number(value).is_some_and(|n| n < bound),
            Matcher::NumberAtLeast(bound) => as_number(value).is_some_and(|n| n >= bound),
        }
    }
}

fn as_number(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// One row of an ordered classification table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rule<E> {
    pub matcher: Matcher,
    pub value: E,
}

impl<E> Rule<E> {
    pub const fn new(matcher: Matcher, value: E) -> Self {
        Self { matcher, value }
    }
}

/// Evaluate `rules` top to bottom, case-insensitively, and return the value
/// of the first match. A non-blank value no rule accepts is `Invalid`.
pub fn classify<E: Copy>(raw: &str, rules: &[Rule<E>]) -> Parsed<E> {
    let Some(s) = clean_str(raw) else {
        return Parsed::Missing;
    };
    let upper = s.to_uppercase();
    rules
        .iter()
        .find(|r| r.matcher.matches(&upper))
        .map(|r| Parsed::Value(r.value))
        .unwrap_or_else(|| Parsed::Invalid(raw.to_string()))
}
