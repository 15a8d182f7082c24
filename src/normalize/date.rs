use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{clean_str, Parsed};

static SLASH_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{2,4})$").expect("slash date regex"));

/// Parse `MM/DD/YYYY` (1–2 digit month and day, 2–4 digit year) or
/// `YYYY-MM-DD...` (only the first 10 characters are read).
///
/// The shape decides which parser runs; a value of the right shape that is
/// not a real calendar day (`13/45/2020`) is still `Invalid`.
pub fn parse_date(raw: &str) -> Parsed<NaiveDate> {
    let Some(s) = clean_str(raw) else {
        return Parsed::Missing;
    };

    let parsed = if let Some(caps) = SLASH_DATE.captures(s) {
        let month: u32 = caps[1].parse().unwrap_or(0);
        let day: u32 = caps[2].parse().unwrap_or(0);
        let year = expand_year(&caps[3]);
        year.and_then(|y| NaiveDate::from_ymd_opt(y, month, day))
    } else {
        parse_iso_prefix(s)
    };

    match parsed {
        Some(d) => Parsed::Value(d),
        None => Parsed::Invalid(raw.to_string()),
    }
}

fn parse_iso_prefix(s: &str) -> Option<NaiveDate> {
    let head = s.get(..10)?;
    let b = head.as_bytes();
    let digits = |r: std::ops::Range<usize>| b[r].iter().all(u8::is_ascii_digit);
    if !(digits(0..4) && b[4] == b'-' && digits(5..7) && b[7] == b'-' && digits(8..10)) {
        return None;
    }
    let year: i32 = head[0..4].parse().ok()?;
    let month: u32 = head[5..7].parse().ok()?;
    let day: u32 = head[8..10].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Two-digit years: 00–69 → 20xx, 70–99 → 19xx. Three-digit years take
/// whichever of 1000+y / 2000+y lies nearest 2020.
fn expand_year(digits: &str) -> Option<i32> {
    let y: i32 = digits.parse().ok()?;
    match digits.len() {
        2 if y < 70 => Some(2000 + y),
        2 => Some(1900 + y),
        3 if y <= 520 => Some(2000 + y),
        3 => Some(1000 + y),
        _ => Some(y),
    }
}
