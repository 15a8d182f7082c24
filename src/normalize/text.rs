use super::{clean_str, Parsed};

/// Trimmed free text capped at `max_chars` characters.
pub fn parse_text(raw: &str, max_chars: usize) -> Parsed<String> {
    match clean_str(raw) {
        Some(s) => Parsed::Value(s.chars().take(max_chars).collect()),
        None => Parsed::Missing,
    }
}

/// Uppercased first two characters of the trimmed value.
///
/// Only the shape is checked here (two ASCII letters); whether the code is a
/// real state is a quality check done later.
pub fn parse_state_code(raw: &str) -> Parsed<String> {
    let Some(s) = clean_str(raw) else {
        return Parsed::Missing;
    };
    let code: String = s.chars().take(2).collect::<String>().to_uppercase();
    if code.len() == 2 && code.chars().all(|c| c.is_ascii_uppercase()) {
        Parsed::Value(code)
    } else {
        Parsed::Invalid(raw.to_string())
    }
}

/// NAICS code of 2 to 6 digits. Spreadsheet exports that wrote the code as
/// a float (`722511.0`) are accepted when the fraction is all zeros.
pub fn parse_naics(raw: &str) -> Parsed<String> {
    let Some(s) = clean_str(raw) else {
        return Parsed::Missing;
    };
    let code = match s.split_once('.') {
        Some((int, frac)) if frac.chars().all(|c| c == '0') => int,
        Some(_) => return Parsed::Invalid(raw.to_string()),
        None => s,
    };
    if (2..=6).contains(&code.len()) && code.chars().all(|c| c.is_ascii_digit()) {
        Parsed::Value(code.to_string())
    } else {
        Parsed::Invalid(raw.to_string())
    }
}
