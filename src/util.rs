// Utility helpers for value coercion and display formatting.
//
// This module centralizes all the "dirty" spreadsheet/number/date handling
// so the rest of the code can assume clean, typed values.
use chrono::NaiveDate;
use num_format::{Locale, ToFormattedString};

/// Coerce a raw cell value into `f64` while being forgiving about the
/// formatting found in real Tally/Excel exports (currency symbols, commas,
/// stray text).
///
/// - Strips every character except digits, `.` and `-` before parsing.
/// - `"₹1,234.50"` becomes `1234.5`; `"N/A"` and `""` become `0.0`.
/// - Never returns NaN and never fails; unparsable input is `0.0`.
pub fn coerce_number(s: &str) -> f64 {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return 0.0;
    }
    let v = cleaned.parse::<f64>().unwrap_or(0.0);
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Parse a date out of whatever representation the source used.
///
/// Tally XML exports write `YYYYMMDD`; spreadsheet exports carry
/// `YYYY-MM-DD` or `DD-MM-YYYY`. Each format is tried in order and an
/// unparsable value is simply `None` rather than an error.
pub fn parse_date_lenient(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in ["%Y%m%d", "%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    None
}

/// Case-insensitive check for the summary-line markers that Tally
/// appends to exported tables. "total" as a substring also covers the
/// grand/sub/overall variants.
pub fn contains_total_marker(s: &str) -> bool {
    s.to_lowercase().contains("total")
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Format a floating-point value with:
    // - a fixed number of decimal places, and
    // - locale-aware thousands separators (e.g., `1,234,567.89`).
    let neg = n.is_sign_negative();
    let abs_n = n.abs();
    // First, format to a plain fixed-decimal string like `1234567.89`.
    let s = format!("{:.*}", decimals, abs_n);
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    // Use `num-format` to insert commas into the integer portion.
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    } else if decimals > 0 {
        res.push('.');
        res.push_str(&"0".repeat(decimals));
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Thin wrapper around `num-format` for integer-like values, used for
    // counts in console messages (e.g., `9,855 rows imported`).
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_number_strips_currency_noise() {
        assert_eq!(coerce_number("₹1,234.50"), 1234.5);
        assert_eq!(coerce_number(" 42 "), 42.0);
        assert_eq!(coerce_number("-7.25"), -7.25);
    }

    #[test]
    fn coerce_number_defaults_to_zero() {
        assert_eq!(coerce_number("N/A"), 0.0);
        assert_eq!(coerce_number(""), 0.0);
        assert_eq!(coerce_number("--"), 0.0);
    }

    #[test]
    fn parse_date_accepts_tally_and_spreadsheet_forms() {
        let d = NaiveDate::from_ymd_opt(2023, 4, 1).unwrap();
        assert_eq!(parse_date_lenient("20230401"), Some(d));
        assert_eq!(parse_date_lenient("2023-04-01"), Some(d));
        assert_eq!(parse_date_lenient("01-04-2023"), Some(d));
        assert_eq!(parse_date_lenient("April fools"), None);
    }

    #[test]
    fn total_markers_are_case_insensitive() {
        assert!(contains_total_marker("Grand Total"));
        assert!(contains_total_marker("SUB TOTAL"));
        assert!(contains_total_marker("running Total row"));
        assert!(!contains_total_marker("Totapur Traders"));
    }
}
