// Utility helpers for parsing, calendar buckets and number formatting.
//
// The loader leans on these so the stage functions can assume typed values.
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Slash and dash day/month layouts are read month-first; day-first is the
/// fallback when the first number cannot be a month.
const DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%m-%d-%Y",
    "%d-%m-%Y",
];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse a string-like value into `f64` while being forgiving about
/// formatting issues that are common in CSV exports.
///
/// - Trims whitespace.
/// - Rejects values that contain alphabetic characters (`NaN`, `n/a`, ...).
/// - Strips thousands separators like `","` before parsing.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let s = s.replace(",", "");
    s.parse::<f64>().ok()
}

/// Parse a calendar date, trying plain dates first and then date-times
/// (whose time part is discarded).
pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Truncate a date to the first day of its month.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    // Day 1 exists in every month, so `with_day(1)` cannot fail.
    date.with_day(1).unwrap_or(date)
}

/// English month name for `1..=12`; an empty string outside that range.
pub fn month_name(month_number: u32) -> &'static str {
    match month_number {
        1..=12 => MONTH_NAMES[(month_number - 1) as usize],
        _ => "",
    }
}

/// All twelve month names in calendar order.
pub fn month_names() -> &'static [&'static str; 12] {
    &MONTH_NAMES
}

pub fn average(v: &[f64]) -> f64 {
    // Standard arithmetic mean; returns 0 for an empty slice to avoid NaNs.
    if v.is_empty() {
        return 0.0;
    }
    let sum: f64 = v.iter().copied().sum();
    sum / v.len() as f64
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals plus thousands separators, e.g. `1,234,567.89`.
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        res.push('.');
        res.push_str(frac);
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
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_f64_safe_strips_separators() {
        assert_eq!(parse_f64_safe(Some(" 1,234.5 ")), Some(1234.5));
        assert_eq!(parse_f64_safe(Some("NaN")), None);
        assert_eq!(parse_f64_safe(Some("")), None);
        assert_eq!(parse_f64_safe(None), None);
    }

    #[test]
    fn test_parse_date_accepts_several_layouts() {
        assert_eq!(parse_date_safe(Some("2020-03-15")), Some(d(2020, 3, 15)));
        assert_eq!(parse_date_safe(Some("2020/03/15")), Some(d(2020, 3, 15)));
        assert_eq!(parse_date_safe(Some("03/15/2020")), Some(d(2020, 3, 15)));
        assert_eq!(parse_date_safe(Some("15/03/2020")), Some(d(2020, 3, 15)));
        assert_eq!(
            parse_date_safe(Some("2020-03-15 08:30:00")),
            Some(d(2020, 3, 15))
        );
    }

    #[test]
    fn test_ambiguous_slash_dates_are_month_first() {
        assert_eq!(parse_date_safe(Some("01/02/2020")), Some(d(2020, 1, 2)));
        assert_eq!(parse_date_safe(Some("01-02-2020")), Some(d(2020, 1, 2)));
        assert_eq!(parse_date_safe(Some("13-02-2020")), Some(d(2020, 2, 13)));
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert_eq!(parse_date_safe(Some("not a date")), None);
        assert_eq!(parse_date_safe(Some("2020-13-40")), None);
        assert_eq!(parse_date_safe(Some("   ")), None);
    }

    #[test]
    fn test_month_start_truncates() {
        assert_eq!(month_start(d(2021, 2, 28)), d(2021, 2, 1));
        assert_eq!(month_start(d(2021, 2, 1)), d(2021, 2, 1));
    }

    #[test]
    fn test_month_name_lookup() {
        assert_eq!(month_name(1), "January");
        assert_eq!(month_name(12), "December");
        assert_eq!(month_name(0), "");
        assert_eq!(month_name(13), "");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-42.0, 1), "-42.0");
        assert_eq!(format_number(7.0, 0), "7");
    }
}
