//! Date parsing for vendor exports.
//!
//! Bloomberg exports use `dd-mm-YYYY`, market data uses ISO dates and
//! hand-edited sheets use slashes, so parsing walks a list of formats.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

const MONTH_FIRST_FORMATS: &[&str] = &["%d-%m-%Y", "%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%Y/%m/%d"];
const DAY_FIRST_FORMATS: &[&str] = &["%d-%m-%Y", "%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d-%m-%Y %H:%M:%S"];

/// Parse a date in any of the supported formats.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    parse_with(s, MONTH_FIRST_FORMATS)
}

/// Like [`parse_date`] but resolves `a/b/Y` as day/month first.
pub fn parse_date_dayfirst(s: &str) -> Option<NaiveDate> {
    parse_with(s, DAY_FIRST_FORMATS)
}

fn parse_with(s: &str, formats: &[&str]) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    for fmt in formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date);
        }
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }

    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive())
}

/// Parse a Bloomberg `dd-mm-YYYY` date only.
pub fn parse_dmy(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%d-%m-%Y").ok()
}

/// The same calendar day one year earlier, with 29 February mapped to the 28th.
pub fn previous_year(date: NaiveDate) -> (NaiveDate, i32) {
    let year = date.year() - 1;
    let prior = NaiveDate::from_ymd_opt(year, date.month(), date.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, date.month(), 28))
        .unwrap_or(date);
    (prior, year)
}

pub fn format_iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_formats() {
        assert_eq!(parse_date("15-03-2021"), Some(ymd(2021, 3, 15)));
        assert_eq!(parse_date("2021-03-15"), Some(ymd(2021, 3, 15)));
        assert_eq!(parse_date("03/15/2021"), Some(ymd(2021, 3, 15)));
        assert_eq!(parse_date("2021/03/15"), Some(ymd(2021, 3, 15)));
        assert_eq!(parse_date("2021-03-15 00:00:00"), Some(ymd(2021, 3, 15)));
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("not a date"), None);
    }

    #[test]
    fn test_ambiguous_slash_dates() {
        assert_eq!(parse_date("04/05/2021"), Some(ymd(2021, 4, 5)));
        assert_eq!(parse_date_dayfirst("04/05/2021"), Some(ymd(2021, 5, 4)));
    }

    #[test]
    fn test_previous_year() {
        assert_eq!(previous_year(ymd(2021, 6, 30)), (ymd(2020, 6, 30), 2020));
        assert_eq!(previous_year(ymd(2020, 2, 29)), (ymd(2019, 2, 28), 2019));
    }

    #[test]
    fn test_formatting() {
        assert_eq!(format_iso(ymd(2020, 1, 2)), "2020-01-02");
    }
}
