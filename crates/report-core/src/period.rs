//! Reporting-period selection.
//!
//! Turns the `--period` argument into the inclusive `[start, end]` date range
//! passed to the actions endpoint.

use std::fmt;
use std::sync::OnceLock;

use chrono::{Duration, Months, NaiveDate};
use regex::Regex;

use crate::error::{ReportError, Result};

/// Label used in file names for a custom `start,end` period.
pub const CUSTOM_LABEL: &str = "custom";

/// A resolved reporting period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPeriod {
    /// Short label (`30d`, `60d`, `90d`, `1y` or `custom`).
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReportPeriod {
    /// Start date as `YYYY-MM-DD`.
    pub fn start_str(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    /// End date as `YYYY-MM-DD`.
    pub fn end_str(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }
}

impl fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} to {})", self.label, self.start_str(), self.end_str())
    }
}

fn custom_range_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(\d{4}-\d{2}-\d{2})\s*,\s*(\d{4}-\d{2}-\d{2})\s*$")
            .expect("static regex is valid")
    })
}

/// Parse a period selector relative to `today`.
///
/// Accepted forms: `30d`, `60d`, `90d`, `1y` (also the long spellings
/// `30days`, `60days`, `90days`, `1year`) and a custom `start,end` pair of
/// ISO dates. Presets end on `today`.
pub fn parse_period(input: &str, today: NaiveDate) -> Result<ReportPeriod> {
    let trimmed = input.trim().trim_matches(|c| c == '"' || c == '\'');

    let preset = match trimmed.to_lowercase().as_str() {
        "30d" | "30days" => Some(("30d", today - Duration::days(30))),
        "60d" | "60days" => Some(("60d", today - Duration::days(60))),
        "90d" | "90days" => Some(("90d", today - Duration::days(90))),
        "1y" | "1year" => {
            let start = today
                .checked_sub_months(Months::new(12))
                .ok_or_else(|| ReportError::InvalidPeriod(input.to_string()))?;
            Some(("1y", start))
        }
        _ => None,
    };

    if let Some((label, start)) = preset {
        return Ok(ReportPeriod {
            label: label.to_string(),
            start,
            end: today,
        });
    }

    let caps = custom_range_re()
        .captures(trimmed)
        .ok_or_else(|| ReportError::InvalidPeriod(input.to_string()))?;

    let parse = |s: &str| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| ReportError::InvalidPeriod(input.to_string()))
    };
    let start = parse(&caps[1])?;
    let end = parse(&caps[2])?;

    if start > end {
        return Err(ReportError::InvalidPeriod(format!(
            "{} (start date is after end date)",
            input
        )));
    }

    Ok(ReportPeriod {
        label: CUSTOM_LABEL.to_string(),
        start,
        end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_parse_30d() {
        let p = parse_period("30d", day("2024-03-31")).unwrap();
        assert_eq!(p.label, "30d");
        assert_eq!(p.start_str(), "2024-03-01");
        assert_eq!(p.end_str(), "2024-03-31");
    }

    #[test]
    fn test_parse_60d_and_90d() {
        let today = day("2024-06-30");
        assert_eq!(parse_period("60d", today).unwrap().start, day("2024-05-01"));
        assert_eq!(parse_period("90d", today).unwrap().start, day("2024-04-01"));
    }

    #[test]
    fn test_parse_1y_handles_leap_day() {
        let p = parse_period("1y", day("2024-02-29")).unwrap();
        assert_eq!(p.label, "1y");
        assert_eq!(p.start, day("2023-02-28"));
    }

    #[test]
    fn test_parse_long_spellings() {
        let today = day("2024-03-31");
        assert_eq!(parse_period("30days", today).unwrap().label, "30d");
        assert_eq!(parse_period("1year", today).unwrap().label, "1y");
    }

    #[test]
    fn test_parse_custom_range() {
        let p = parse_period("2024-01-01, 2024-01-31", day("2024-06-01")).unwrap();
        assert_eq!(p.label, CUSTOM_LABEL);
        assert_eq!(p.start, day("2024-01-01"));
        assert_eq!(p.end, day("2024-01-31"));
    }

    #[test]
    fn test_parse_strips_quotes() {
        let p = parse_period("\"90d\"", day("2024-06-30")).unwrap();
        assert_eq!(p.label, "90d");
    }

    #[test]
    fn test_parse_custom_reversed_is_error() {
        let err = parse_period("2024-02-01,2024-01-01", day("2024-06-01")).unwrap_err();
        assert!(matches!(err, ReportError::InvalidPeriod(_)));
    }

    #[test]
    fn test_parse_custom_impossible_date_is_error() {
        assert!(parse_period("2024-02-30,2024-03-01", day("2024-06-01")).is_err());
    }

    #[test]
    fn test_parse_unknown_is_error() {
        assert!(parse_period("45d", day("2024-06-01")).is_err());
        assert!(parse_period("", day("2024-06-01")).is_err());
    }

    #[test]
    fn test_display() {
        let p = parse_period("30d", day("2024-03-31")).unwrap();
        assert_eq!(p.to_string(), "30d (2024-03-01 to 2024-03-31)");
    }
}
