//! Time-related utilities

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

/// Export timestamp layout, e.g. `2024-01-01 23:00:00 +0800`
const EXPORT_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognized timestamp: {0:?}")]
pub struct TimestampError(pub String);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("a {days}-day window ending {end} starts before the earliest representable date")]
pub struct WindowError {
    pub end: NaiveDate,
    pub days: u32,
}

/// Parse an export timestamp.
///
/// Accepts the export layout (`YYYY-MM-DD HH:MM:SS ±HHMM`), RFC 3339 / ISO-8601
/// with an offset or `Z`, and offset-less ISO timestamps which are taken as UTC.
/// The recorded offset is kept so that calendar dates stay local to the wearer.
pub fn parse_timestamp(s: &str) -> Result<DateTime<FixedOffset>, TimestampError> {
    let s = s.trim();

    if let Ok(ts) = DateTime::parse_from_str(s, EXPORT_FORMAT) {
        return Ok(ts);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts);
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(naive.and_utc().fixed_offset());
        }
    }

    Err(TimestampError(s.to_string()))
}

/// Number of days in the given calendar month (0 for an invalid month)
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return 0;
    };
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    next.map(|n| (n - first).num_days() as u32).unwrap_or(31)
}

/// Number of days in the given calendar year
pub fn days_in_year(year: i32) -> u32 {
    (1..=12).map(|m| days_in_month(year, m)).sum()
}

/// Today's date in UTC
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// First day of the month containing `date`
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// First day of a window of `days` days that ends on `end` (inclusive)
pub fn window_start(end: NaiveDate, days: u32) -> Result<NaiveDate, WindowError> {
    let back = Duration::days(i64::from(days.saturating_sub(1)));
    end.checked_sub_signed(back)
        .ok_or(WindowError { end, days })
}

/// Months since year zero, so consecutive months differ by one
pub fn month_index(date: NaiveDate) -> i32 {
    date.year() * 12 + date.month0() as i32
}

/// Calendar months from the month of `first` through the month of `last`
pub fn months_spanned(first: NaiveDate, last: NaiveDate) -> u32 {
    (month_index(last) - month_index(first) + 1).max(0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_parse_export_format() {
        let ts = parse_timestamp("2024-01-01 23:00:00 +0800").unwrap();
        assert_eq!(ts.date_naive(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(ts.hour(), 23);
        assert_eq!(ts.offset().local_minus_utc(), 8 * 3600);
    }

    #[test]
    fn test_parse_iso_variants() {
        let z = parse_timestamp("2024-03-05T10:15:00Z").unwrap();
        assert_eq!(z.offset().local_minus_utc(), 0);

        let offset = parse_timestamp("2024-03-05T10:15:00-05:00").unwrap();
        assert_eq!(offset.offset().local_minus_utc(), -5 * 3600);

        let naive = parse_timestamp("2024-03-05T10:15:00").unwrap();
        assert_eq!(naive.hour(), 10);

        let spaced = parse_timestamp("2024-03-05 10:15:00").unwrap();
        assert_eq!(spaced, naive);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_timestamp("yesterday").is_err());
        assert!(parse_timestamp("2024-13-45 10:00:00 +0000").is_err());
        assert!(parse_timestamp("").is_err());
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(2023, 12), 31);
        assert_eq!(days_in_month(2023, 4), 30);
        assert_eq!(days_in_month(2023, 13), 0);
    }

    #[test]
    fn test_days_in_year() {
        assert_eq!(days_in_year(2024), 366);
        assert_eq!(days_in_year(2023), 365);
    }

    #[test]
    fn test_window_start() {
        let end = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert_eq!(window_start(end, 1).unwrap(), end);
        assert_eq!(
            window_start(end, 10).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
    }

    #[test]
    fn test_window_start_before_min_date_is_an_error() {
        let end = NaiveDate::MIN + Duration::days(3);
        assert_eq!(window_start(end, 4).unwrap(), NaiveDate::MIN);
        assert_eq!(window_start(end, 5), Err(WindowError { end, days: 5 }));
        assert!(window_start(end, u32::MAX).is_err());
    }

    #[test]
    fn test_months_spanned() {
        let d = |y, m| NaiveDate::from_ymd_opt(y, m, 15).unwrap();
        assert_eq!(months_spanned(d(2024, 1), d(2024, 1)), 1);
        assert_eq!(months_spanned(d(2023, 11), d(2024, 2)), 4);
        assert_eq!(months_spanned(d(2019, 1), d(2024, 6)), 66);
        assert_eq!(months_spanned(d(2024, 6), d(2024, 1)), 0);
    }
}
