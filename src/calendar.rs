//! Local calendar helpers
//!
//! Schedules and maintenances carry local wall-clock timestamps. Day comparisons
//! (conflicts, "today", reminders) are all done on the local calendar date.

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{AppError, AppResult};

/// Current local wall-clock time
pub fn now_local() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Current local calendar date
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// 12:00 on the given day; stored schedule starts never drift across midnight
pub fn noon(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN))
}

/// 00:00 on the given day
pub fn day_start(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// Parse a client supplied timestamp.
///
/// Accepts RFC 3339 (converted to local time), `YYYY-MM-DDTHH:MM[:SS]`,
/// `YYYY-MM-DD HH:MM[:SS]` and bare `YYYY-MM-DD` (midnight).
pub fn parse_datetime(input: &str) -> AppResult<NaiveDateTime> {
    let s = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Local).naive_local());
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(day_start)
        .map_err(|_| AppError::Validation(format!("Invalid date: {}", input)))
}

/// Parse the calendar date part (first 10 characters) of a client value
pub fn parse_date(input: &str) -> AppResult<NaiveDate> {
    let s = input.trim();
    let head = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(head, "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("Invalid date: {}", input)))
}

/// Whole calendar months between two dates, ignoring the day of month
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i32 {
    (to.year() - from.year()) * 12 + (to.month() as i32 - from.month() as i32)
}

/// First day of the month lying `months` months before `date`
pub fn first_of_month_before(date: NaiveDate, months: i32) -> Option<NaiveDate> {
    let index = date.year() * 12 + date.month0() as i32 - months;
    let year = index.div_euclid(12);
    let month = index.rem_euclid(12) as u32 + 1;
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// `[Jan 1 00:00, next Jan 1 00:00)` of the given year
pub fn year_bounds(year: i32) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
    let end = NaiveDate::from_ymd_opt(year + 1, 1, 1)?;
    Some((day_start(start), day_start(end)))
}

/// `YYYY-MM-DD`
pub fn ymd(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_noon_keeps_date() {
        let n = noon(d(2025, 3, 9));
        assert_eq!(n.date(), d(2025, 3, 9));
        assert_eq!(n.time(), NaiveTime::from_hms_opt(12, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_datetime_variants() {
        assert_eq!(parse_datetime("2025-03-09").unwrap(), day_start(d(2025, 3, 9)));
        assert_eq!(
            parse_datetime("2025-03-09T08:30").unwrap(),
            d(2025, 3, 9).and_hms_opt(8, 30, 0).unwrap()
        );
        assert_eq!(
            parse_datetime("2025-03-09 08:30:15").unwrap(),
            d(2025, 3, 9).and_hms_opt(8, 30, 15).unwrap()
        );
        assert!(parse_datetime("2025-03-09T08:30:00+00:00").is_ok());
        assert!(parse_datetime("not a date").is_err());
    }

    #[test]
    fn test_parse_date_takes_prefix() {
        assert_eq!(parse_date("2025-03-09T10:00:00Z").unwrap(), d(2025, 3, 9));
        assert!(parse_date("09/03/2025").is_err());
    }

    #[test]
    fn test_months_between() {
        assert_eq!(months_between(d(2020, 1, 31), d(2025, 2, 1)), 61);
        assert_eq!(months_between(d(2025, 2, 1), d(2025, 2, 28)), 0);
        assert_eq!(months_between(d(2024, 12, 15), d(2025, 1, 1)), 1);
    }

    #[test]
    fn test_first_of_month_before_crosses_years() {
        assert_eq!(first_of_month_before(d(2025, 3, 20), 24), Some(d(2023, 3, 1)));
        assert_eq!(first_of_month_before(d(2025, 3, 20), 5), Some(d(2024, 10, 1)));
        assert_eq!(first_of_month_before(d(2025, 3, 20), 0), Some(d(2025, 3, 1)));
    }

    #[test]
    fn test_year_bounds() {
        let (start, end) = year_bounds(2026).unwrap();
        assert_eq!(start, day_start(d(2026, 1, 1)));
        assert_eq!(end, day_start(d(2027, 1, 1)));
    }
}
