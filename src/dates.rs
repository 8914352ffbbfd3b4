//! Date utilities and the edit-window rule
//!
//! Entries are keyed by local calendar date. Only today and the six days
//! before it may be created or deleted; older days are view-only and
//! future days are never editable.

use chrono::{Duration, Local, NaiveDate};

/// Number of days (today included) during which an entry can be changed.
pub const EDIT_WINDOW_DAYS: i64 = 7;

/// ISO 8601 calendar date format used for storage keys and file names.
pub const ISO_FORMAT: &str = "%Y-%m-%d";

/// Source of "today".
///
/// The store evaluates every date rule through a clock so tests can pin
/// the current day.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Local wall-clock date.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Clock frozen on a given day.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Current local calendar date.
pub fn today() -> NaiveDate {
    SystemClock.today()
}

pub fn to_iso(date: NaiveDate) -> String {
    date.format(ISO_FORMAT).to_string()
}

/// Parse a strict `YYYY-MM-DD` string.
pub fn parse_iso(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(value, ISO_FORMAT).ok()
}

pub fn add_days(date: NaiveDate, delta: i64) -> NaiveDate {
    date + Duration::days(delta)
}

pub fn previous_day(date: NaiveDate) -> NaiveDate {
    add_days(date, -1)
}

pub fn next_day(date: NaiveDate) -> NaiveDate {
    add_days(date, 1)
}

/// Whole days from `from` to `to` (positive when `to` is later).
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

pub fn is_future(date: NaiveDate) -> bool {
    is_future_on(date, today())
}

pub fn is_future_on(date: NaiveDate, today: NaiveDate) -> bool {
    date > today
}

pub fn is_editable(date: NaiveDate) -> bool {
    is_editable_on(date, today())
}

/// True iff `date` is today or one of the six days before it.
pub fn is_editable_on(date: NaiveDate, today: NaiveDate) -> bool {
    let age = days_between(date, today);
    (0..EDIT_WINDOW_DAYS).contains(&age)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_edit_window_bounds() {
        let today = d(2025, 3, 10);

        assert!(is_editable_on(today, today));
        assert!(is_editable_on(d(2025, 3, 4), today));
        assert!(!is_editable_on(d(2025, 3, 3), today));
        assert!(!is_editable_on(d(2025, 3, 11), today));
    }

    #[test]
    fn test_edit_window_matches_day_delta() {
        let today = d(2025, 1, 3);
        for delta in -10..=20 {
            let date = add_days(today, -delta);
            assert_eq!(is_editable_on(date, today), (0..=6).contains(&delta), "delta {}", delta);
        }
    }

    #[test]
    fn test_future_dates_are_never_editable() {
        let today = d(2024, 12, 31);
        let tomorrow = next_day(today);

        assert!(is_future_on(tomorrow, today));
        assert!(!is_editable_on(tomorrow, today));
        assert!(!is_future_on(today, today));
    }

    #[test]
    fn test_iso_round_trip_across_month_boundary() {
        let date = parse_iso("2025-03-01").unwrap();
        assert_eq!(to_iso(previous_day(date)), "2025-02-28");
        assert_eq!(to_iso(add_days(date, 31)), "2025-04-01");
    }

    #[test]
    fn test_parse_iso_rejects_garbage() {
        assert!(parse_iso("2025-3-1").is_none());
        assert!(parse_iso("2025-02-30").is_none());
        assert!(parse_iso("file:///tmp/x.jpg").is_none());
        assert!(parse_iso("").is_none());
    }

    #[test]
    fn test_system_clock_agrees_with_free_functions() {
        let now = today();
        assert!(is_editable(now));
        assert!(!is_future(now));
    }
}
