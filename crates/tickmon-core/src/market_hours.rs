//! Market-hours calendar.
//!
//! Pure weekday/time-of-day classification in local exchange time.
//! Used for:
//! - Market clock broadcast state
//! - Registry polling lifecycle
//! - Algo snapshot persistence gating

use chrono::{Datelike, Local, NaiveDateTime, Timelike, Weekday};

/// Market open, minutes from midnight (09:00 local).
pub const MARKET_OPEN_MINUTE: u32 = 9 * 60;

/// Market close, minutes from midnight (16:00 local).
/// The close minute itself is inside the session.
pub const MARKET_CLOSE_MINUTE: u32 = 16 * 60;

/// Check if the market is open right now (local wall clock).
#[must_use]
pub fn is_open_now() -> bool {
    is_open_at(Local::now().naive_local())
}

/// Check if the market is open at a given local datetime.
///
/// Open iff the weekday is Monday–Friday and the minute of day lies in
/// `[09:00, 16:00]`, both boundaries inclusive.
#[must_use]
pub fn is_open_at(dt: NaiveDateTime) -> bool {
    if matches!(dt.weekday(), Weekday::Sat | Weekday::Sun) {
        return false;
    }

    let minute_of_day = dt.hour() * 60 + dt.minute();
    (MARKET_OPEN_MINUTE..=MARKET_CLOSE_MINUTE).contains(&minute_of_day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn local(year: i32, month: u32, day: u32, hour: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(hour, min, 0)
            .unwrap()
    }

    #[test]
    fn test_saturday_closed_all_day() {
        // 2026-02-07 is Saturday
        assert!(!is_open_at(local(2026, 2, 7, 0, 0)));
        assert!(!is_open_at(local(2026, 2, 7, 10, 30)));
        assert!(!is_open_at(local(2026, 2, 7, 23, 59)));
    }

    #[test]
    fn test_sunday_closed_all_day() {
        // 2026-02-08 is Sunday
        assert!(!is_open_at(local(2026, 2, 8, 9, 0)));
        assert!(!is_open_at(local(2026, 2, 8, 12, 0)));
        assert!(!is_open_at(local(2026, 2, 8, 16, 0)));
    }

    #[test]
    fn test_weekday_open_boundary_inclusive() {
        // 2026-02-09 is Monday
        assert!(is_open_at(local(2026, 2, 9, 9, 0)));
        assert!(!is_open_at(local(2026, 2, 9, 8, 59)));
    }

    #[test]
    fn test_weekday_close_boundary_inclusive() {
        assert!(is_open_at(local(2026, 2, 9, 16, 0)));
        assert!(!is_open_at(local(2026, 2, 9, 16, 1)));
    }

    #[test]
    fn test_weekday_midsession_open() {
        // 2026-02-10 is Tuesday, 2026-02-13 is Friday
        assert!(is_open_at(local(2026, 2, 10, 11, 15)));
        assert!(is_open_at(local(2026, 2, 13, 15, 59)));
    }

    #[test]
    fn test_weekday_overnight_closed() {
        assert!(!is_open_at(local(2026, 2, 10, 0, 0)));
        assert!(!is_open_at(local(2026, 2, 10, 20, 0)));
    }
}
