//! Time utilities for focusguard
//!
//! Everything in focusguard is accounted in whole minutes against the
//! local wall clock. Usage is bucketed by local calendar day.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `FOCUSGUARD_MOCK_TIME` environment variable can be
//! set to override the system time for all time-sensitive operations.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2025-12-25 14:30:00`)

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "FOCUSGUARD_MOCK_TIME";

/// Milliseconds in one accounting minute
pub const MINUTE_MS: i64 = 60_000;

/// Longest duration (in minutes) accepted for blocks and grants
pub const MAX_DURATION_MINUTES: u32 = 1440;

static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

#[allow(clippy::disallowed_methods)]
fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            if let Ok(mock_time_str) = std::env::var(MOCK_TIME_ENV_VAR) {
                match NaiveDateTime::parse_from_str(&mock_time_str, "%Y-%m-%d %H:%M:%S") {
                    Ok(naive_dt) => {
                        if let Some(mock_dt) = Local.from_local_datetime(&naive_dt).single() {
                            let offset = mock_dt.signed_duration_since(chrono::Local::now());
                            tracing::info!(
                                mock_time = %mock_time_str,
                                offset_secs = offset.num_seconds(),
                                "Mock time enabled"
                            );
                            return Some(offset);
                        }
                        tracing::warn!(
                            mock_time = %mock_time_str,
                            "Failed to convert mock time to local timezone"
                        );
                    }
                    Err(_) => {
                        tracing::warn!(
                            mock_time = %mock_time_str,
                            expected_format = "%Y-%m-%d %H:%M:%S",
                            "Invalid mock time format"
                        );
                    }
                }
            }
            None
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    get_mock_time_offset().is_some()
}

/// Get the current local time, respecting mock time settings in debug builds.
#[allow(clippy::disallowed_methods)]
pub fn now() -> DateTime<Local> {
    let real_now = chrono::Local::now();

    match get_mock_time_offset() {
        Some(offset) => real_now + offset,
        None => real_now,
    }
}

/// `dt + minutes`
pub fn add_minutes(dt: DateTime<Local>, minutes: u32) -> DateTime<Local> {
    dt + chrono::Duration::minutes(i64::from(minutes))
}

/// Whole minutes from `start` to `end`, floored; zero if `end` precedes `start`.
pub fn whole_minutes_between(start: DateTime<Local>, end: DateTime<Local>) -> u64 {
    let ms = end.signed_duration_since(start).num_milliseconds();
    if ms <= 0 { 0 } else { (ms / MINUTE_MS) as u64 }
}

/// Format minutes the way the stats views show them: `0m`, `45m`, `2h`, `1h 30m`
pub fn format_minutes(minutes: u64) -> String {
    let hours = minutes / 60;
    let mins = minutes % 60;

    match (hours, mins) {
        (0, m) => format!("{}m", m),
        (h, 0) => format!("{}h", h),
        (h, m) => format!("{}h {}m", h, m),
    }
}

/// Format a DateTime with full date and time.
pub fn format_datetime_full(dt: &DateTime<Local>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Local calendar day used to bucket usage statistics (`YYYY-MM-DD`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DayKey(String);

impl DayKey {
    const FORMAT: &'static str = "%Y-%m-%d";

    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.format(Self::FORMAT).to_string())
    }

    /// Day key of `dt` in local time
    pub fn of(dt: &DateTime<Local>) -> Self {
        Self::from_date(dt.date_naive())
    }

    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.0, Self::FORMAT).ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_whole_minutes_floor() {
        let t0 = at(2025, 3, 10, 9, 0, 0);
        assert_eq!(whole_minutes_between(t0, at(2025, 3, 10, 9, 0, 59)), 0);
        assert_eq!(whole_minutes_between(t0, at(2025, 3, 10, 9, 1, 0)), 1);
        assert_eq!(whole_minutes_between(t0, at(2025, 3, 10, 9, 7, 30)), 7);
    }

    #[test]
    fn test_whole_minutes_never_negative() {
        let t0 = at(2025, 3, 10, 9, 0, 0);
        assert_eq!(whole_minutes_between(t0, at(2025, 3, 10, 8, 0, 0)), 0);
    }

    #[test]
    fn test_add_minutes() {
        let t0 = at(2025, 3, 10, 23, 55, 0);
        assert_eq!(add_minutes(t0, 10), at(2025, 3, 11, 0, 5, 0));
    }

    #[test]
    fn test_format_minutes() {
        assert_eq!(format_minutes(0), "0m");
        assert_eq!(format_minutes(45), "45m");
        assert_eq!(format_minutes(120), "2h");
        assert_eq!(format_minutes(90), "1h 30m");
    }

    #[test]
    fn test_day_key_is_local_date() {
        let key = DayKey::of(&at(2025, 12, 25, 23, 59, 59));
        assert_eq!(key.as_str(), "2025-12-25");
        assert_eq!(key.date(), NaiveDate::from_ymd_opt(2025, 12, 25));

        let next = DayKey::of(&at(2025, 12, 26, 0, 0, 0));
        assert!(next > key);
    }

    #[test]
    fn test_format_datetime_full() {
        let dt = at(2025, 12, 25, 14, 30, 45);
        assert_eq!(format_datetime_full(&dt), "2025-12-25 14:30:45");
    }

    #[test]
    fn test_now_advances() {
        let t1 = now();
        std::thread::sleep(std::time::Duration::from_millis(20));
        let t2 = now();
        assert!(t2 > t1);
    }

    #[test]
    fn test_mock_time_format_parses() {
        assert!(NaiveDateTime::parse_from_str("2025-12-25 14:30:00", "%Y-%m-%d %H:%M:%S").is_ok());
        assert!(NaiveDateTime::parse_from_str("2025-12-25T14:30:00", "%Y-%m-%d %H:%M:%S").is_err());
    }
}
