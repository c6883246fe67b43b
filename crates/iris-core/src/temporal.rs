//! # Temporal Types: UTC-Only Timestamps
//!
//! Defines `Timestamp`, a UTC-only timestamp truncated to seconds
//! precision. History rows, deadlines and alarm evaluation all use it, so
//! two values that render identically always compare equal.
//!
//! Non-UTC inputs are **rejected** by [`Timestamp::parse()`]; use
//! [`Timestamp::parse_lenient()`] when ingesting external data.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::IrisError;

/// A UTC-only timestamp, truncated to seconds precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp from the current UTC time, truncated to seconds.
    ///
    /// Engine code takes time from a [`crate::Clock`]; this is what
    /// [`crate::SystemClock`] calls.
    pub fn now() -> Self {
        Self(truncate_to_seconds(Utc::now()))
    }

    /// The latest representable instant. Any forward shift from it is out
    /// of range.
    pub fn latest() -> Self {
        Self(truncate_to_seconds(DateTime::<Utc>::MAX_UTC))
    }

    /// Create a timestamp from a `chrono::DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_seconds(dt))
    }

    /// Parse a timestamp from an RFC 3339 string with a `Z` suffix.
    ///
    /// # Errors
    ///
    /// Returns [`IrisError::Validation`] if the string is not valid RFC 3339
    /// or uses a non-Z offset (even `+00:00`).
    pub fn parse(s: &str) -> Result<Self, IrisError> {
        if !s.ends_with('Z') {
            return Err(IrisError::Validation(format!(
                "timestamp must use Z suffix (UTC only), got: {s:?}"
            )));
        }
        Self::parse_lenient(s)
    }

    /// Parse an RFC 3339 string with any offset, converting to UTC.
    pub fn parse_lenient(s: &str) -> Result<Self, IrisError> {
        let dt = DateTime::parse_from_rfc3339(s).map_err(|e| {
            IrisError::Validation(format!("invalid RFC 3339 timestamp {s:?}: {e}"))
        })?;
        Ok(Self(truncate_to_seconds(dt.with_timezone(&Utc))))
    }

    /// Create a timestamp from a Unix epoch timestamp (seconds).
    pub fn from_epoch_secs(secs: i64) -> Result<Self, IrisError> {
        let dt = DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| IrisError::Validation(format!("invalid Unix timestamp: {secs}")))?;
        Ok(Self(dt))
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Returns the Unix epoch timestamp in seconds.
    pub fn epoch_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// This instant shifted by a number of calendar days (may be negative).
    ///
    /// `None` when the result falls outside the representable range.
    pub fn checked_plus_days(&self, days: i64) -> Option<Self> {
        let delta = Duration::try_days(days)?;
        self.0.checked_add_signed(delta).map(Self)
    }

    /// This instant shifted forward by `days` working days.
    ///
    /// Saturdays and Sundays are skipped; the time of day is preserved.
    /// A start on a weekend counts from the following Monday. `None` when
    /// the result falls outside the representable range.
    pub fn checked_plus_business_days(&self, days: u32) -> Option<Self> {
        let mut current = *self;
        while is_weekend(current.0.weekday()) {
            current = current.checked_plus_days(1)?;
        }
        // Five working days from a weekday is the same weekday next week.
        current = current.checked_plus_days(i64::from(days / 5) * 7)?;
        let mut remaining = days % 5;
        while remaining > 0 {
            current = current.checked_plus_days(1)?;
            if !is_weekend(current.0.weekday()) {
                remaining -= 1;
            }
        }
        Some(current)
    }

    /// Whole days elapsed from `earlier` to `self` (negative if `earlier` is later).
    pub fn whole_days_since(&self, earlier: &Timestamp) -> i64 {
        (self.0 - earlier.0).num_days()
    }

    /// Render as ISO8601 with Z suffix (e.g., `2026-01-15T12:00:00Z`).
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

impl std::str::FromStr for Timestamp {
    type Err = IrisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn is_weekend(day: Weekday) -> bool {
    matches!(day, Weekday::Sat | Weekday::Sun)
}

/// Truncate a `DateTime<Utc>` to seconds precision (discard nanoseconds).
fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    #[test]
    fn test_now_has_no_subseconds() {
        let now = Timestamp::now();
        assert_eq!(now.as_datetime().nanosecond(), 0);
    }

    #[test]
    fn test_from_utc_truncates() {
        let dt = Utc.with_ymd_and_hms(2026, 1, 15, 12, 30, 45).unwrap();
        let stamped = Timestamp::from_utc(dt.with_nanosecond(123_456_789).unwrap());
        assert_eq!(stamped.to_iso8601(), "2026-01-15T12:30:45Z");
    }

    #[test]
    fn test_parse_rejects_offsets() {
        assert!(Timestamp::parse("2026-01-15T12:00:00+00:00").is_err());
        assert!(Timestamp::parse("2026-01-15T08:00:00-04:00").is_err());
        assert!(Timestamp::parse("not-a-date").is_err());
        assert!(Timestamp::parse("").is_err());
    }

    #[test]
    fn test_parse_lenient_converts_offset() {
        let parsed = Timestamp::parse_lenient("2026-01-15T17:00:00+05:00").unwrap();
        assert_eq!(parsed.to_iso8601(), "2026-01-15T12:00:00Z");
    }

    #[test]
    fn test_plus_days() {
        let start = ts("2026-03-01T09:00:00Z");
        assert_eq!(start.checked_plus_days(10).unwrap().to_iso8601(), "2026-03-11T09:00:00Z");
        assert_eq!(start.checked_plus_days(-1).unwrap().to_iso8601(), "2026-02-28T09:00:00Z");
    }

    #[test]
    fn test_plus_days_out_of_range() {
        let start = ts("2026-03-01T09:00:00Z");
        assert_eq!(start.checked_plus_days(200_000_000), None);
        assert_eq!(start.checked_plus_days(i64::MAX), None);
        assert_eq!(start.checked_plus_days(i64::MIN), None);
    }

    #[test]
    fn test_plus_business_days_skips_weekend() {
        // 2026-03-06 is a Friday.
        let friday = ts("2026-03-06T10:00:00Z");
        let plus = |days| friday.checked_plus_business_days(days).unwrap().to_iso8601();
        assert_eq!(plus(1), "2026-03-09T10:00:00Z");
        assert_eq!(plus(5), "2026-03-13T10:00:00Z");
        assert_eq!(plus(7), "2026-03-17T10:00:00Z");
        assert_eq!(plus(10), "2026-03-20T10:00:00Z");
        assert_eq!(friday.checked_plus_business_days(0), Some(friday));
    }

    #[test]
    fn test_plus_business_days_from_weekend_start() {
        // 2026-03-07 is a Saturday; counting starts from Monday the 9th.
        let saturday = ts("2026-03-07T10:00:00Z");
        assert_eq!(
            saturday.checked_plus_business_days(1).unwrap().to_iso8601(),
            "2026-03-10T10:00:00Z"
        );
        assert_eq!(
            saturday.checked_plus_business_days(5).unwrap().to_iso8601(),
            "2026-03-16T10:00:00Z"
        );
    }

    #[test]
    fn test_plus_business_days_out_of_range() {
        let start = ts("2026-03-06T10:00:00Z");
        assert_eq!(start.checked_plus_business_days(u32::MAX), None);
        assert_eq!(Timestamp::latest().checked_plus_business_days(1), None);
    }

    #[test]
    fn test_latest_is_a_ceiling() {
        let latest = Timestamp::latest();
        assert_eq!(latest.checked_plus_days(1), None);
        assert!(latest.checked_plus_days(-1).unwrap() < latest);
        assert_eq!(latest.as_datetime().nanosecond(), 0);
    }

    #[test]
    fn test_whole_days_since() {
        let a = ts("2026-03-01T09:00:00Z");
        let b = ts("2026-03-09T08:59:59Z");
        assert_eq!(b.whole_days_since(&a), 7);
        assert_eq!(a.whole_days_since(&b), -7);
    }

    #[test]
    fn test_from_str_and_display_agree() {
        let parsed: Timestamp = "2026-06-30T23:59:59Z".parse().unwrap();
        assert_eq!(parsed.to_string(), "2026-06-30T23:59:59Z");
    }

    #[test]
    fn test_epoch_roundtrip() {
        let original = ts("2026-01-15T12:00:00Z");
        let back = Timestamp::from_epoch_secs(original.epoch_secs()).unwrap();
        assert_eq!(original, back);
    }
}
