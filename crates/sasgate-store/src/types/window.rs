//! Validity windows for access policies and signed URIs.

use std::fmt;

use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Format used for timestamps in signed URIs and access policies.
pub const SAS_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Half-open `[starts_on, expires_on)` validity window.
///
/// Both bounds are truncated to whole seconds, matching the precision of
/// the wire format, and `expires_on` is always strictly after `starts_on`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    starts_on: Timestamp,
    expires_on: Timestamp,
}

impl TimeWindow {
    /// Creates a window, rejecting empty or inverted ranges.
    pub fn new(starts_on: Timestamp, expires_on: Timestamp) -> StoreResult<Self> {
        let starts_on = truncate_to_second(starts_on)?;
        let expires_on = truncate_to_second(expires_on)?;

        if expires_on <= starts_on {
            return Err(StoreError::other(format!(
                "window expiry {expires_on} must be after its start {starts_on}"
            ))
            .with_status(400));
        }

        Ok(Self {
            starts_on,
            expires_on,
        })
    }

    /// Creates a window around `now`: from `now - backdate` to `now + ttl`.
    pub fn around(now: Timestamp, backdate: SignedDuration, ttl: SignedDuration) -> StoreResult<Self> {
        Self::new(offset(now, -backdate)?, offset(now, ttl)?)
    }

    /// Returns the start of the window.
    #[must_use]
    #[inline]
    pub const fn starts_on(&self) -> Timestamp {
        self.starts_on
    }

    /// Returns the end of the window.
    #[must_use]
    #[inline]
    pub const fn expires_on(&self) -> Timestamp {
        self.expires_on
    }

    /// Returns the length of the window.
    #[must_use]
    pub fn duration(&self) -> SignedDuration {
        self.expires_on.duration_since(self.starts_on)
    }

    /// Returns `true` if `instant` falls inside the window.
    #[must_use]
    pub fn contains(&self, instant: Timestamp) -> bool {
        self.starts_on <= instant && instant < self.expires_on
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}..{}",
            format_sas_time(self.starts_on),
            format_sas_time(self.expires_on)
        )
    }
}

/// Adds a signed offset to a timestamp.
pub fn offset(instant: Timestamp, duration: SignedDuration) -> StoreResult<Timestamp> {
    instant.checked_add(duration).map_err(|e| {
        StoreError::other("timestamp out of range")
            .with_status(400)
            .with_source(e)
    })
}

/// Formats a timestamp the way signed URIs and policies expect it.
#[must_use]
pub fn format_sas_time(instant: Timestamp) -> String {
    instant.strftime(SAS_TIME_FORMAT).to_string()
}

/// Parses a timestamp from a signed URI or policy.
pub fn parse_sas_time(value: &str) -> StoreResult<Timestamp> {
    value.parse::<Timestamp>().map_err(|e| {
        StoreError::other(format!("invalid timestamp {value:?}"))
            .with_status(400)
            .with_source(e)
    })
}

fn truncate_to_second(instant: Timestamp) -> StoreResult<Timestamp> {
    Timestamp::from_second(instant.as_second()).map_err(|e| {
        StoreError::other("timestamp out of range")
            .with_status(400)
            .with_source(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(value: &str) -> Timestamp {
        value.parse().unwrap()
    }

    #[test]
    fn rejects_inverted_and_empty_windows() {
        let now = ts("2024-05-01T12:00:00Z");
        assert!(TimeWindow::new(now, now).is_err());
        assert!(TimeWindow::new(now, ts("2024-05-01T11:00:00Z")).is_err());
    }

    #[test]
    fn window_around_now() {
        let now = ts("2024-05-01T12:00:00.750Z");
        let window = TimeWindow::around(
            now,
            SignedDuration::from_mins(15),
            SignedDuration::from_hours(1),
        )
        .unwrap();

        assert_eq!(format_sas_time(window.starts_on()), "2024-05-01T11:45:00Z");
        assert_eq!(format_sas_time(window.expires_on()), "2024-05-01T13:00:00Z");
        assert_eq!(window.duration(), SignedDuration::from_mins(75));
    }

    #[test]
    fn contains_is_half_open() {
        let window = TimeWindow::new(ts("2024-05-01T12:00:00Z"), ts("2024-05-01T12:01:00Z")).unwrap();
        assert!(window.contains(ts("2024-05-01T12:00:00Z")));
        assert!(window.contains(ts("2024-05-01T12:00:59Z")));
        assert!(!window.contains(ts("2024-05-01T12:01:00Z")));
        assert!(!window.contains(ts("2024-05-01T11:59:59Z")));
    }

    #[test]
    fn sas_time_round_trips_through_text() {
        let instant = ts("2024-05-01T12:34:56Z");
        assert_eq!(parse_sas_time(&format_sas_time(instant)).unwrap(), instant);
        assert!(parse_sas_time("yesterday").is_err());
    }
}
