//! Timestamp Formatting
//!
//! Renders epoch-millisecond telemetry timestamps as fixed en-US, 12-hour,
//! long-month strings with seconds precision, e.g.
//! `November 14, 2023 at 10:13:20 PM`.
//!
//! The display timezone is pinned by the caller as a [`FixedOffset`] so the
//! output for a given epoch value never depends on the host configuration.

use chrono::{DateTime, FixedOffset, Offset, Utc};

/// chrono pattern for the en-US long date with 12-hour time.
const DISPLAY_FORMAT: &str = "%B %-d, %Y at %-I:%M:%S %p";

/// Formats epoch-millisecond timestamps in a pinned timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampFormatter {
    offset: FixedOffset,
}

impl Default for TimestampFormatter {
    fn default() -> Self {
        Self::utc()
    }
}

impl TimestampFormatter {
    /// Create a formatter that renders in the given offset.
    #[must_use]
    pub const fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Create a formatter that renders in UTC.
    #[must_use]
    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    /// The pinned display offset.
    #[must_use]
    pub const fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Format an epoch-millisecond timestamp.
    ///
    /// Values outside chrono's representable range yield `None`.
    #[must_use]
    pub fn format(&self, epoch_millis: i64) -> Option<String> {
        self.to_datetime(epoch_millis)
            .map(|dt| dt.format(DISPLAY_FORMAT).to_string())
    }

    /// Convert an epoch-millisecond timestamp into the pinned offset.
    #[must_use]
    pub fn to_datetime(&self, epoch_millis: i64) -> Option<DateTime<FixedOffset>> {
        DateTime::<Utc>::from_timestamp_millis(epoch_millis)
            .map(|utc| utc.with_timezone(&self.offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn offset(raw: &str) -> FixedOffset {
        raw.parse().unwrap()
    }

    #[test_case(1_700_000_000_000, "+00:00", "November 14, 2023 at 10:13:20 PM"; "utc evening")]
    #[test_case(1_700_000_000_000, "+07:00", "November 15, 2023 at 5:13:20 AM"; "indochina next morning")]
    #[test_case(1_700_000_000_000, "-05:00", "November 14, 2023 at 5:13:20 PM"; "us eastern standard")]
    #[test_case(0, "+00:00", "January 1, 1970 at 12:00:00 AM"; "epoch is midnight")]
    #[test_case(43_200_000, "+00:00", "January 1, 1970 at 12:00:00 PM"; "noon")]
    #[test_case(1_704_067_199_999, "+00:00", "December 31, 2023 at 11:59:59 PM"; "drops milliseconds")]
    fn formats_in_pinned_offset(millis: i64, tz: &str, expected: &str) {
        let formatter = TimestampFormatter::new(offset(tz));
        assert_eq!(formatter.format(millis).as_deref(), Some(expected));
    }

    #[test]
    fn default_is_utc() {
        let formatter = TimestampFormatter::default();
        assert_eq!(formatter.offset(), offset("+00:00"));
    }

    #[test]
    fn formatting_is_deterministic() {
        let formatter = TimestampFormatter::new(offset("+07:00"));
        let first = formatter.format(1_700_000_123_456);
        let second = formatter.format(1_700_000_123_456);
        assert_eq!(first, second);
    }

    #[test]
    fn out_of_range_is_none() {
        let formatter = TimestampFormatter::utc();
        assert_eq!(formatter.format(i64::MAX), None);
    }
}
