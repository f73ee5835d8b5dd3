//! Timestamp normalization.
//!
//! Every stream is brought onto one canonical clock before it is joined:
//! a naive local time in a fixed target zone, rendered as
//! `YYYY-MM-DDTHH:MM:SS.ffffff`.
//!
//! # Why a naive clock
//!
//! The telemetry log stamps rows with epoch milliseconds (UTC) while the gaze
//! tracker writes wall-clock ISO strings without a zone. Converting telemetry
//! into the tracker's zone and dropping the annotation puts both on the same
//! naive clock. The fixed-width rendering keeps lexical order identical to
//! chronological order, so the textual column written to the merged table is
//! itself a valid sort/join key.
//!
//! ```text
//! 1714030200123 (ms, UTC) ──► 2024-04-25T13:00:00.123 (+05:30) ──► "2024-04-25T13:00:00.123000"
//! ```

use chrono::{DateTime, FixedOffset, NaiveDateTime, Timelike};
use std::fmt;

/// Render format for canonical timestamps (always six fractional digits).
pub const CANONICAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Parse format; the fractional part is optional.
const PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Same as [`PARSE_FORMAT`] with a space separator.
const PARSE_FORMAT_SPACE: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A naive local-clock instant with microsecond resolution.
///
/// Ordering, equality and [`Display`](fmt::Display) all agree: two values
/// compare the same way their rendered strings do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanonicalTimestamp(NaiveDateTime);

impl CanonicalTimestamp {
    /// Wrap a naive datetime, truncating to whole microseconds.
    pub fn from_naive(naive: NaiveDateTime) -> Self {
        let micros_as_nanos = (naive.nanosecond() / 1_000) * 1_000;
        // with_nanosecond only fails for values >= 2e9, which truncation cannot produce
        Self(naive.with_nanosecond(micros_as_nanos).unwrap_or(naive))
    }

    /// Underlying naive datetime.
    #[inline]
    pub fn naive(&self) -> NaiveDateTime {
        self.0
    }

    /// Signed distance `self - earlier` in microseconds (saturating).
    pub fn micros_since(&self, earlier: &CanonicalTimestamp) -> i64 {
        self.0
            .signed_duration_since(earlier.0)
            .num_microseconds()
            .unwrap_or(if self.0 >= earlier.0 { i64::MAX } else { i64::MIN })
    }

    /// Absolute distance in microseconds.
    #[inline]
    pub fn abs_micros_to(&self, other: &CanonicalTimestamp) -> u64 {
        self.micros_since(other).unsigned_abs()
    }
}

impl fmt::Display for CanonicalTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(CANONICAL_FORMAT))
    }
}

/// Build the fixed target zone from an offset in minutes east of UTC.
///
/// Returns `None` when the offset is outside ±24h.
pub fn fixed_zone(utc_offset_minutes: i32) -> Option<FixedOffset> {
    FixedOffset::east_opt(utc_offset_minutes.checked_mul(60)?)
}

/// Convert an epoch-millisecond UTC instant into the canonical clock.
///
/// Returns `None` if the instant is outside chrono's representable range.
pub fn normalize_epoch_ms(epoch_ms: i64, zone: &FixedOffset) -> Option<CanonicalTimestamp> {
    let utc = DateTime::from_timestamp_millis(epoch_ms)?;
    Some(CanonicalTimestamp::from_naive(
        utc.with_timezone(zone).naive_local(),
    ))
}

/// Parse a raw `TimeStamp` field as epoch milliseconds.
///
/// Accepts plain integers and finite float text (some exporters write
/// `1.714030200123e12`). Anything else is `None`.
pub fn parse_epoch_ms_field(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ms) = raw.parse::<i64>() {
        return Some(ms);
    }
    let value = raw.parse::<f64>().ok()?;
    if !value.is_finite() || value.abs() > i64::MAX as f64 {
        return None;
    }
    Some(value.round() as i64)
}

/// Parse a canonical (or ISO-8601) timestamp string.
///
/// Naive strings are taken as already being on the canonical clock. Strings
/// carrying an explicit offset (`...+00:00`, `...Z`) are converted into
/// `zone` first and then stripped.
pub fn parse_canonical(raw: &str, zone: &FixedOffset) -> Option<CanonicalTimestamp> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, PARSE_FORMAT) {
        return Some(CanonicalTimestamp::from_naive(naive));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, PARSE_FORMAT_SPACE) {
        return Some(CanonicalTimestamp::from_naive(naive));
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| CanonicalTimestamp::from_naive(dt.with_timezone(zone).naive_local()))
}
