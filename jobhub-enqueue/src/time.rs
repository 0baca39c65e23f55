//! Fractional-second timestamps used for `enqueued_at`, `at` and schedule scores.

use chrono::{DateTime, TimeZone, Utc};

/// Nanoseconds per second, as the divisor for every conversion in this module.
pub const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// Seconds since the Unix epoch with nanosecond-derived fractional precision.
pub fn to_seconds(t: DateTime<Utc>) -> f64 {
    match t.timestamp_nanos_opt() {
        Some(nanos) => nanos as f64 / NANOS_PER_SECOND,
        // Outside the i64 nanosecond range (before 1677 or after 2262).
        None => t.timestamp() as f64 + f64::from(t.timestamp_subsec_nanos()) / NANOS_PER_SECOND,
    }
}

/// Converts a duration to fractional seconds the same way [`to_seconds`] does.
pub fn duration_to_seconds(d: std::time::Duration) -> f64 {
    d.as_nanos() as f64 / NANOS_PER_SECOND
}

/// Signed variant of [`duration_to_seconds`] for `chrono` durations.
pub fn chrono_duration_to_seconds(d: chrono::Duration) -> f64 {
    match d.num_nanoseconds() {
        Some(nanos) => nanos as f64 / NANOS_PER_SECOND,
        None => d.num_milliseconds() as f64 / 1_000.0,
    }
}

/// Samples the wall clock. Never cached.
#[inline]
pub fn now_seconds() -> f64 {
    to_seconds(Utc::now())
}

/// Inverse of [`to_seconds`], rounded to the nearest nanosecond.
///
/// Returns `None` for non-finite or out-of-range values.
pub fn from_seconds(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let secs = seconds.floor();
    let nanos = ((seconds - secs) * NANOS_PER_SECOND).round() as u32;
    let (secs, nanos) = if nanos >= 1_000_000_000 {
        (secs + 1.0, 0)
    } else {
        (secs, nanos)
    };
    if secs < i64::MIN as f64 || secs > i64::MAX as f64 {
        return None;
    }
    Utc.timestamp_opt(secs as i64, nanos).single()
}
