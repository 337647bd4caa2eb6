//! Timestamp format inference for Text columns and Julian Day conversion for
//! Float columns.
//!
//! The engine stores no timestamp type; a Text value's layout is chosen purely
//! from its length, with the character at offset 10 (`T` or space) selecting
//! between the two equivalent date-time variants. Strings without a timezone
//! offset are read as UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// Julian Day number of the Unix epoch (1970-01-01T00:00:00Z).
pub const JULIAN_DAY_UNIX_EPOCH: f64 = 2_440_587.5;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Parse a Text-classed column value using the length-keyed layout heuristic.
///
/// # Errors
///
/// Returns the format-level parse failure as a message; the caller attaches
/// the statement context.
pub fn parse_timestamp_text(text: &str) -> Result<DateTime<Utc>, String> {
    let sep_is_t = text.len() > 10 && text.as_bytes()[10] == b'T';
    match text.len() {
        5 => time_only(text, "%H:%M"),
        8 => time_only(text, "%H:%M:%S"),
        10 => {
            let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(stringify)?;
            Ok(date
                .and_time(NaiveTime::default())
                .and_utc())
        }
        12 => time_only(text, "%H:%M:%S%.3f"),
        16 => naive(text, if sep_is_t { "%Y-%m-%dT%H:%M" } else { "%Y-%m-%d %H:%M" }),
        19 => naive(
            text,
            if sep_is_t { "%Y-%m-%dT%H:%M:%S" } else { "%Y-%m-%d %H:%M:%S" },
        ),
        23 => naive(
            text,
            if sep_is_t { "%Y-%m-%dT%H:%M:%S%.f" } else { "%Y-%m-%d %H:%M:%S%.f" },
        ),
        _ => {
            // Full date-time, fractional seconds and timezone offset optional.
            let (with_tz, without_tz) = if sep_is_t {
                ("%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M:%S%.f")
            } else {
                ("%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f")
            };
            if let Ok(dt) = DateTime::parse_from_str(text, with_tz) {
                return Ok(dt.with_timezone(&Utc));
            }
            if let Some(stripped) = text.strip_suffix('Z') {
                return naive(stripped, without_tz);
            }
            naive(text, without_tz)
        }
    }
}

/// Convert a Julian Day number to a timestamp via the fixed epoch relation.
#[must_use]
pub fn julian_day_to_timestamp(julian_day: f64) -> Option<DateTime<Utc>> {
    let seconds = (julian_day - JULIAN_DAY_UNIX_EPOCH) * SECONDS_PER_DAY;
    let millis = (seconds * 1_000.0).round();
    if !millis.is_finite() || millis.abs() > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64)
}

/// Inverse of [`julian_day_to_timestamp`].
#[must_use]
pub fn timestamp_to_julian_day(timestamp: DateTime<Utc>) -> f64 {
    let millis = timestamp.timestamp_millis() as f64;
    millis / 1_000.0 / SECONDS_PER_DAY + JULIAN_DAY_UNIX_EPOCH
}

fn time_only(text: &str, layout: &str) -> Result<DateTime<Utc>, String> {
    let time = NaiveTime::parse_from_str(text, layout).map_err(stringify)?;
    // Time-only values sit on the all-zero date, mirroring how bare times
    // parse in the original wire format.
    let date = NaiveDate::from_ymd_opt(0, 1, 1).ok_or_else(|| "invalid base date".to_owned())?;
    Ok(date.and_time(time).and_utc())
}

fn naive(text: &str, layout: &str) -> Result<DateTime<Utc>, String> {
    NaiveDateTime::parse_from_str(text, layout)
        .map(|dt| dt.and_utc())
        .map_err(stringify)
}

fn stringify(err: chrono::ParseError) -> String {
    err.to_string()
}
