//! String and time formatting helpers.
//!
//! Small, pure functions shared by the delivery pipeline (temp-file naming)
//! and the CLI output (durations). Time zone conversions work on fixed
//! hour offsets, the way the host reports them, not on named zones.

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone};
use rand::Rng;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TimeFormatError {
    #[error("empty time string")]
    Empty,
    #[error("malformed time string '{0}'")]
    Malformed(String),
    #[error("timezone offset {0} is outside -11..=11")]
    OffsetOutOfRange(i32),
}

/// Case-insensitive (ASCII) string equality.
pub fn equals_ignore_case(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// A string of `digits` random decimal digits. Zero digits → empty string.
pub fn random_digits(digits: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..digits)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Compact sortable timestamp, `YYYYmmddHHMMSS`.
pub fn compact_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format("%Y%m%d%H%M%S").to_string()
}

/// [`compact_timestamp`] for the current local time.
pub fn now_compact() -> String {
    compact_timestamp(&Local::now())
}

/// Format a second count as `HH:MM:SS`. Hours are not wrapped at 24.
pub fn format_hms(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Parse `HH:MM:SS` (whitespace around the colons tolerated) into seconds.
pub fn parse_hms(value: &str) -> Result<u64, TimeFormatError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(TimeFormatError::Empty);
    }
    let parts: Vec<&str> = value.split(':').map(str::trim).collect();
    let [h, m, s] = parts.as_slice() else {
        return Err(TimeFormatError::Malformed(value.to_string()));
    };
    let parse = |p: &str| {
        p.parse::<u64>()
            .map_err(|_| TimeFormatError::Malformed(value.to_string()))
    };
    Ok(parse(h)? * 3600 + parse(m)? * 60 + parse(s)?)
}

/// Parse a timestamp carrying its own offset, e.g. `2024-01-03 12:14:08+00:00`.
///
/// RFC 3339 (`2024-01-03T12:14:08Z`) is accepted as well.
fn parse_zoned(value: &str) -> Result<DateTime<FixedOffset>, TimeFormatError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(TimeFormatError::Empty);
    }
    DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%:z")
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%z"))
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .map_err(|_| TimeFormatError::Malformed(value.to_string()))
}

fn offset_hours(hours: i32) -> Result<FixedOffset, TimeFormatError> {
    if !(-11..=11).contains(&hours) {
        return Err(TimeFormatError::OffsetOutOfRange(hours));
    }
    FixedOffset::east_opt(hours * 3600).ok_or(TimeFormatError::OffsetOutOfRange(hours))
}

/// Re-express a zoned timestamp at a fixed hour offset.
///
/// ```text
/// ("2024-01-03 12:14:08+00:00", 8) → "2024-01-03 20:14:08+0800"
/// ```
///
/// The suffix is the target offset. Shifting the wall clock while keeping
/// the input's offset (`20:14:08+0000`) would name a different instant, so
/// that form is not produced.
pub fn convert_with_timezone(value: &str, local_offset: i32) -> Result<String, TimeFormatError> {
    let offset = offset_hours(local_offset)?;
    let parsed = parse_zoned(value)?;
    Ok(parsed
        .with_timezone(&offset)
        .format("%Y-%m-%d %H:%M:%S%z")
        .to_string())
}

/// Like [`convert_with_timezone`] but keeps only `HH:MM`.
pub fn convert_hour_minute_with_timezone(
    value: &str,
    local_offset: i32,
) -> Result<String, TimeFormatError> {
    let offset = offset_hours(local_offset)?;
    let parsed = parse_zoned(value)?;
    Ok(parsed.with_timezone(&offset).format("%H:%M").to_string())
}

/// Millisecond Unix timestamp → `YYYY-mm-dd HH:MM:SS` in UTC.
pub fn timestamp_ms_to_utc_string(timestamp_ms: i64) -> Option<String> {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|dt| dt.naive_utc())
        .map(|naive: NaiveDateTime| naive.format("%Y-%m-%d %H:%M:%S").to_string())
}
