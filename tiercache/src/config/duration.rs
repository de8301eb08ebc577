//! Human-readable duration parsing (e.g., "5s", "250ms", "2m").

use std::time::Duration;
use thiserror::Error;

/// Error parsing a duration string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid duration '{input}' - expected format like '5s', '250ms', '2m' or '1h'")]
pub struct DurationParseError {
    input: String,
}

impl DurationParseError {
    fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// Parse a human-readable duration.
///
/// Supports:
/// - Bare numbers (treated as seconds)
/// - `ms`, `s`, `m`, `h` suffixes
/// - Case-insensitive
/// - Whitespace tolerant
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tiercache::config::parse_duration;
///
/// assert_eq!(parse_duration("30").unwrap(), Duration::from_secs(30));
/// assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
/// assert_eq!(parse_duration("2 m").unwrap(), Duration::from_secs(120));
/// assert_eq!(parse_duration("1H").unwrap(), Duration::from_secs(3600));
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, DurationParseError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(DurationParseError::new(s));
    }

    let lower = trimmed.to_lowercase();
    // "ms" must be checked before "m" and "s"
    let (num_str, millis_per_unit) = if let Some(n) = lower.strip_suffix("ms") {
        (n, 1_u64)
    } else if let Some(n) = lower.strip_suffix('s') {
        (n, 1_000)
    } else if let Some(n) = lower.strip_suffix('m') {
        (n, 60_000)
    } else if let Some(n) = lower.strip_suffix('h') {
        (n, 3_600_000)
    } else {
        (lower.as_str(), 1_000)
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .map_err(|_| DurationParseError::new(s))?;

    num.checked_mul(millis_per_unit)
        .map(Duration::from_millis)
        .ok_or_else(|| DurationParseError::new(s))
}

/// Format a duration using the largest unit that represents it exactly.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tiercache::config::format_duration;
///
/// assert_eq!(format_duration(Duration::from_secs(120)), "2m");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1500ms");
/// ```
pub fn format_duration(duration: Duration) -> String {
    const HOUR: u128 = 3_600_000;
    const MINUTE: u128 = 60_000;
    const SECOND: u128 = 1_000;

    let millis = duration.as_millis();
    if millis >= HOUR && millis % HOUR == 0 {
        format!("{}h", millis / HOUR)
    } else if millis >= MINUTE && millis % MINUTE == 0 {
        format!("{}m", millis / MINUTE)
    } else if millis >= SECOND && millis % SECOND == 0 {
        format!("{}s", millis / SECOND)
    } else {
        format!("{}ms", millis)
    }
}
