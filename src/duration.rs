use chrono::TimeDelta;
use thiserror::Error;
use tracing::warn;

/// Elapsed time of one drill step. Stored as whole microseconds.
pub type TimeSpan = TimeDelta;

const MICROS_PER_SECOND: i64 = 1_000_000;
const MICROS_PER_MINUTE: i64 = 60 * MICROS_PER_SECOND;
const FRACTION_DIGITS: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationParseError {
    #[error("missing ':' separator in {0:?}")]
    MissingSeparator(String),
    #[error("more than one ':' separator in {0:?}")]
    ExtraSeparator(String),
    #[error("minutes are not a whole number in {0:?}")]
    InvalidMinutes(String),
    #[error("seconds are not a decimal number in {0:?}")]
    InvalidSeconds(String),
}

/// Parses `M:S` or `M:S.f`. Blank input is not an error and yields `Ok(None)`.
pub fn try_parse(text: &str) -> Result<Option<TimeSpan>, DurationParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let Some((minutes_raw, seconds_raw)) = trimmed.split_once(':') else {
        return Err(DurationParseError::MissingSeparator(trimmed.to_string()));
    };
    if seconds_raw.contains(':') {
        return Err(DurationParseError::ExtraSeparator(trimmed.to_string()));
    }

    let minutes = parse_minutes(minutes_raw.trim())
        .ok_or_else(|| DurationParseError::InvalidMinutes(trimmed.to_string()))?;
    let second_micros = parse_second_micros(seconds_raw.trim())
        .ok_or_else(|| DurationParseError::InvalidSeconds(trimmed.to_string()))?;

    let total = minutes
        .checked_mul(MICROS_PER_MINUTE)
        .and_then(|value| value.checked_add(second_micros))
        .ok_or_else(|| DurationParseError::InvalidMinutes(trimmed.to_string()))?;

    Ok(Some(TimeDelta::microseconds(total)))
}

/// Lenient form of [`try_parse`]: malformed input is logged and becomes `None`.
pub fn parse(text: Option<&str>) -> Option<TimeSpan> {
    let text = text?;
    match try_parse(text) {
        Ok(span) => span,
        Err(err) => {
            warn!(error = %err, "duration parse failure");
            None
        }
    }
}

/// Renders a span as `M:SS.f`, rounded to the nearest tenth of a second.
pub fn format(span: Option<TimeSpan>) -> Option<String> {
    let span = span?;
    let millis = span.num_milliseconds();
    let sign = if millis < 0 { "-" } else { "" };
    let tenths = (millis.unsigned_abs() + 50) / 100;

    let minutes = tenths / 600;
    let seconds = (tenths % 600) / 10;
    let fraction = tenths % 10;

    Some(format!("{sign}{minutes}:{seconds:02}.{fraction}"))
}

/// Microseconds as persisted by the store.
pub fn to_micros(span: TimeSpan) -> Option<i64> {
    span.num_microseconds()
}

pub fn from_micros(micros: i64) -> TimeSpan {
    TimeDelta::microseconds(micros)
}

fn parse_minutes(raw: &str) -> Option<i64> {
    if raw.is_empty() {
        return Some(0);
    }
    if !raw.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    raw.parse::<i64>().ok()
}

fn parse_second_micros(raw: &str) -> Option<i64> {
    let (whole, fraction) = match raw.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (raw, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.bytes().all(|byte| byte.is_ascii_digit())
        || !fraction.bytes().all(|byte| byte.is_ascii_digit())
    {
        return None;
    }

    let whole_seconds = if whole.is_empty() {
        0
    } else {
        whole.parse::<i64>().ok()?
    };

    // Digits past microsecond precision are dropped.
    let mut padded: String = fraction.chars().take(FRACTION_DIGITS).collect();
    while padded.len() < FRACTION_DIGITS {
        padded.push('0');
    }
    let fraction_micros = padded.parse::<i64>().ok()?;

    whole_seconds
        .checked_mul(MICROS_PER_SECOND)?
        .checked_add(fraction_micros)
}
