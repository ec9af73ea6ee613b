//! # Duration Parsing
//!
//! Parses the short duration strings used by `spec.reconciliation.interval`.

use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;

static DURATION_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(?P<number>\d+)(?P<unit>[smhd])$").ok());

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DurationError {
    #[error("duration string cannot be empty")]
    Empty,
    #[error("invalid duration format '{0}', expected <number><unit> (e.g. '30s', '5m', '1h')")]
    InvalidFormat(String),
    #[error("duration must be greater than zero, got '{0}'")]
    Zero(String),
    #[error("duration '{0}' is too large")]
    Overflow(String),
}

/// Parse Kubernetes duration string into std::time::Duration
/// Supports formats: "30s", "1m", "5m", "1h", "2h", "1d"
pub fn parse_kubernetes_duration(duration_str: &str) -> Result<Duration, DurationError> {
    let duration_trimmed = duration_str.trim();

    if duration_trimmed.is_empty() {
        return Err(DurationError::Empty);
    }

    let interval_lower = duration_trimmed.to_lowercase();
    let captures = DURATION_REGEX
        .as_ref()
        .and_then(|re| re.captures(&interval_lower))
        .ok_or_else(|| DurationError::InvalidFormat(duration_trimmed.to_string()))?;

    let (Some(number), Some(unit)) = (captures.name("number"), captures.name("unit")) else {
        return Err(DurationError::InvalidFormat(duration_trimmed.to_string()));
    };

    let number: u64 = number
        .as_str()
        .parse()
        .map_err(|_| DurationError::Overflow(duration_trimmed.to_string()))?;

    if number == 0 {
        return Err(DurationError::Zero(duration_trimmed.to_string()));
    }

    let multiplier = match unit.as_str() {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86_400,
        _ => return Err(DurationError::InvalidFormat(duration_trimmed.to_string())),
    };

    number
        .checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(|| DurationError::Overflow(duration_trimmed.to_string()))
}
