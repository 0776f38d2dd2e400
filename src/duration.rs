//! Duration literal parsing for `@timeout`/`@retry` parameters.
//!
//! Accepts the forms the spec's literal grammar allows: `"30s"`, `"500ms"`,
//! `"1h"`, or a bare integer (interpreted as seconds). Delegates to
//! `humantime` for the suffixed forms rather than hand-rolling a parser.

use crate::error::ClidefError;
use std::time::Duration;

pub fn parse_duration(decorator: &str, raw: &str) -> Result<Duration, ClidefError> {
    let trimmed = raw.trim();
    if let Ok(secs) = trimmed.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(trimmed).map_err(|e| {
        ClidefError::parameter_validation(decorator, format!("invalid duration '{raw}': {e}"))
    })
}

/// Validates a parsed duration falls within `[min, max]` inclusive,
/// returning a `parameter-validation` error naming the offending decorator.
pub fn validate_range(
    decorator: &str,
    param: &str,
    value: Duration,
    min: Duration,
    max: Duration,
) -> Result<Duration, ClidefError> {
    if value < min || value > max {
        return Err(ClidefError::parameter_validation(
            decorator,
            format!(
                "{param} must be between {:?} and {:?}, got {:?}",
                min, max, value
            ),
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_seconds() {
        assert_eq!(
            parse_duration("timeout", "30").unwrap(),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn parses_suffixed_forms() {
        assert_eq!(
            parse_duration("timeout", "500ms").unwrap(),
            Duration::from_millis(500)
        );
        assert_eq!(
            parse_duration("timeout", "1h").unwrap(),
            Duration::from_secs(3600)
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_duration("timeout", "banana").is_err());
    }

    #[test]
    fn range_validation() {
        let d = Duration::from_millis(1);
        assert!(validate_range(
            "timeout",
            "duration",
            d,
            Duration::from_millis(1),
            Duration::from_secs(86400)
        )
        .is_ok());
        assert!(validate_range(
            "timeout",
            "duration",
            Duration::from_secs(100_000),
            Duration::from_millis(1),
            Duration::from_secs(86400)
        )
        .is_err());
    }
}
