use std::time::Duration;

use crate::error::ConfigError;

/// Parse a human duration such as `500ms`, `30s`, `2m`, `1h` or `1.5s`.
///
/// A bare number is read as milliseconds.
pub fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    let trimmed = value.trim();
    let invalid = || ConfigError::InvalidDuration {
        value: value.to_string(),
    };

    let (number, scale) = if let Some(n) = trimmed.strip_suffix("ms") {
        (n, 0.001)
    } else if let Some(n) = trimmed.strip_suffix('s') {
        (n, 1.0)
    } else if let Some(n) = trimmed.strip_suffix('m') {
        (n, 60.0)
    } else if let Some(n) = trimmed.strip_suffix('h') {
        (n, 3600.0)
    } else {
        (trimmed, 0.001)
    };

    let number: f64 = number.trim().parse().map_err(|_| invalid())?;
    if !number.is_finite() || number < 0.0 {
        return Err(invalid());
    }

    Duration::try_from_secs_f64(number * scale).map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_units() {
        assert_eq!(Duration::from_millis(500), parse_duration("500ms").unwrap());
        assert_eq!(Duration::from_secs(30), parse_duration("30s").unwrap());
        assert_eq!(Duration::from_secs(120), parse_duration("2m").unwrap());
        assert_eq!(Duration::from_secs(3600), parse_duration("1h").unwrap());
    }

    #[test]
    fn parse_fractional_and_bare() {
        assert_eq!(Duration::from_millis(1500), parse_duration("1.5s").unwrap());
        assert_eq!(Duration::from_secs(90), parse_duration("1.5m").unwrap());
        assert_eq!(Duration::from_millis(250), parse_duration("250").unwrap());
        assert_eq!(Duration::from_secs(30), parse_duration(" 30s ").unwrap());
    }

    #[test]
    fn reject_garbage() {
        assert_eq!(
            Err(ConfigError::InvalidDuration {
                value: "soon".to_string()
            }),
            parse_duration("soon")
        );
        assert!(parse_duration("-5s").is_err());
        assert!(parse_duration("").is_err());
    }
}
