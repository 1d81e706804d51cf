//! Field parsing helpers for settings values.

use crate::defaults::TRACKER_SEPARATOR;
use crate::error::{ConfigError, ConfigResult};

/// Interpret a boolean flag; only a case-insensitive `true` is true.
#[must_use]
pub fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

/// Parse a non-negative integer that must fit in `u32`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the value is not a non-negative
/// integer in range.
pub fn parse_u32(field: &str, value: &str) -> ConfigResult<u32> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| ConfigError::invalid(field, value, "must be a non-negative integer"))
}

/// Parse a non-negative integer that must fit in `u64`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the value is not a non-negative
/// integer in range.
pub fn parse_u64(field: &str, value: &str) -> ConfigResult<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::invalid(field, value, "must be a non-negative integer"))
}

/// Parse a strictly positive integer.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the value is zero or not an
/// integer.
pub fn parse_positive_u64(field: &str, value: &str) -> ConfigResult<u64> {
    let parsed = parse_u64(field, value)?;
    if parsed == 0 {
        return Err(ConfigError::invalid(field, value, "must be greater than zero"));
    }
    Ok(parsed)
}

/// Split the tracker list, dropping blank entries.
#[must_use]
pub fn parse_trackers(value: &str) -> Vec<String> {
    value
        .split(TRACKER_SEPARATOR)
        .map(str::trim)
        .filter(|tracker| !tracker.is_empty())
        .map(str::to_string)
        .collect()
}

/// Normalise a log format name to `json` or `pretty`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for any other name.
pub fn parse_log_format(field: &str, value: &str) -> ConfigResult<String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "json" => Ok("json".to_string()),
        "pretty" | "text" => Ok("pretty".to_string()),
        _ => Err(ConfigError::invalid(field, value, "must be `json` or `pretty`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_accept_only_true() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" TRUE "));
        assert!(!parse_flag("yes"));
        assert!(!parse_flag("1"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn integers_reject_negative_and_garbage() {
        assert_eq!(parse_u32("seeding_ratio", " 4 ").ok(), Some(4));
        assert!(matches!(
            parse_u32("seeding_ratio", "-1"),
            Err(ConfigError::InvalidField { reason: "must be a non-negative integer", .. })
        ));
        assert!(parse_u64("seeding_timeout", "1h").is_err());
        assert!(matches!(
            parse_positive_u64("tick_period_ms", "0"),
            Err(ConfigError::InvalidField { reason: "must be greater than zero", .. })
        ));
    }

    #[test]
    fn trackers_split_on_pipe_and_skip_blanks() {
        assert_eq!(
            parse_trackers("udp://a.example:80| |http://b.example/announce|"),
            vec![
                "udp://a.example:80".to_string(),
                "http://b.example/announce".to_string()
            ]
        );
        assert!(parse_trackers("").is_empty());
    }

    #[test]
    fn log_format_normalises_aliases() {
        assert_eq!(parse_log_format("log_format", "Text").ok().as_deref(), Some("pretty"));
        assert!(parse_log_format("log_format", "xml").is_err());
    }
}
