//! Error types for configuration operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Field that failed validation.
        field: String,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// File system operation failed.
    #[error("filesystem operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the operation.
        path: PathBuf,
        /// Source IO error.
        #[source]
        source: io::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, value: &str, reason: &'static str) -> Self {
        Self::InvalidField {
            field: field.to_string(),
            value: Some(value.to_string()),
            reason,
        }
    }

    /// Short description of the failure detail for operator-facing output.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::InvalidField {
                field,
                value,
                reason,
            } => value.as_deref().map_or_else(
                || format!("{field}: {reason}"),
                |value| format!("{field}={value}: {reason}"),
            ),
            Self::Io {
                operation,
                path,
                source,
            } => format!("{operation} {}: {source}", path.display()),
        }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_includes_field_and_reason() {
        let err = ConfigError::invalid("seeding_ratio", "abc", "must be a non-negative integer");
        assert_eq!(err.to_string(), "invalid configuration field");
        assert_eq!(
            err.detail(),
            "seeding_ratio=abc: must be a non-negative integer"
        );
    }
}
