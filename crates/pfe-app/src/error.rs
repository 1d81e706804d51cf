//! # Design
//!
//! - Centralize application-level errors for bootstrap and the monitor.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration operations failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: pfe_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: pfe_telemetry::TelemetryError,
    },
    /// Transfer engine operations failed.
    #[error("transfer engine operation failed")]
    Engine {
        /// Operation identifier.
        operation: &'static str,
        /// Source engine error.
        source: pfe_torrent_core::EngineError,
    },
    /// Configuration values were invalid.
    #[error("invalid configuration")]
    InvalidConfig {
        /// Field name that failed validation.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Optional value associated with the failure.
        value: Option<String>,
    },
    /// The monitor was asked to do something its current state forbids.
    #[error("invalid monitor state")]
    InvalidState {
        /// Operation identifier.
        operation: &'static str,
        /// State the monitor was in.
        state: &'static str,
    },
    /// The tick loop is no longer reachable.
    #[error("monitor worker unavailable")]
    WorkerUnavailable {
        /// Operation identifier.
        operation: &'static str,
    },
    /// The tick loop task failed to complete.
    #[error("monitor worker failed")]
    WorkerFailed {
        /// Operation identifier.
        operation: &'static str,
        /// Source join error.
        source: tokio::task::JoinError,
    },
}

impl AppError {
    pub(crate) const fn config(operation: &'static str, source: pfe_config::ConfigError) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: pfe_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn engine(
        operation: &'static str,
        source: pfe_torrent_core::EngineError,
    ) -> Self {
        Self::Engine { operation, source }
    }
}
