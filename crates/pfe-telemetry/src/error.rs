//! Error types for logging and metrics setup.

use prometheus::Error as PrometheusError;
use thiserror::Error;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Failures raised while installing logging or building monitor metrics.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global tracing subscriber was already installed or could not be set.
    #[error("failed to install tracing subscriber")]
    SubscriberInstall {
        /// Subscriber installation failure.
        #[source]
        source: tracing_subscriber::util::TryInitError,
    },
    /// A monitor counter or gauge had invalid options.
    #[error("failed to build metrics collector")]
    MetricsCollector {
        /// Metric the collector was built for.
        name: &'static str,
        /// Prometheus failure.
        #[source]
        source: PrometheusError,
    },
    /// A monitor collector clashed with one already in the registry.
    #[error("failed to register metrics collector")]
    MetricsRegister {
        /// Metric the collector was registered as.
        name: &'static str,
        /// Prometheus failure.
        #[source]
        source: PrometheusError,
    },
    /// The text exposition encoder rejected the gathered families.
    #[error("failed to encode metrics")]
    MetricsEncode {
        /// Prometheus failure.
        #[source]
        source: PrometheusError,
    },
    /// Encoded exposition text was not UTF-8.
    #[error("metrics output was not valid utf-8")]
    MetricsUtf8 {
        /// Conversion failure.
        #[source]
        source: std::string::FromUtf8Error,
    },
}

impl TelemetryError {
    /// Metric tied to the failure, for collector build and registration errors.
    #[must_use]
    pub const fn metric(&self) -> Option<&'static str> {
        match self {
            Self::MetricsCollector { name, .. } | Self::MetricsRegister { name, .. } => Some(*name),
            Self::SubscriberInstall { .. }
            | Self::MetricsEncode { .. }
            | Self::MetricsUtf8 { .. } => None,
        }
    }
}
