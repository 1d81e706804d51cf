//! Typed settings consumed by the monitor host.

use std::time::Duration;

use pfe_torrent_core::SeedingPolicy;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::defaults;
use crate::error::ConfigResult;
use crate::properties::Properties;
use crate::validate::{
    parse_flag, parse_log_format, parse_positive_u64, parse_trackers, parse_u32, parse_u64,
};

const KEY_TRACKERS: &str = "trackers";
const KEY_ENABLE_DHT: &str = "enable_dht";
const KEY_SEEDING_RATIO: &str = "seeding_ratio";
const KEY_SEEDING_TIMEOUT: &str = "seeding_timeout";
const KEY_SEED_AFTER_DOWNLOAD: &str = "seed_after_download";
const KEY_TICK_PERIOD_MS: &str = "tick_period_ms";
const KEY_LOG_LEVEL: &str = "log_level";
const KEY_LOG_FORMAT: &str = "log_format";

const KNOWN_KEYS: [&str; 8] = [
    KEY_TRACKERS,
    KEY_ENABLE_DHT,
    KEY_SEEDING_RATIO,
    KEY_SEEDING_TIMEOUT,
    KEY_SEED_AFTER_DOWNLOAD,
    KEY_TICK_PERIOD_MS,
    KEY_LOG_LEVEL,
    KEY_LOG_FORMAT,
];

/// Effective settings after defaults are applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Tracker URLs attached to every transfer.
    pub trackers: Vec<String>,
    /// Whether the engine session joins the DHT.
    pub enable_dht: bool,
    /// Seed ratio; `0` disables the ratio policy.
    pub seeding_ratio: u32,
    /// Seeding idle timeout in seconds; `0` disables the timeout policy.
    pub seeding_timeout_secs: u64,
    /// Whether completed downloads keep seeding.
    pub seed_after_download: bool,
    /// Monitor tick period in milliseconds.
    pub tick_period_ms: u64,
    /// Default tracing filter.
    pub log_level: String,
    /// Log output format (`json` or `pretty`); inferred when unset.
    pub log_format: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            trackers: Vec::new(),
            enable_dht: false,
            seeding_ratio: defaults::SEEDING_RATIO,
            seeding_timeout_secs: defaults::SEEDING_TIMEOUT_SECS,
            seed_after_download: false,
            tick_period_ms: defaults::TICK_PERIOD_MS,
            log_level: defaults::LOG_LEVEL.to_string(),
            log_format: None,
        }
    }
}

impl Settings {
    /// Build settings from parsed properties, applying defaults for absent
    /// keys. Unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ConfigError::InvalidField`] when a numeric or enumerated
    /// value cannot be parsed.
    pub fn from_properties(props: &Properties) -> ConfigResult<Self> {
        let mut settings = Self::default();

        if let Some(value) = props.get(KEY_TRACKERS) {
            settings.trackers = parse_trackers(value);
        }
        if let Some(value) = props.get(KEY_ENABLE_DHT) {
            settings.enable_dht = parse_flag(value);
        }
        if let Some(value) = props.get(KEY_SEEDING_RATIO) {
            settings.seeding_ratio = parse_u32(KEY_SEEDING_RATIO, value)?;
        }
        if let Some(value) = props.get(KEY_SEEDING_TIMEOUT) {
            settings.seeding_timeout_secs = parse_u64(KEY_SEEDING_TIMEOUT, value)?;
        }
        if let Some(value) = props.get(KEY_SEED_AFTER_DOWNLOAD) {
            settings.seed_after_download = parse_flag(value);
        }
        if let Some(value) = props.get(KEY_TICK_PERIOD_MS) {
            settings.tick_period_ms = parse_positive_u64(KEY_TICK_PERIOD_MS, value)?;
        }
        if let Some(value) = props.get(KEY_LOG_LEVEL).map(str::trim) {
            if !value.is_empty() {
                settings.log_level = value.to_string();
            }
        }
        if let Some(value) = props.get(KEY_LOG_FORMAT) {
            if !value.trim().is_empty() {
                settings.log_format = Some(parse_log_format(KEY_LOG_FORMAT, value)?);
            }
        }

        for key in props.keys().filter(|key| !KNOWN_KEYS.contains(key)) {
            debug!(key, "ignoring unknown settings key");
        }

        Ok(settings)
    }

    /// Convert the settings back to properties for persistence.
    #[must_use]
    pub fn to_properties(&self) -> Properties {
        let mut props = Properties::new();
        props.set(
            KEY_TRACKERS,
            self.trackers
                .join(&defaults::TRACKER_SEPARATOR.to_string()),
        );
        props.set(KEY_ENABLE_DHT, self.enable_dht.to_string());
        props.set(KEY_SEEDING_RATIO, self.seeding_ratio.to_string());
        props.set(KEY_SEEDING_TIMEOUT, self.seeding_timeout_secs.to_string());
        props.set(KEY_SEED_AFTER_DOWNLOAD, self.seed_after_download.to_string());
        props.set(KEY_TICK_PERIOD_MS, self.tick_period_ms.to_string());
        props.set(KEY_LOG_LEVEL, self.log_level.clone());
        if let Some(format) = &self.log_format {
            props.set(KEY_LOG_FORMAT, format.clone());
        }
        props
    }

    /// Seeding idle timeout as a duration.
    #[must_use]
    pub const fn seeding_timeout(&self) -> Duration {
        Duration::from_secs(self.seeding_timeout_secs)
    }

    /// Monitor tick period as a duration.
    #[must_use]
    pub const fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    /// Seeding limits the monitor enforces.
    #[must_use]
    pub const fn seeding_policy(&self) -> SeedingPolicy {
        SeedingPolicy {
            seed_ratio: self.seeding_ratio,
            seeding_timeout: self.seeding_timeout(),
        }
    }
}
