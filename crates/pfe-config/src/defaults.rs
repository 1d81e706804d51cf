//! Default values for settings absent from the settings file.
//!
//! # Design
//! - Keep the shipped defaults in one place so loader, model and docs agree.

/// Default seed ratio (upload three times the payload size).
pub const SEEDING_RATIO: u32 = 3;
/// Default seeding idle timeout in seconds.
pub const SEEDING_TIMEOUT_SECS: u64 = 3_600;
/// Default monitor tick period in milliseconds.
pub const TICK_PERIOD_MS: u64 = 1_000;
/// Default tracing filter.
pub const LOG_LEVEL: &str = "info";
/// Separator between tracker URLs in the `trackers` value.
pub const TRACKER_SEPARATOR: char = '|';
