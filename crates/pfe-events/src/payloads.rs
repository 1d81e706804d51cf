//! Event payload types carried on the bus.

use chrono::{DateTime, Utc};

/// Identifier assigned to each event published on the bus.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
pub const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// Typed events describing monitor observations.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Download progress advanced for one or more transfers during a tick.
    Progress {
        /// Every transfer whose whole-percent progress advanced.
        transfers: Vec<ProgressEntry>,
    },
    /// One or more transfers stopped during a tick.
    Stopped {
        /// Every transfer that reached a stopped state.
        transfers: Vec<StoppedEntry>,
    },
}

impl Event {
    /// Machine-friendly discriminator for stream consumers.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Progress { .. } => "progress",
            Self::Stopped { .. } => "stopped",
        }
    }

    /// Number of transfers described by the event.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Progress { transfers } => transfers.len(),
            Self::Stopped { transfers } => transfers.len(),
        }
    }

    /// Whether the event describes no transfers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Progress observation for a single transfer.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct ProgressEntry {
    /// Engine-assigned transfer identity.
    pub transfer_id: u64,
    /// Display name.
    pub name: String,
    /// Whole-percent download progress.
    pub progress_percent: u8,
    /// Total payload size, zero when unknown.
    pub size_bytes: u64,
}

/// Stop observation for a single transfer.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct StoppedEntry {
    /// Engine-assigned transfer identity.
    pub transfer_id: u64,
    /// Base32 content hash when known.
    pub hash: Option<String>,
    /// Display name.
    pub name: String,
    /// Why the transfer stopped.
    pub reason: StopReason,
    /// Cumulative payload upload at the time of the stop.
    pub uploaded_bytes: u64,
    /// Total payload size.
    pub size_bytes: u64,
}

/// Reasons a transfer stops.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The configured seed ratio was reached.
    RatioComplete,
    /// Seeding stayed idle past the configured timeout.
    TimedOut,
    /// The transfer was paused outside the monitor.
    Paused,
}

/// Metadata wrapper around events.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Sequential identifier.
    pub id: EventId,
    /// Publication time.
    pub timestamp: DateTime<Utc>,
    /// Event payload.
    pub event: Event,
}
