//! Core transfer domain types shared across the workspace.

mod hash;

use std::fmt::{self, Display, Formatter};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

pub use hash::{ContentHash, HASH_LEN};

/// Stable identity the engine assigns to a transfer when it is added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(u64);

impl TransferId {
    /// Wrap a raw engine identity.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw engine identity.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl Display for TransferId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Point-in-time status the engine reports for a transfer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferStatus {
    /// Download completion as a fraction in `0.0..=1.0`.
    pub progress: f64,
    /// Whether the engine has the transfer paused.
    pub paused: bool,
    /// Whether the payload is fully downloaded (seeding phase).
    pub finished: bool,
    /// Cumulative payload bytes uploaded, protocol overhead excluded.
    pub uploaded_payload_bytes: u64,
    /// Total payload size; zero until metadata is resolved.
    pub total_size_bytes: u64,
    /// Display name reported by the engine.
    pub name: String,
}

impl TransferStatus {
    /// Progress fraction truncated to a whole percent in `0..=100`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    #[must_use]
    pub fn progress_percent(&self) -> u8 {
        if !self.progress.is_finite() || self.progress <= 0.0 {
            return 0;
        }
        let percent = (self.progress * 100.0).floor();
        if percent >= 100.0 { 100 } else { percent as u8 }
    }
}

/// Lifecycle state of a monitored transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityState {
    /// Downloading, or observed but not yet finished.
    Active,
    /// Download complete; seeding.
    FinishedDownload,
    /// Paused after uploading the configured multiple of its size.
    RatioComplete,
    /// Paused after seeding idle for longer than the configured timeout.
    TimedOut,
    /// Paused by someone other than the monitor.
    Paused,
}

impl ActivityState {
    /// Whether a seeding policy has fired for the transfer.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::RatioComplete | Self::TimedOut)
    }

    /// Whether the transfer has stopped for any reason.
    #[must_use]
    pub const fn is_stopped(self) -> bool {
        matches!(self, Self::RatioComplete | Self::TimedOut | Self::Paused)
    }

    /// Machine-friendly label for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::FinishedDownload => "finished_download",
            Self::RatioComplete => "ratio_complete",
            Self::TimedOut => "timed_out",
            Self::Paused => "paused",
        }
    }
}

impl Display for ActivityState {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Activity record the monitor keeps for every transfer it has observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferActivity {
    /// Engine-assigned identity.
    pub id: TransferId,
    /// Content hash, unset when derivation failed.
    pub hash: Option<ContentHash>,
    /// Display name, populated once progress is first observed.
    pub name: Option<String>,
    /// Whole-percent download progress; never decreases.
    pub progress_percent: u8,
    /// Total payload size; zero until known.
    pub size_bytes: u64,
    /// Cumulative payload upload; never decreases.
    pub uploaded_bytes: u64,
    /// Last time progress or upload advanced.
    pub last_activity: Instant,
    /// Current lifecycle state.
    pub state: ActivityState,
}

impl TransferActivity {
    /// Zero-initialised record observed at `now`.
    #[must_use]
    pub const fn new(id: TransferId, hash: Option<ContentHash>, now: Instant) -> Self {
        Self {
            id,
            hash,
            name: None,
            progress_percent: 0,
            size_bytes: 0,
            uploaded_bytes: 0,
            last_activity: now,
            state: ActivityState::Active,
        }
    }

    /// Human-readable label: the name, else the base32 hash, else the id.
    #[must_use]
    pub fn label(&self) -> String {
        if let Some(name) = self.name.as_deref().filter(|name| !name.is_empty()) {
            return name.to_string();
        }
        self.hash.map_or_else(
            || format!("transfer-{}", self.id),
            |hash| hash.to_base32(),
        )
    }

    /// Uploaded bytes over size, rounded to two decimals. `None` until the
    /// size is known.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn share_ratio(&self) -> Option<f64> {
        if self.size_bytes == 0 {
            return None;
        }
        let ratio = self.uploaded_bytes as f64 / self.size_bytes as f64;
        Some((ratio * 100.0).round() / 100.0)
    }

    /// Time since progress or upload last advanced.
    #[must_use]
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }
}

/// Seeding limits the monitor enforces once a download has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedingPolicy {
    /// Multiple of the payload size to upload before pausing; `0` disables.
    pub seed_ratio: u32,
    /// Longest tolerated seeding idle period; zero disables.
    pub seeding_timeout: Duration,
}

impl SeedingPolicy {
    /// Policy with both limits switched off.
    pub const DISABLED: Self = Self {
        seed_ratio: 0,
        seeding_timeout: Duration::ZERO,
    };

    /// Whether the ratio limit applies.
    #[must_use]
    pub const fn ratio_enabled(&self) -> bool {
        self.seed_ratio > 0
    }

    /// Whether the idle timeout applies.
    #[must_use]
    pub const fn timeout_enabled(&self) -> bool {
        !self.seeding_timeout.is_zero()
    }
}

impl Default for SeedingPolicy {
    fn default() -> Self {
        Self {
            seed_ratio: 3,
            seeding_timeout: Duration::from_secs(3_600),
        }
    }
}

/// Notifications an engine raises about individual transfers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineAlert {
    /// The transfer finished downloading.
    TransferFinished {
        /// Transfer that finished.
        transfer_id: TransferId,
        /// Display name at the time of the alert.
        name: String,
    },
    /// The transfer entered an error state.
    TransferFailed {
        /// Transfer that failed.
        transfer_id: TransferId,
        /// Display name at the time of the alert.
        name: String,
        /// Engine-provided failure description.
        message: String,
    },
    /// Reading or writing a payload file failed.
    FileError {
        /// Transfer owning the file.
        transfer_id: TransferId,
        /// Display name at the time of the alert.
        name: String,
        /// File path involved.
        path: String,
        /// Engine-provided failure description.
        message: String,
    },
}

impl EngineAlert {
    /// Transfer the alert refers to.
    #[must_use]
    pub const fn transfer_id(&self) -> TransferId {
        match self {
            Self::TransferFinished { transfer_id, .. }
            | Self::TransferFailed { transfer_id, .. }
            | Self::FileError { transfer_id, .. } => *transfer_id,
        }
    }

    /// Machine-friendly discriminator.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::TransferFinished { .. } => "transfer_finished",
            Self::TransferFailed { .. } => "transfer_failed",
            Self::FileError { .. } => "file_error",
        }
    }
}
