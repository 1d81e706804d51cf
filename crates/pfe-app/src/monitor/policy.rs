//! Seeding policy decisions.
//!
//! # Design
//! - Pure: the evaluator reads a sampled record and returns a verdict; the
//!   tick loop applies state changes and engine commands.
//! - Ratio is checked before the idle timeout, so a tick satisfying both
//!   ends in `RatioComplete`.

use std::time::Instant;

use pfe_torrent_core::{ActivityState, SeedingPolicy, TransferActivity};

use super::sampler::Sample;

/// Why a policy stopped a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    /// Uploaded more than `seed_ratio` times the payload size.
    RatioComplete,
    /// Seeding stayed idle past the timeout.
    TimedOut,
}

impl StopCause {
    /// Terminal state the cause maps to.
    #[must_use]
    pub const fn state(self) -> ActivityState {
        match self {
            Self::RatioComplete => ActivityState::RatioComplete,
            Self::TimedOut => ActivityState::TimedOut,
        }
    }
}

/// Outcome of evaluating one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Keep seeding; no engine action.
    Continue,
    /// Enter a terminal state and pause the transfer.
    Stop(StopCause),
}

/// Applies a [`SeedingPolicy`] to sampled records.
#[derive(Debug, Clone, Copy)]
pub struct PolicyEvaluator {
    policy: SeedingPolicy,
}

impl PolicyEvaluator {
    /// Evaluator for `policy`.
    #[must_use]
    pub const fn new(policy: SeedingPolicy) -> Self {
        Self { policy }
    }

    /// Policy in force.
    #[must_use]
    pub const fn policy(&self) -> SeedingPolicy {
        self.policy
    }

    /// Decide whether the sampled record should stop.
    ///
    /// Records that are still downloading or already stopped always continue,
    /// which keeps the pause command to one per terminal entry.
    #[must_use]
    pub fn evaluate(&self, activity: &TransferActivity, sample: &Sample, now: Instant) -> Verdict {
        if !sample.finished || activity.state.is_stopped() {
            return Verdict::Continue;
        }
        if self.ratio_reached(activity) {
            return Verdict::Stop(StopCause::RatioComplete);
        }
        if self.policy.timeout_enabled()
            && !sample.uploaded
            && activity.idle_for(now) > self.policy.seeding_timeout
        {
            return Verdict::Stop(StopCause::TimedOut);
        }
        Verdict::Continue
    }

    fn ratio_reached(&self, activity: &TransferActivity) -> bool {
        if !self.policy.ratio_enabled() || activity.size_bytes == 0 {
            return false;
        }
        let threshold = activity
            .size_bytes
            .saturating_mul(u64::from(self.policy.seed_ratio));
        activity.uploaded_bytes > threshold
    }
}
