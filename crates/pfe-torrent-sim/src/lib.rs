#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(
    missing_docs,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]

//! Deterministic in-memory transfer engine.
//!
//! Transfers move only when [`SimulatedEngine::advance`] is called, so hosts
//! and tests decide how simulated time relates to wall-clock time. Failure
//! injection hooks let callers exercise the monitor's error paths.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use pfe_torrent_core::{
    ContentHash, EncodingError, EngineAlert, EngineError, EngineResult, TransferEngine,
    TransferId, TransferStatus,
};
use tracing::debug;

/// Session-wide behaviour of the simulated engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimSettings {
    /// Whether finished downloads keep seeding; when false they are paused
    /// as soon as they complete.
    pub seed_after_download: bool,
}

/// Description of a transfer to add.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimTransferSpec {
    /// Hex-encoded info hash; invalid text surfaces as an encoding error.
    pub info_hash_hex: String,
    /// Display name.
    pub name: String,
    /// Total payload size in bytes.
    pub size_bytes: u64,
    /// Download rate in bytes per second.
    pub download_bps: u64,
    /// Upload rate in bytes per second while seeding.
    pub upload_bps: u64,
    /// Total bytes peers will ever request; `None` means unbounded.
    pub upload_budget: Option<u64>,
    /// Start with the payload complete (seed mode).
    pub seed: bool,
    /// Add the transfer paused.
    pub start_paused: bool,
}

impl SimTransferSpec {
    /// Downloading transfer with the given hash, name and size and no traffic.
    #[must_use]
    pub fn new(info_hash_hex: impl Into<String>, name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            info_hash_hex: info_hash_hex.into(),
            name: name.into(),
            size_bytes,
            download_bps: 0,
            upload_bps: 0,
            upload_budget: None,
            seed: false,
            start_paused: false,
        }
    }
}

#[derive(Debug, Clone)]
struct SimTransfer {
    spec: SimTransferSpec,
    downloaded: u64,
    uploaded: u64,
    paused: bool,
    finish_reported: bool,
    trackers: Vec<String>,
    pause_calls: u32,
}

impl SimTransfer {
    fn from_spec(spec: SimTransferSpec) -> Self {
        let downloaded = if spec.seed { spec.size_bytes } else { 0 };
        Self {
            paused: spec.start_paused,
            finish_reported: spec.seed,
            downloaded,
            uploaded: 0,
            trackers: Vec::new(),
            pause_calls: 0,
            spec,
        }
    }

    const fn finished(&self) -> bool {
        self.downloaded >= self.spec.size_bytes
    }

    #[allow(clippy::cast_precision_loss)]
    fn status(&self) -> TransferStatus {
        let progress = if self.spec.size_bytes == 0 {
            1.0
        } else {
            self.downloaded as f64 / self.spec.size_bytes as f64
        };
        TransferStatus {
            progress,
            paused: self.paused,
            finished: self.finished(),
            uploaded_payload_bytes: self.uploaded,
            total_size_bytes: self.spec.size_bytes,
            name: self.spec.name.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct SimState {
    next_id: u64,
    transfers: BTreeMap<TransferId, SimTransfer>,
    pending_alerts: Vec<EngineAlert>,
    failing_status: HashSet<TransferId>,
    failing_pause: HashSet<TransferId>,
    ignoring_pause: HashSet<TransferId>,
    failing_listing: bool,
}

/// In-memory [`TransferEngine`] driven by explicit time steps.
#[derive(Debug, Default)]
pub struct SimulatedEngine {
    settings: SimSettings,
    state: Mutex<SimState>,
}

impl SimulatedEngine {
    /// Engine with the given session settings.
    #[must_use]
    pub fn new(settings: SimSettings) -> Self {
        Self {
            settings,
            state: Mutex::new(SimState::default()),
        }
    }

    /// Session settings the engine was created with.
    #[must_use]
    pub const fn settings(&self) -> &SimSettings {
        &self.settings
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a transfer and return its freshly assigned identity.
    pub fn add_transfer(&self, spec: SimTransferSpec) -> TransferId {
        let mut state = self.lock();
        state.next_id += 1;
        let id = TransferId::new(state.next_id);
        debug!(transfer_id = %id, name = %spec.name, "simulated transfer added");
        state
            .transfers
            .insert(id, SimTransfer::from_spec(spec));
        id
    }

    /// Remove a transfer.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when the transfer is unknown.
    pub fn remove(&self, id: TransferId) -> EngineResult<()> {
        self.lock()
            .transfers
            .remove(&id)
            .map(|_| ())
            .ok_or(EngineError::NotFound { transfer_id: id })
    }

    /// Identity of the transfer whose info hash matches `hash`.
    #[must_use]
    pub fn find_by_hash(&self, hash: &ContentHash) -> Option<TransferId> {
        self.lock().transfers.iter().find_map(|(id, transfer)| {
            ContentHash::from_hex(&transfer.spec.info_hash_hex)
                .ok()
                .filter(|candidate| candidate == hash)
                .map(|_| *id)
        })
    }

    /// Identities of every transfer, paused or not.
    #[must_use]
    pub fn transfer_ids(&self) -> Vec<TransferId> {
        self.lock().transfers.keys().copied().collect()
    }

    /// Trackers attached to a transfer.
    #[must_use]
    pub fn trackers(&self, id: TransferId) -> Vec<String> {
        self.lock()
            .transfers
            .get(&id)
            .map(|transfer| transfer.trackers.clone())
            .unwrap_or_default()
    }

    /// Number of pause commands the transfer has received.
    #[must_use]
    pub fn pause_calls(&self, id: TransferId) -> u32 {
        self.lock()
            .transfers
            .get(&id)
            .map_or(0, |transfer| transfer.pause_calls)
    }

    /// Whether every transfer is currently paused.
    #[must_use]
    pub fn all_paused(&self) -> bool {
        self.lock().transfers.values().all(|transfer| transfer.paused)
    }

    /// Change a transfer's traffic rates.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when the transfer is unknown.
    pub fn set_rates(&self, id: TransferId, download_bps: u64, upload_bps: u64) -> EngineResult<()> {
        let mut state = self.lock();
        let transfer = state
            .transfers
            .get_mut(&id)
            .ok_or(EngineError::NotFound { transfer_id: id })?;
        transfer.spec.download_bps = download_bps;
        transfer.spec.upload_bps = upload_bps;
        Ok(())
    }

    /// Make status queries for `id` fail (or succeed again).
    pub fn fail_status(&self, id: TransferId, failing: bool) {
        toggle(&mut self.lock().failing_status, id, failing);
    }

    /// Make pause commands for `id` fail (or succeed again).
    pub fn fail_pause(&self, id: TransferId, failing: bool) {
        toggle(&mut self.lock().failing_pause, id, failing);
    }

    /// Accept pause commands for `id` without ever pausing it.
    pub fn ignore_pause(&self, id: TransferId, ignoring: bool) {
        toggle(&mut self.lock().ignoring_pause, id, ignoring);
    }

    /// Make transfer enumeration fail (or succeed again).
    pub fn fail_listing(&self, failing: bool) {
        self.lock().failing_listing = failing;
    }

    /// Move every running transfer forward by `elapsed`.
    ///
    /// Downloads progress at their download rate; finished transfers upload
    /// at their upload rate until the upload budget is spent. The first time
    /// a transfer completes a [`EngineAlert::TransferFinished`] alert is
    /// queued, and the transfer is paused unless the session seeds after
    /// download.
    pub fn advance(&self, elapsed: Duration) {
        let seed_after_download = self.settings.seed_after_download;
        let mut guard = self.lock();
        let state = &mut *guard;
        for (id, transfer) in &mut state.transfers {
            if transfer.paused {
                continue;
            }
            if transfer.finished() {
                let budget_left = transfer
                    .spec
                    .upload_budget
                    .map_or(u64::MAX, |budget| budget.saturating_sub(transfer.uploaded));
                let step = bytes_for(transfer.spec.upload_bps, elapsed).min(budget_left);
                transfer.uploaded = transfer.uploaded.saturating_add(step);
                continue;
            }

            let step = bytes_for(transfer.spec.download_bps, elapsed);
            transfer.downloaded = transfer
                .downloaded
                .saturating_add(step)
                .min(transfer.spec.size_bytes);
            if transfer.finished() && !transfer.finish_reported {
                transfer.finish_reported = true;
                state.pending_alerts.push(EngineAlert::TransferFinished {
                    transfer_id: *id,
                    name: transfer.spec.name.clone(),
                });
                if !seed_after_download {
                    transfer.paused = true;
                    debug!(transfer_id = %id, "download finished; seeding disabled, pausing");
                }
            }
        }
    }

    /// Queue an arbitrary alert for the next poll.
    pub fn push_alert(&self, alert: EngineAlert) {
        self.lock().pending_alerts.push(alert);
    }
}

fn toggle(set: &mut HashSet<TransferId>, id: TransferId, enabled: bool) {
    if enabled {
        set.insert(id);
    } else {
        set.remove(&id);
    }
}

fn bytes_for(rate_bps: u64, elapsed: Duration) -> u64 {
    let bytes = u128::from(rate_bps) * elapsed.as_millis() / 1_000;
    u64::try_from(bytes).unwrap_or(u64::MAX)
}

#[async_trait]
impl TransferEngine for SimulatedEngine {
    type Handle = TransferId;

    async fn list_active(&self) -> EngineResult<Vec<TransferId>> {
        let state = self.lock();
        if state.failing_listing {
            return Err(EngineError::operation_failed(
                "list_active",
                None,
                "injected listing failure",
            ));
        }
        Ok(state.transfers.keys().copied().collect())
    }

    async fn status(&self, handle: &TransferId) -> EngineResult<TransferStatus> {
        let state = self.lock();
        if state.failing_status.contains(handle) {
            return Err(EngineError::operation_failed(
                "status",
                Some(*handle),
                "injected status failure",
            ));
        }
        state
            .transfers
            .get(handle)
            .map(SimTransfer::status)
            .ok_or(EngineError::NotFound {
                transfer_id: *handle,
            })
    }

    async fn pause(&self, handle: &TransferId) -> EngineResult<()> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let transfer = state
            .transfers
            .get_mut(handle)
            .ok_or(EngineError::NotFound {
                transfer_id: *handle,
            })?;
        transfer.pause_calls += 1;
        if state.failing_pause.contains(handle) {
            return Err(EngineError::operation_failed(
                "pause",
                Some(*handle),
                "injected pause failure",
            ));
        }
        if !state.ignoring_pause.contains(handle) {
            transfer.paused = true;
        }
        Ok(())
    }

    fn resolve_identity(&self, handle: &TransferId) -> TransferId {
        *handle
    }

    fn content_hash(&self, handle: &TransferId) -> Result<ContentHash, EncodingError> {
        let state = self.lock();
        let transfer = state
            .transfers
            .get(handle)
            .ok_or(EncodingError::Unavailable {
                transfer_id: *handle,
            })?;
        ContentHash::from_hex(&transfer.spec.info_hash_hex)
    }

    async fn resume(&self, handle: &TransferId) -> EngineResult<()> {
        let mut state = self.lock();
        let transfer = state
            .transfers
            .get_mut(handle)
            .ok_or(EngineError::NotFound {
                transfer_id: *handle,
            })?;
        transfer.paused = false;
        Ok(())
    }

    async fn add_trackers(&self, handle: &TransferId, trackers: &[String]) -> EngineResult<()> {
        let mut state = self.lock();
        let transfer = state
            .transfers
            .get_mut(handle)
            .ok_or(EngineError::NotFound {
                transfer_id: *handle,
            })?;
        for tracker in trackers {
            if !transfer.trackers.contains(tracker) {
                transfer.trackers.push(tracker.clone());
            }
        }
        Ok(())
    }

    async fn poll_alerts(&self) -> EngineResult<Vec<EngineAlert>> {
        Ok(std::mem::take(&mut self.lock().pending_alerts))
    }
}
