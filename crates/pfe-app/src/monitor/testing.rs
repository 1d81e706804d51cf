//! Scripted engine and recording observer shared by monitor tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use pfe_torrent_core::{
    ContentHash, EncodingError, EngineAlert, EngineError, EngineResult, HASH_LEN, TransferActivity,
    TransferEngine, TransferId, TransferStatus,
};

use super::fanout::TransferObserver;

#[derive(Default)]
struct Script {
    statuses: BTreeMap<u64, TransferStatus>,
    pause_calls: BTreeMap<u64, u32>,
    failing_status: HashSet<u64>,
    failing_pause: HashSet<u64>,
    broken_hash: HashSet<u64>,
    alerts: Vec<EngineAlert>,
    failing_listing: bool,
    ignore_pause: bool,
}

/// Engine whose status reports are set directly by the test.
#[derive(Default)]
pub(crate) struct ScriptedEngine {
    script: Mutex<Script>,
}

impl ScriptedEngine {
    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set(&self, id: u64, status: TransferStatus) {
        self.lock().statuses.insert(id, status);
    }

    pub(crate) fn update(&self, id: u64, change: impl FnOnce(&mut TransferStatus)) {
        if let Some(status) = self.lock().statuses.get_mut(&id) {
            change(status);
        }
    }

    pub(crate) fn pause_calls(&self, id: u64) -> u32 {
        self.lock().pause_calls.get(&id).copied().unwrap_or(0)
    }

    pub(crate) fn fail_status(&self, id: u64) {
        self.lock().failing_status.insert(id);
    }

    pub(crate) fn fail_pause(&self, id: u64) {
        self.lock().failing_pause.insert(id);
    }

    pub(crate) fn break_hash(&self, id: u64) {
        self.lock().broken_hash.insert(id);
    }

    pub(crate) fn fail_listing(&self, failing: bool) {
        self.lock().failing_listing = failing;
    }

    pub(crate) fn ignore_pause(&self) {
        self.lock().ignore_pause = true;
    }

    pub(crate) fn push_alert(&self, alert: EngineAlert) {
        self.lock().alerts.push(alert);
    }

    pub(crate) fn pending_alerts(&self) -> usize {
        self.lock().alerts.len()
    }
}

pub(crate) fn downloading(progress: f64, size: u64) -> TransferStatus {
    TransferStatus {
        progress,
        paused: false,
        finished: false,
        uploaded_payload_bytes: 0,
        total_size_bytes: size,
        name: "scripted".into(),
    }
}

pub(crate) fn seeding(size: u64, uploaded: u64) -> TransferStatus {
    TransferStatus {
        progress: 1.0,
        paused: false,
        finished: true,
        uploaded_payload_bytes: uploaded,
        total_size_bytes: size,
        name: "scripted".into(),
    }
}

#[async_trait]
impl TransferEngine for ScriptedEngine {
    type Handle = u64;

    async fn list_active(&self) -> EngineResult<Vec<u64>> {
        let script = self.lock();
        if script.failing_listing {
            return Err(EngineError::operation_failed("list_active", None, "scripted failure"));
        }
        Ok(script.statuses.keys().copied().collect())
    }

    async fn status(&self, handle: &u64) -> EngineResult<TransferStatus> {
        let script = self.lock();
        if script.failing_status.contains(handle) {
            return Err(EngineError::operation_failed(
                "status",
                Some(TransferId::new(*handle)),
                "scripted failure",
            ));
        }
        script
            .statuses
            .get(handle)
            .cloned()
            .ok_or(EngineError::NotFound {
                transfer_id: TransferId::new(*handle),
            })
    }

    async fn pause(&self, handle: &u64) -> EngineResult<()> {
        let mut guard = self.lock();
        let script = &mut *guard;
        *script.pause_calls.entry(*handle).or_default() += 1;
        if script.failing_pause.contains(handle) {
            return Err(EngineError::operation_failed(
                "pause",
                Some(TransferId::new(*handle)),
                "scripted failure",
            ));
        }
        if !script.ignore_pause {
            if let Some(status) = script.statuses.get_mut(handle) {
                status.paused = true;
            }
        }
        Ok(())
    }

    fn resolve_identity(&self, handle: &u64) -> TransferId {
        TransferId::new(*handle)
    }

    fn content_hash(&self, handle: &u64) -> Result<ContentHash, EncodingError> {
        if self.lock().broken_hash.contains(handle) {
            return Err(EncodingError::Length {
                expected: HASH_LEN,
                actual: 0,
            });
        }
        let mut bytes = [0_u8; HASH_LEN];
        bytes[..8].copy_from_slice(&handle.to_be_bytes());
        Ok(ContentHash::from_bytes(bytes))
    }

    async fn poll_alerts(&self) -> EngineResult<Vec<EngineAlert>> {
        Ok(std::mem::take(&mut self.lock().alerts))
    }
}

/// Observer that records batch sizes and the ids it was handed.
#[derive(Default)]
pub(crate) struct RecordingObserver {
    progress: Mutex<Vec<Vec<u64>>>,
    stopped: Mutex<Vec<Vec<TransferActivity>>>,
}

impl RecordingObserver {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn progress_batches(&self) -> Vec<Vec<u64>> {
        self.progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn stopped_batches(&self) -> Vec<Vec<TransferActivity>> {
        self.stopped
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl TransferObserver for RecordingObserver {
    fn name(&self) -> &str {
        "recording"
    }

    async fn on_progress(&self, batch: &[TransferActivity]) -> anyhow::Result<()> {
        self.progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(batch.iter().map(|record| record.id.get()).collect());
        Ok(())
    }

    async fn on_stopped(&self, batch: &[TransferActivity]) -> anyhow::Result<()> {
        self.stopped
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(batch.to_vec());
        Ok(())
    }
}
