//! Built-in observers: structured logging and event bus publication.

use async_trait::async_trait;
use pfe_events::{Event, EventBus, ProgressEntry, StopReason, StoppedEntry};
use pfe_torrent_core::{ActivityState, TransferActivity};
use tracing::info;

use crate::monitor::TransferObserver;

/// Writes one log line per record in every batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingObserver;

#[async_trait]
impl TransferObserver for LoggingObserver {
    fn name(&self) -> &str {
        "logging"
    }

    async fn on_progress(&self, batch: &[TransferActivity]) -> anyhow::Result<()> {
        for record in batch {
            info!(
                transfer_id = %record.id,
                name = %record.label(),
                progress_percent = record.progress_percent,
                size_bytes = record.size_bytes,
                "transfer progress"
            );
        }
        Ok(())
    }

    async fn on_stopped(&self, batch: &[TransferActivity]) -> anyhow::Result<()> {
        for record in batch {
            info!(
                transfer_id = %record.id,
                name = %record.label(),
                state = %record.state,
                uploaded_bytes = record.uploaded_bytes,
                ratio = record.share_ratio().unwrap_or_default(),
                "transfer stopped"
            );
        }
        Ok(())
    }
}

/// Publishes each batch as a single [`Event`] on the bus.
#[derive(Clone)]
pub struct EventBusObserver {
    bus: EventBus,
}

impl EventBusObserver {
    /// Observer publishing on `bus`.
    #[must_use]
    pub const fn new(bus: EventBus) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl TransferObserver for EventBusObserver {
    fn name(&self) -> &str {
        "event-bus"
    }

    async fn on_progress(&self, batch: &[TransferActivity]) -> anyhow::Result<()> {
        let transfers = batch.iter().map(progress_entry).collect();
        let _ = self.bus.publish(Event::Progress { transfers });
        Ok(())
    }

    async fn on_stopped(&self, batch: &[TransferActivity]) -> anyhow::Result<()> {
        let transfers = batch
            .iter()
            .map(stopped_entry)
            .collect::<anyhow::Result<Vec<_>>>()?;
        let _ = self.bus.publish(Event::Stopped { transfers });
        Ok(())
    }
}

fn progress_entry(record: &TransferActivity) -> ProgressEntry {
    ProgressEntry {
        transfer_id: record.id.get(),
        name: record.label(),
        progress_percent: record.progress_percent,
        size_bytes: record.size_bytes,
    }
}

fn stopped_entry(record: &TransferActivity) -> anyhow::Result<StoppedEntry> {
    let reason = match record.state {
        ActivityState::RatioComplete => StopReason::RatioComplete,
        ActivityState::TimedOut => StopReason::TimedOut,
        ActivityState::Paused => StopReason::Paused,
        state @ (ActivityState::Active | ActivityState::FinishedDownload) => {
            anyhow::bail!("transfer {} reported stopped in state {state}", record.id)
        }
    };
    Ok(StoppedEntry {
        transfer_id: record.id.get(),
        hash: record.hash.map(|hash| hash.to_base32()),
        name: record.label(),
        reason,
        uploaded_bytes: record.uploaded_bytes,
        size_bytes: record.size_bytes,
    })
}
