//! Observer registry and per-tick batch delivery.
//!
//! # Design
//! - One delivery per observer per tick: `on_progress` then `on_stopped`,
//!   each only when its batch is non-empty.
//! - Every delivery runs in its own task under a shared deadline, so a
//!   failing, panicking, or stuck observer cannot hold up the others or the
//!   tick loop beyond the deadline.
//! - Dispatch copies the registered entries and releases the registry before
//!   any delivery starts, so `register` and `unregister` never wait on a tick.
//! - Each entry carries an activity gate. A delivery holds the gate's read
//!   guard for both callbacks; `unregister` closes it under the write guard,
//!   so it waits only on that observer's in-flight call and no call starts
//!   once it returns. An observer unregistering itself from a callback must
//!   spawn the call.
//! - Monitor commands (`snapshot`, `forget`) are served between ticks; a
//!   callback awaiting one stalls until the deadline.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use pfe_telemetry::Metrics;
use pfe_torrent_core::TransferActivity;
use tokio::sync::RwLock;
use tokio::time::{Instant, timeout_at};
use tracing::{error, warn};

/// Receiver of per-tick monitor batches.
///
/// Both callbacks default to doing nothing so an observer only implements the
/// batches it cares about.
#[async_trait]
pub trait TransferObserver: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str {
        "observer"
    }

    /// Records whose whole-percent progress advanced this tick.
    async fn on_progress(&self, batch: &[TransferActivity]) -> anyhow::Result<()> {
        let _ = batch;
        Ok(())
    }

    /// Records that stopped this tick (ratio reached, timed out, or paused).
    async fn on_stopped(&self, batch: &[TransferActivity]) -> anyhow::Result<()> {
        let _ = batch;
        Ok(())
    }
}

/// Handle returned by registration, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl Display for ObserverId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "observer-{}", self.0)
    }
}

#[derive(Clone)]
struct Entry {
    id: ObserverId,
    observer: Arc<dyn TransferObserver>,
    active: Arc<RwLock<bool>>,
}

/// Concurrency-safe set of registered observers.
#[derive(Clone, Default)]
pub struct ObserverRegistry {
    entries: Arc<RwLock<Vec<Entry>>>,
    next_id: Arc<AtomicU64>,
}

impl ObserverRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer; it receives every batch dispatched after this call
    /// returns.
    pub async fn register(&self, observer: Arc<dyn TransferObserver>) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.entries.write().await.push(Entry {
            id,
            observer,
            active: Arc::new(RwLock::new(true)),
        });
        id
    }

    /// Remove an observer. Returns `false` when the id is unknown. Once this
    /// returns the observer receives no further calls.
    pub async fn unregister(&self, id: ObserverId) -> bool {
        let removed = {
            let mut entries = self.entries.write().await;
            entries
                .iter()
                .position(|entry| entry.id == id)
                .map(|index| entries.remove(index))
        };
        match removed {
            Some(entry) => {
                *entry.active.write().await = false;
                true
            }
            None => false,
        }
    }

    async fn current(&self) -> Vec<Entry> {
        self.entries.read().await.clone()
    }

    /// Number of registered observers.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether no observers are registered.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Observers a delivery was started for.
    pub attempted: usize,
    /// Deliveries that failed, panicked, or missed the deadline.
    pub failed: usize,
}

/// Delivers tick batches to every registered observer.
#[derive(Clone)]
pub struct NotificationFanout {
    registry: ObserverRegistry,
    deadline: Duration,
    metrics: Metrics,
}

impl NotificationFanout {
    /// Fanout over `registry` with a per-tick delivery deadline.
    #[must_use]
    pub const fn new(registry: ObserverRegistry, deadline: Duration, metrics: Metrics) -> Self {
        Self {
            registry,
            deadline,
            metrics,
        }
    }

    /// Deliver one tick's batches. Does nothing when both are empty.
    pub async fn dispatch(
        &self,
        progress: Vec<TransferActivity>,
        stopped: Vec<TransferActivity>,
    ) -> DeliveryReport {
        if progress.is_empty() && stopped.is_empty() {
            return DeliveryReport::default();
        }
        let progress: Arc<[TransferActivity]> = progress.into();
        let stopped: Arc<[TransferActivity]> = stopped.into();

        let entries = self.registry.current().await;
        let deadline = Instant::now() + self.deadline;
        let mut deliveries = Vec::with_capacity(entries.len());
        for Entry {
            id,
            observer,
            active,
        } in entries
        {
            let name = observer.name().to_string();
            let progress = Arc::clone(&progress);
            let stopped = Arc::clone(&stopped);
            let task = tokio::spawn(async move {
                let gate = active.read().await;
                if !*gate {
                    return Ok(());
                }
                if !progress.is_empty() {
                    observer
                        .on_progress(&progress)
                        .await
                        .context("progress delivery failed")?;
                }
                if !stopped.is_empty() {
                    observer
                        .on_stopped(&stopped)
                        .await
                        .context("stopped delivery failed")?;
                }
                drop(gate);
                Ok::<(), anyhow::Error>(())
            });
            deliveries.push((id, name, task));
        }

        let mut report = DeliveryReport {
            attempted: deliveries.len(),
            failed: 0,
        };
        for (id, name, mut task) in deliveries {
            let failed = match timeout_at(deadline, &mut task).await {
                Ok(Ok(Ok(()))) => false,
                Ok(Ok(Err(err))) => {
                    warn!(observer = %id, name = %name, error = %format!("{err:#}"), "observer delivery failed");
                    true
                }
                Ok(Err(join_err)) => {
                    error!(observer = %id, name = %name, error = %join_err, "observer delivery panicked");
                    true
                }
                Err(_) => {
                    task.abort();
                    warn!(
                        observer = %id,
                        name = %name,
                        deadline_ms = u64::try_from(self.deadline.as_millis()).unwrap_or(u64::MAX),
                        "observer delivery timed out"
                    );
                    true
                }
            };
            if failed {
                report.failed += 1;
                self.metrics.inc_observer_failure();
            }
        }
        report
    }
}
