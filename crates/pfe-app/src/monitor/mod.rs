//! Lifecycle monitor: periodic supervision of every transfer an engine holds.
//!
//! # Design
//! - One background task owns the [`ActivityStore`] and runs every tick;
//!   snapshot and forget requests reach it over a command channel and are
//!   served between ticks.
//! - Records survive `shutdown`; the store is handed back by the task and
//!   moved into the next run.
//! - The observer registry is the only state shared with callers.

mod fanout;
mod policy;
mod sampler;
mod store;
#[cfg(test)]
mod testing;
mod worker;

use std::sync::Arc;
use std::time::Duration;

use pfe_telemetry::Metrics;
use pfe_torrent_core::{SeedingPolicy, TransferActivity, TransferEngine, TransferId};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::info;

use crate::error::{AppError, AppResult};

pub use fanout::{
    DeliveryReport, NotificationFanout, ObserverId, ObserverRegistry, TransferObserver,
};
pub use policy::{PolicyEvaluator, StopCause, Verdict};
pub use sampler::{Sample, apply_status};
pub use store::ActivityStore;

use worker::{Command, Worker};

const COMMAND_QUEUE_DEPTH: usize = 16;

/// Reference tick period.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(1_000);
/// Longest a tick waits for observers before abandoning their delivery.
pub const DEFAULT_OBSERVER_DEADLINE: Duration = Duration::from_secs(5);

/// Monitor tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Seeding limits enforced on finished transfers.
    pub policy: SeedingPolicy,
    /// Fixed interval between ticks; must be non-zero.
    pub tick_period: Duration,
    /// Per-tick observer delivery deadline.
    pub observer_deadline: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            policy: SeedingPolicy::default(),
            tick_period: DEFAULT_TICK_PERIOD,
            observer_deadline: DEFAULT_OBSERVER_DEADLINE,
        }
    }
}

/// Externally visible run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorStatus {
    /// No tick loop is running.
    Stopped,
    /// The tick loop is scheduled.
    Running,
}

enum MonitorState {
    Stopped(ActivityStore),
    Running {
        commands: mpsc::Sender<Command>,
        worker: JoinHandle<ActivityStore>,
    },
}

/// Periodically samples an engine, enforces the seeding policy, and notifies
/// observers.
pub struct LifecycleMonitor<E>
where
    E: TransferEngine + 'static,
{
    engine: Arc<E>,
    config: MonitorConfig,
    metrics: Metrics,
    observers: ObserverRegistry,
    state: Mutex<MonitorState>,
}

impl<E> LifecycleMonitor<E>
where
    E: TransferEngine + 'static,
{
    /// Build a stopped monitor over `engine`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidConfig`] when the tick period is zero.
    pub fn new(engine: Arc<E>, config: MonitorConfig, metrics: Metrics) -> AppResult<Self> {
        if config.tick_period.is_zero() {
            return Err(AppError::InvalidConfig {
                field: "tick_period",
                reason: "must be greater than zero",
                value: Some(format!("{:?}", config.tick_period)),
            });
        }
        Ok(Self {
            engine,
            config,
            metrics,
            observers: ObserverRegistry::new(),
            state: Mutex::new(MonitorState::Stopped(ActivityStore::new())),
        })
    }

    /// Engine under supervision.
    #[must_use]
    pub const fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Configuration in force.
    #[must_use]
    pub const fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Metrics the tick loop updates.
    #[must_use]
    pub const fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Register an observer for every subsequent tick.
    pub async fn register_observer(&self, observer: Arc<dyn TransferObserver>) -> ObserverId {
        self.observers.register(observer).await
    }

    /// Unregister an observer; it receives no calls once this returns.
    pub async fn unregister_observer(&self, id: ObserverId) -> bool {
        self.observers.unregister(id).await
    }

    /// Current run state.
    pub async fn status(&self) -> MonitorStatus {
        match &*self.state.lock().await {
            MonitorState::Stopped(_) => MonitorStatus::Stopped,
            MonitorState::Running { .. } => MonitorStatus::Running,
        }
    }

    /// Transition `STOPPED -> RUNNING` and begin ticking.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidState`] when the monitor is already running.
    pub async fn start(&self) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let store = match std::mem::replace(&mut *state, MonitorState::Stopped(ActivityStore::new()))
        {
            MonitorState::Stopped(store) => store,
            running @ MonitorState::Running { .. } => {
                *state = running;
                return Err(AppError::InvalidState {
                    operation: "monitor.start",
                    state: "running",
                });
            }
        };

        let (commands, receiver) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let fanout = NotificationFanout::new(
            self.observers.clone(),
            self.config.observer_deadline,
            self.metrics.clone(),
        );
        let worker = Worker::new(
            Arc::clone(&self.engine),
            store,
            PolicyEvaluator::new(self.config.policy),
            fanout,
            self.metrics.clone(),
        )
        .spawn(self.config.tick_period, receiver);
        *state = MonitorState::Running { commands, worker };
        info!(
            seed_ratio = self.config.policy.seed_ratio,
            seeding_timeout_secs = self.config.policy.seeding_timeout.as_secs(),
            "lifecycle monitor running"
        );
        Ok(())
    }

    /// Transition `RUNNING -> STOPPED`. An in-flight tick completes first.
    /// Stopping a stopped monitor is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::WorkerFailed`] when the tick loop task panicked;
    /// the monitor is stopped with an empty store in that case.
    pub async fn shutdown(&self) -> AppResult<()> {
        let mut state = self.state.lock().await;
        match std::mem::replace(&mut *state, MonitorState::Stopped(ActivityStore::new())) {
            stopped @ MonitorState::Stopped(_) => {
                *state = stopped;
                Ok(())
            }
            MonitorState::Running { commands, worker } => {
                drop(commands);
                let store = worker.await.map_err(|source| AppError::WorkerFailed {
                    operation: "monitor.shutdown",
                    source,
                })?;
                *state = MonitorState::Stopped(store);
                Ok(())
            }
        }
    }

    /// Copies of every activity record, ordered by identity.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::WorkerUnavailable`] when the tick loop has died.
    pub async fn snapshot(&self) -> AppResult<Vec<TransferActivity>> {
        let state = self.state.lock().await;
        match &*state {
            MonitorState::Stopped(store) => Ok(store.snapshot()),
            MonitorState::Running { commands, .. } => {
                let (reply, response) = oneshot::channel();
                request(commands, Command::Snapshot(reply), response, "monitor.snapshot").await
            }
        }
    }

    /// Drop the activity record for `id`, returning it. Intended for callers
    /// that learn of transfer removal from the engine.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::WorkerUnavailable`] when the tick loop has died.
    pub async fn forget(&self, id: TransferId) -> AppResult<Option<TransferActivity>> {
        let mut state = self.state.lock().await;
        match &mut *state {
            MonitorState::Stopped(store) => Ok(store.forget(id)),
            MonitorState::Running { commands, .. } => {
                let (reply, response) = oneshot::channel();
                request(
                    commands,
                    Command::Forget { id, reply },
                    response,
                    "monitor.forget",
                )
                .await
            }
        }
    }
}

async fn request<T>(
    commands: &mpsc::Sender<Command>,
    command: Command,
    response: oneshot::Receiver<T>,
    operation: &'static str,
) -> AppResult<T> {
    commands
        .send(command)
        .await
        .map_err(|_| AppError::WorkerUnavailable { operation })?;
    response
        .await
        .map_err(|_| AppError::WorkerUnavailable { operation })
}
