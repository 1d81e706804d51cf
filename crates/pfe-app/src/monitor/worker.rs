//! Tick loop: sample, evaluate, act, notify.

use std::sync::Arc;
use std::time::Duration;

use pfe_telemetry::Metrics;
use pfe_torrent_core::{
    ActivityState, EngineAlert, TransferActivity, TransferEngine, TransferId,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::fanout::{DeliveryReport, NotificationFanout};
use super::policy::{PolicyEvaluator, StopCause, Verdict};
use super::sampler::apply_status;
use super::store::ActivityStore;

/// Requests served by the tick loop between ticks.
pub(crate) enum Command {
    Snapshot(oneshot::Sender<Vec<TransferActivity>>),
    Forget {
        id: TransferId,
        reply: oneshot::Sender<Option<TransferActivity>>,
    },
}

/// Summary of one tick, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct TickReport {
    pub(crate) progressed: Vec<TransferId>,
    pub(crate) stopped: Vec<TransferId>,
    pub(crate) delivery: DeliveryReport,
}

pub(crate) struct Worker<E: TransferEngine> {
    engine: Arc<E>,
    store: ActivityStore,
    evaluator: PolicyEvaluator,
    fanout: NotificationFanout,
    metrics: Metrics,
}

impl<E> Worker<E>
where
    E: TransferEngine + 'static,
{
    pub(crate) const fn new(
        engine: Arc<E>,
        store: ActivityStore,
        evaluator: PolicyEvaluator,
        fanout: NotificationFanout,
        metrics: Metrics,
    ) -> Self {
        Self {
            engine,
            store,
            evaluator,
            fanout,
            metrics,
        }
    }

    /// Run the loop until the command channel closes, then hand back the
    /// store. The first tick fires one period after start; a late tick
    /// delays the following ones instead of overlapping them.
    pub(crate) fn spawn(
        mut self,
        period: Duration,
        mut commands: mpsc::Receiver<Command>,
    ) -> JoinHandle<ActivityStore> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
                records = self.store.len(),
                "lifecycle monitor started"
            );
            loop {
                tokio::select! {
                    biased;
                    command = commands.recv() => {
                        match command {
                            Some(command) => self.handle(command),
                            None => break,
                        }
                    }
                    _ = ticker.tick() => {
                        let _ = self.tick().await;
                    }
                }
            }
            info!(records = self.store.len(), "lifecycle monitor stopped");
            self.store
        })
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Snapshot(reply) => {
                let _ = reply.send(self.store.snapshot());
            }
            Command::Forget { id, reply } => {
                let forgotten = self.store.forget(id);
                if forgotten.is_some() {
                    debug!(transfer_id = %id, "activity record forgotten");
                    self.metrics.set_tracked_transfers(self.store.len());
                }
                let _ = reply.send(forgotten);
            }
        }
    }

    pub(crate) async fn tick(&mut self) -> TickReport {
        let now = Instant::now().into_std();
        self.drain_alerts().await;

        let handles = match self.engine.list_active().await {
            Ok(handles) => handles,
            Err(err) => {
                warn!(error = %err, operation = ?err.operation(), "transfer enumeration failed; skipping tick");
                self.metrics.inc_engine_query_failure();
                self.metrics.inc_tick();
                return TickReport::default();
            }
        };

        let mut progress = Vec::new();
        let mut stopped = Vec::new();
        for handle in &handles {
            let id = self.engine.resolve_identity(handle);
            let status = match self.engine.status(handle).await {
                Ok(status) => status,
                Err(err) => {
                    warn!(transfer_id = %id, error = %err, "status query failed; skipping transfer this tick");
                    self.metrics.inc_engine_query_failure();
                    continue;
                }
            };

            if status.paused {
                if let Some(activity) = self.store.get_mut(id) {
                    if matches!(
                        activity.state,
                        ActivityState::Active | ActivityState::FinishedDownload
                    ) {
                        activity.state = ActivityState::Paused;
                        info!(transfer_id = %id, name = %activity.label(), "transfer paused outside the monitor");
                        self.metrics
                            .inc_transfer_stopped(ActivityState::Paused.as_str());
                        stopped.push(activity.clone());
                    }
                }
                continue;
            }

            let engine = &self.engine;
            let activity = self.store.get_or_create(id, now, || {
                engine
                    .content_hash(handle)
                    .map_err(|err| {
                        warn!(transfer_id = %id, error = %err, "content hash unavailable; tracking without it");
                    })
                    .ok()
            });

            if activity.state == ActivityState::Paused {
                activity.state = if status.finished {
                    ActivityState::FinishedDownload
                } else {
                    ActivityState::Active
                };
                activity.last_activity = now;
                info!(transfer_id = %id, state = %activity.state, "transfer resumed");
            }

            let sample = apply_status(activity, &status, now);
            if sample.changed {
                info!(
                    transfer_id = %id,
                    name = %activity.label(),
                    progress_percent = activity.progress_percent,
                    "progress"
                );
                progress.push(activity.clone());
            }
            if sample.just_finished {
                info!(transfer_id = %id, name = %activity.label(), "download finished; seeding");
            }

            let Verdict::Stop(cause) = self.evaluator.evaluate(activity, &sample, now) else {
                continue;
            };
            activity.state = cause.state();
            match cause {
                StopCause::RatioComplete => info!(
                    transfer_id = %id,
                    name = %activity.label(),
                    ratio = activity.share_ratio().unwrap_or_default(),
                    "seeding complete after reaching ratio"
                ),
                StopCause::TimedOut => warn!(
                    transfer_id = %id,
                    name = %activity.label(),
                    idle_secs = activity.idle_for(now).as_secs(),
                    "seeding timed out"
                ),
            }
            self.metrics.inc_transfer_stopped(activity.state.as_str());
            stopped.push(activity.clone());

            if let Err(err) = self.engine.pause(handle).await {
                warn!(transfer_id = %id, error = %err, "pause command failed; not retrying");
                self.metrics.inc_pause_failure();
            }
        }

        self.metrics.set_tracked_transfers(self.store.len());
        let progressed: Vec<TransferId> = progress.iter().map(|record| record.id).collect();
        let stopped_ids: Vec<TransferId> = stopped.iter().map(|record| record.id).collect();
        let delivery = self.fanout.dispatch(progress, stopped).await;
        self.metrics.inc_tick();
        debug!(
            transfers = handles.len(),
            progressed = progressed.len(),
            stopped = stopped_ids.len(),
            observer_failures = delivery.failed,
            "tick complete"
        );

        TickReport {
            progressed,
            stopped: stopped_ids,
            delivery,
        }
    }

    async fn drain_alerts(&self) {
        match self.engine.poll_alerts().await {
            Ok(alerts) => alerts.iter().for_each(log_alert),
            Err(err) => {
                warn!(error = %err, "engine alert polling failed");
                self.metrics.inc_engine_query_failure();
            }
        }
    }

    #[cfg(test)]
    pub(crate) const fn store(&self) -> &ActivityStore {
        &self.store
    }
}

fn log_alert(alert: &EngineAlert) {
    match alert {
        EngineAlert::TransferFinished { transfer_id, name } => {
            info!(transfer_id = %transfer_id, name = %name, "engine reports transfer finished");
        }
        EngineAlert::TransferFailed {
            transfer_id,
            name,
            message,
        } => {
            error!(transfer_id = %transfer_id, name = %name, error = %message, "engine reports transfer failed");
        }
        EngineAlert::FileError {
            transfer_id,
            name,
            path,
            message,
        } => {
            error!(transfer_id = %transfer_id, name = %name, path = %path, error = %message, "engine reports file error");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::fanout::ObserverRegistry;
    use crate::monitor::testing::{RecordingObserver, ScriptedEngine, downloading, seeding};
    use pfe_torrent_core::SeedingPolicy;

    struct Harness {
        engine: Arc<ScriptedEngine>,
        worker: Worker<ScriptedEngine>,
        observer: Arc<RecordingObserver>,
        metrics: Metrics,
    }

    async fn harness(policy: SeedingPolicy) -> anyhow::Result<Harness> {
        let engine = Arc::new(ScriptedEngine::default());
        let metrics = Metrics::new()?;
        let registry = ObserverRegistry::new();
        let observer = RecordingObserver::new();
        let _ = registry.register(observer.clone()).await;
        let fanout = NotificationFanout::new(registry, Duration::from_secs(5), metrics.clone());
        let worker = Worker::new(
            Arc::clone(&engine),
            ActivityStore::new(),
            PolicyEvaluator::new(policy),
            fanout,
            metrics.clone(),
        );
        Ok(Harness {
            engine,
            worker,
            observer,
            metrics,
        })
    }

    fn policy(seed_ratio: u32, timeout_secs: u64) -> SeedingPolicy {
        SeedingPolicy {
            seed_ratio,
            seeding_timeout: Duration::from_secs(timeout_secs),
        }
    }

    fn record(harness: &Harness, raw: u64) -> TransferActivity {
        harness
            .worker
            .store()
            .get(TransferId::new(raw))
            .cloned()
            .expect("record should exist")
    }

    #[tokio::test(start_paused = true)]
    async fn progress_and_upload_are_monotonic() -> anyhow::Result<()> {
        let mut h = harness(SeedingPolicy::DISABLED).await?;
        h.engine.set(1, downloading(0.5, 1_000));
        let _ = h.worker.tick().await;

        h.engine.set(1, downloading(0.3, 1_000));
        let report = h.worker.tick().await;
        assert!(report.progressed.is_empty());
        assert_eq!(record(&h, 1).progress_percent, 50);

        h.engine.set(1, seeding(1_000, 400));
        let _ = h.worker.tick().await;
        h.engine.set(1, seeding(1_000, 100));
        let _ = h.worker.tick().await;
        let current = record(&h, 1);
        assert_eq!(current.progress_percent, 100);
        assert_eq!(current.uploaded_bytes, 400);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn paused_transfers_are_skipped() -> anyhow::Result<()> {
        let mut h = harness(policy(1, 60)).await?;
        let mut paused = downloading(0.5, 1_000);
        paused.paused = true;
        h.engine.set(1, paused);
        let _ = h.worker.tick().await;
        assert!(h.worker.store().get(TransferId::new(1)).is_none());

        h.engine.set(2, seeding(1_000, 10));
        let _ = h.worker.tick().await;
        h.engine.update(2, |status| {
            status.paused = true;
            status.uploaded_payload_bytes = 5_000;
        });
        let report = h.worker.tick().await;
        assert_eq!(report.stopped, vec![TransferId::new(2)]);

        tokio::time::advance(Duration::from_secs(3_600)).await;
        let report = h.worker.tick().await;
        assert!(report.stopped.is_empty());
        let current = record(&h, 2);
        assert_eq!(current.state, ActivityState::Paused);
        assert_eq!(current.uploaded_bytes, 10);
        assert_eq!(h.engine.pause_calls(2), 0);
        assert_eq!(h.metrics.snapshot().external_pauses_total, 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn externally_resumed_transfer_is_tracked_again() -> anyhow::Result<()> {
        let mut h = harness(policy(0, 60)).await?;
        h.engine.set(1, seeding(100, 10));
        let _ = h.worker.tick().await;
        h.engine.update(1, |status| status.paused = true);
        let _ = h.worker.tick().await;
        assert_eq!(record(&h, 1).state, ActivityState::Paused);

        tokio::time::advance(Duration::from_secs(600)).await;
        h.engine.update(1, |status| status.paused = false);
        let report = h.worker.tick().await;
        assert!(report.stopped.is_empty());
        assert_eq!(record(&h, 1).state, ActivityState::FinishedDownload);

        tokio::time::advance(Duration::from_secs(61)).await;
        let report = h.worker.tick().await;
        assert_eq!(report.stopped, vec![TransferId::new(1)]);
        assert_eq!(record(&h, 1).state, ActivityState::TimedOut);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn ratio_takes_precedence_over_timeout() -> anyhow::Result<()> {
        let mut h = harness(policy(2, 60)).await?;
        h.engine.set(1, seeding(100, 150));
        let _ = h.worker.tick().await;

        tokio::time::advance(Duration::from_secs(61)).await;
        h.engine.set(1, seeding(100, 201));
        let report = h.worker.tick().await;

        assert_eq!(report.stopped, vec![TransferId::new(1)]);
        assert_eq!(record(&h, 1).state, ActivityState::RatioComplete);
        assert_eq!(h.engine.pause_calls(1), 1);
        assert_eq!(h.metrics.snapshot().ratio_stops_total, 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn idle_seeding_times_out_with_a_single_pause() -> anyhow::Result<()> {
        let mut h = harness(policy(0, 60)).await?;
        h.engine.ignore_pause();
        h.engine.set(1, seeding(100, 10));
        let _ = h.worker.tick().await;

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(h.worker.tick().await.stopped.is_empty());

        tokio::time::advance(Duration::from_secs(1)).await;
        let report = h.worker.tick().await;
        assert_eq!(report.stopped, vec![TransferId::new(1)]);
        assert_eq!(record(&h, 1).state, ActivityState::TimedOut);

        for _ in 0..3 {
            tokio::time::advance(Duration::from_secs(120)).await;
            assert!(h.worker.tick().await.stopped.is_empty());
        }
        assert_eq!(h.engine.pause_calls(1), 1);
        assert_eq!(record(&h, 1).state, ActivityState::TimedOut);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn observers_receive_one_batch_per_kind_per_tick() -> anyhow::Result<()> {
        let mut h = harness(policy(1, 0)).await?;
        for raw in 1..=3 {
            h.engine.set(raw, downloading(0.1, 1_000));
        }
        h.engine.set(4, seeding(100, 0));
        let _ = h.worker.tick().await;

        for raw in 1..=3 {
            h.engine.set(raw, downloading(0.2, 1_000));
        }
        h.engine.set(4, seeding(100, 101));
        let report = h.worker.tick().await;

        assert_eq!(report.delivery.attempted, 1);
        assert_eq!(
            h.observer.progress_batches(),
            vec![vec![1, 2, 3, 4], vec![1, 2, 3]]
        );
        let stopped = h.observer.stopped_batches();
        assert_eq!(stopped.len(), 1);
        assert_eq!(stopped[0].len(), 1);
        assert_eq!(stopped[0][0].id, TransferId::new(4));
        assert_eq!(stopped[0][0].state, ActivityState::RatioComplete);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_policies_never_stop() -> anyhow::Result<()> {
        let mut h = harness(SeedingPolicy::DISABLED).await?;
        h.engine.set(1, seeding(100, 1_000_000));
        let _ = h.worker.tick().await;
        tokio::time::advance(Duration::from_secs(86_400 * 30)).await;
        let report = h.worker.tick().await;

        assert!(report.stopped.is_empty());
        assert_eq!(record(&h, 1).state, ActivityState::FinishedDownload);
        assert_eq!(h.engine.pause_calls(1), 0);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn failed_pause_still_records_terminal_state() -> anyhow::Result<()> {
        let mut h = harness(policy(1, 0)).await?;
        h.engine.fail_pause(1);
        h.engine.set(1, seeding(100, 500));
        let report = h.worker.tick().await;
        assert_eq!(report.stopped, vec![TransferId::new(1)]);
        assert_eq!(record(&h, 1).state, ActivityState::RatioComplete);

        let _ = h.worker.tick().await;
        assert_eq!(h.engine.pause_calls(1), 1);
        assert_eq!(h.metrics.snapshot().pause_failures_total, 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn engine_failures_are_contained() -> anyhow::Result<()> {
        let mut h = harness(SeedingPolicy::DISABLED).await?;
        h.engine.set(1, downloading(0.4, 100));
        h.engine.set(2, downloading(0.4, 100));
        h.engine.fail_status(1);
        h.engine.break_hash(2);

        let report = h.worker.tick().await;
        assert_eq!(report.progressed, vec![TransferId::new(2)]);
        assert!(h.worker.store().get(TransferId::new(1)).is_none());
        assert!(record(&h, 2).hash.is_none());

        h.engine.fail_listing(true);
        let report = h.worker.tick().await;
        assert_eq!(report, TickReport::default());

        let snapshot = h.metrics.snapshot();
        assert_eq!(snapshot.engine_query_failures_total, 2);
        assert_eq!(snapshot.ticks_total, 2);
        assert_eq!(snapshot.tracked_transfers, 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn alerts_are_drained_each_tick() -> anyhow::Result<()> {
        let mut h = harness(SeedingPolicy::DISABLED).await?;
        h.engine.push_alert(EngineAlert::TransferFailed {
            transfer_id: TransferId::new(9),
            name: "broken".into(),
            message: "tracker rejected".into(),
        });
        h.engine.push_alert(EngineAlert::TransferFinished {
            transfer_id: TransferId::new(9),
            name: "broken".into(),
        });
        let _ = h.worker.tick().await;
        assert_eq!(h.engine.pending_alerts(), 0);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn hashes_are_derived_on_first_observation() -> anyhow::Result<()> {
        let mut h = harness(SeedingPolicy::DISABLED).await?;
        h.engine.set(5, downloading(0.0, 0));
        let report = h.worker.tick().await;
        assert!(report.progressed.is_empty());
        let current = record(&h, 5);
        assert!(current.hash.is_some());
        assert_eq!(current.state, ActivityState::Active);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn closed_commands_win_over_a_due_tick() -> anyhow::Result<()> {
        let h = harness(SeedingPolicy::DISABLED).await?;
        h.engine.set(1, downloading(0.5, 1_000));
        let (commands, receiver) = mpsc::channel(1);
        let task = h.worker.spawn(Duration::from_secs(1), receiver);
        tokio::task::yield_now().await;

        drop(commands);
        tokio::time::advance(Duration::from_secs(1)).await;
        let store = task.await?;
        assert!(store.is_empty());
        assert_eq!(h.metrics.snapshot().ticks_total, 0);
        assert!(h.observer.progress_batches().is_empty());
        Ok(())
    }
}
