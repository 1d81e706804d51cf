//! Host wiring: settings, telemetry, a simulated engine, and the monitor.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use pfe_config::{Settings, SettingsFile};
use pfe_events::EventBus;
use pfe_telemetry::{LogFormat, LoggingConfig, Metrics};
use pfe_torrent_core::{TransferEngine, TransferId};
use pfe_torrent_sim::{SimSettings, SimTransferSpec, SimulatedEngine};
use tokio::task::JoinHandle;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::monitor::{DEFAULT_OBSERVER_DEADLINE, LifecycleMonitor, MonitorConfig};
use crate::observers::{EventBusObserver, LoggingObserver};

/// Default simulated time step applied to the engine.
pub const DEFAULT_SIMULATION_STEP: Duration = Duration::from_millis(250);

/// Locate and load settings, honouring an explicit path when given.
///
/// # Errors
///
/// Returns [`AppError::Config`] when the file cannot be located, read, or
/// parsed.
pub fn load_settings(path: Option<&Path>) -> AppResult<(SettingsFile, Settings)> {
    let file = match path {
        Some(path) => SettingsFile::at(path),
        None => SettingsFile::locate().map_err(|err| AppError::config("settings.locate", err))?,
    };
    let settings = file
        .load()
        .map_err(|err| AppError::config("settings.load", err))?;
    Ok((file, settings))
}

/// Install the global tracing subscriber from settings, with optional
/// overrides.
///
/// # Errors
///
/// Returns [`AppError::Telemetry`] when a subscriber is already installed.
pub fn init_telemetry(
    settings: &Settings,
    level: Option<&str>,
    format: Option<LogFormat>,
) -> AppResult<()> {
    let format = format
        .or_else(|| settings.log_format.as_deref().and_then(LogFormat::from_name))
        .unwrap_or_else(LogFormat::infer);
    let logging = LoggingConfig {
        level: level.unwrap_or(&settings.log_level),
        format,
        ..LoggingConfig::default()
    };
    pfe_telemetry::init_logging(&logging).map_err(|err| AppError::telemetry("telemetry.init", err))
}

/// Monitor configuration derived from settings.
#[must_use]
pub const fn monitor_config(settings: &Settings) -> MonitorConfig {
    MonitorConfig {
        policy: settings.seeding_policy(),
        tick_period: settings.tick_period(),
        observer_deadline: DEFAULT_OBSERVER_DEADLINE,
    }
}

/// Transfers to create in the simulated engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationPlan {
    /// Number of transfers.
    pub transfers: usize,
    /// Payload size of each transfer.
    pub size_bytes: u64,
    /// Download rate per transfer.
    pub download_bps: u64,
    /// Upload rate per transfer once seeding.
    pub upload_bps: u64,
    /// Total upload peers will request per transfer.
    pub upload_budget: Option<u64>,
    /// Start every transfer complete.
    pub seed: bool,
    /// Simulated time applied per clock step.
    pub step: Duration,
}

impl Default for SimulationPlan {
    fn default() -> Self {
        Self {
            transfers: 3,
            size_bytes: 64 * 1024 * 1024,
            download_bps: 4 * 1024 * 1024,
            upload_bps: 2 * 1024 * 1024,
            upload_budget: None,
            seed: false,
            step: DEFAULT_SIMULATION_STEP,
        }
    }
}

impl SimulationPlan {
    fn validate(&self) -> AppResult<()> {
        if self.transfers == 0 {
            return Err(AppError::InvalidConfig {
                field: "transfers",
                reason: "must be at least one",
                value: Some(self.transfers.to_string()),
            });
        }
        if self.step.is_zero() {
            return Err(AppError::InvalidConfig {
                field: "step",
                reason: "must be greater than zero",
                value: None,
            });
        }
        Ok(())
    }

    fn spec(&self, index: usize) -> SimTransferSpec {
        let ordinal = index + 1;
        SimTransferSpec {
            download_bps: self.download_bps,
            upload_bps: self.upload_bps,
            upload_budget: self.upload_budget,
            seed: self.seed,
            ..SimTransferSpec::new(
                format!("{ordinal:040x}"),
                format!("transfer-{ordinal:02}.bin"),
                self.size_bytes,
            )
        }
    }
}

/// Running host: engine, monitor, event bus and the simulation clock.
pub struct MonitorHost {
    settings: Settings,
    plan: SimulationPlan,
    engine: Arc<SimulatedEngine>,
    monitor: LifecycleMonitor<SimulatedEngine>,
    events: EventBus,
    transfers: Vec<TransferId>,
    clock: Option<JoinHandle<()>>,
}

/// Build the host: engine with the planned transfers and settings trackers,
/// a monitor with the logging and event bus observers registered.
///
/// # Errors
///
/// Returns [`AppError`] when the plan or settings are invalid, metrics cannot
/// be registered, or trackers cannot be attached.
pub async fn bootstrap(settings: Settings, plan: SimulationPlan) -> AppResult<MonitorHost> {
    plan.validate()?;
    let metrics = Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
    let engine = Arc::new(SimulatedEngine::new(SimSettings {
        seed_after_download: settings.seed_after_download,
    }));

    info!(
        trackers = ?settings.trackers,
        enable_dht = settings.enable_dht,
        seed_after_download = settings.seed_after_download,
        "engine session configured"
    );

    let mut transfers = Vec::with_capacity(plan.transfers);
    for index in 0..plan.transfers {
        let id = engine.add_transfer(plan.spec(index));
        if !settings.trackers.is_empty() {
            engine
                .add_trackers(&id, &settings.trackers)
                .await
                .map_err(|err| AppError::engine("engine.add_trackers", err))?;
        }
        transfers.push(id);
    }

    let events = EventBus::new();
    let monitor = LifecycleMonitor::new(Arc::clone(&engine), monitor_config(&settings), metrics)?;
    let _ = monitor.register_observer(Arc::new(LoggingObserver)).await;
    let _ = monitor
        .register_observer(Arc::new(EventBusObserver::new(events.clone())))
        .await;

    Ok(MonitorHost {
        settings,
        plan,
        engine,
        monitor,
        events,
        transfers,
        clock: None,
    })
}

impl MonitorHost {
    /// Start the monitor and the simulation clock.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidState`] when already started.
    pub async fn start(&mut self) -> AppResult<()> {
        self.monitor.start().await?;
        let engine = Arc::clone(&self.engine);
        let step = self.plan.step;
        self.clock = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + step, step);
            loop {
                ticker.tick().await;
                engine.advance(step);
            }
        }));
        info!(transfers = self.transfers.len(), "monitor host started");
        Ok(())
    }

    /// Stop the simulation clock and the monitor.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::WorkerFailed`] when the tick loop panicked.
    pub async fn shutdown(&mut self) -> AppResult<()> {
        if let Some(clock) = self.clock.take() {
            clock.abort();
        }
        self.monitor.shutdown().await?;
        info!("monitor host stopped");
        Ok(())
    }

    /// Whether every simulated transfer is paused.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.engine.all_paused()
    }

    /// Effective settings.
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Identities of the simulated transfers, in creation order.
    #[must_use]
    pub fn transfers(&self) -> &[TransferId] {
        &self.transfers
    }

    /// Simulated engine.
    #[must_use]
    pub const fn engine(&self) -> &Arc<SimulatedEngine> {
        &self.engine
    }

    /// Lifecycle monitor.
    #[must_use]
    pub const fn monitor(&self) -> &LifecycleMonitor<SimulatedEngine> {
        &self.monitor
    }

    /// Bus carrying monitor batches.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pfe_config::SETTINGS_FILE_NAME;

    #[test]
    fn monitor_config_follows_settings() {
        let settings = Settings {
            seeding_ratio: 5,
            seeding_timeout_secs: 0,
            tick_period_ms: 250,
            ..Settings::default()
        };
        let config = monitor_config(&settings);
        assert_eq!(config.policy.seed_ratio, 5);
        assert!(!config.policy.timeout_enabled());
        assert_eq!(config.tick_period, Duration::from_millis(250));
    }

    #[test]
    fn load_settings_reads_explicit_path() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(SETTINGS_FILE_NAME);
        std::fs::write(&path, "seeding_ratio=7\ntrackers=udp://a.example:80\n")?;
        let (file, settings) = load_settings(Some(&path))?;
        assert_eq!(file.path(), path.as_path());
        assert_eq!(settings.seeding_ratio, 7);
        assert_eq!(settings.trackers, vec!["udp://a.example:80".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn bootstrap_adds_transfers_with_trackers() -> anyhow::Result<()> {
        let settings = Settings {
            trackers: vec!["udp://a.example:80".into()],
            ..Settings::default()
        };
        let host = bootstrap(
            settings,
            SimulationPlan {
                transfers: 2,
                ..SimulationPlan::default()
            },
        )
        .await?;
        assert_eq!(host.transfers().len(), 2);
        for id in host.transfers() {
            assert_eq!(host.engine().trackers(*id), vec!["udp://a.example:80".to_string()]);
            assert!(host.engine().content_hash(id).is_ok());
        }
        assert!(!host.is_idle());
        Ok(())
    }

    #[tokio::test]
    async fn empty_plans_are_rejected() {
        let result = bootstrap(
            Settings::default(),
            SimulationPlan {
                transfers: 0,
                ..SimulationPlan::default()
            },
        )
        .await;
        assert!(matches!(
            result,
            Err(AppError::InvalidConfig {
                field: "transfers",
                ..
            })
        ));
    }
}
