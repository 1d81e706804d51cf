//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters/gauges the lifecycle monitor updates each tick.

use std::sync::Arc;

use prometheus::core::Collector;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across the monitor and its callers.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    ticks_total: IntCounter,
    tracked_transfers: IntGauge,
    transfers_stopped_total: IntCounterVec,
    pause_failures_total: IntCounter,
    engine_query_failures_total: IntCounter,
    observer_failures_total: IntCounter,
}

/// Snapshot of the monitor counters for health reporting.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Completed monitor ticks.
    pub ticks_total: u64,
    /// Activity records currently held.
    pub tracked_transfers: i64,
    /// Transfers stopped because the seed ratio was reached.
    pub ratio_stops_total: u64,
    /// Transfers stopped because seeding timed out.
    pub timeout_stops_total: u64,
    /// Transfers observed paused outside the monitor.
    pub external_pauses_total: u64,
    /// Pause commands the engine rejected.
    pub pause_failures_total: u64,
    /// Engine enumeration or status queries that failed.
    pub engine_query_failures_total: u64,
    /// Observer deliveries that failed, panicked, or timed out.
    pub observer_failures_total: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the monitor collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be built or
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let ticks_total = counter("monitor_ticks_total", "Completed lifecycle monitor ticks")?;
        let tracked_transfers = IntGauge::with_opts(Opts::new(
            "monitor_tracked_transfers",
            "Activity records held by the lifecycle monitor",
        ))
        .map_err(|source| TelemetryError::MetricsCollector {
            name: "monitor_tracked_transfers",
            source,
        })?;
        let transfers_stopped_total = IntCounterVec::new(
            Opts::new(
                "monitor_transfers_stopped_total",
                "Transfers stopped by reason",
            ),
            &["reason"],
        )
        .map_err(|source| TelemetryError::MetricsCollector {
            name: "monitor_transfers_stopped_total",
            source,
        })?;
        let pause_failures_total = counter(
            "monitor_pause_failures_total",
            "Pause commands rejected by the engine",
        )?;
        let engine_query_failures_total = counter(
            "monitor_engine_query_failures_total",
            "Failed engine enumeration or status queries",
        )?;
        let observer_failures_total = counter(
            "monitor_observer_failures_total",
            "Observer deliveries that failed, panicked, or timed out",
        )?;

        register(&registry, "monitor_ticks_total", &ticks_total)?;
        register(&registry, "monitor_tracked_transfers", &tracked_transfers)?;
        register(
            &registry,
            "monitor_transfers_stopped_total",
            &transfers_stopped_total,
        )?;
        register(
            &registry,
            "monitor_pause_failures_total",
            &pause_failures_total,
        )?;
        register(
            &registry,
            "monitor_engine_query_failures_total",
            &engine_query_failures_total,
        )?;
        register(
            &registry,
            "monitor_observer_failures_total",
            &observer_failures_total,
        )?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                ticks_total,
                tracked_transfers,
                transfers_stopped_total,
                pause_failures_total,
                engine_query_failures_total,
                observer_failures_total,
            }),
        })
    }

    /// Increment the completed tick counter.
    pub fn inc_tick(&self) {
        self.inner.ticks_total.inc();
    }

    /// Set the tracked transfer gauge.
    pub fn set_tracked_transfers(&self, count: usize) {
        self.inner
            .tracked_transfers
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Increment the stopped transfer counter for a reason label.
    pub fn inc_transfer_stopped(&self, reason: &str) {
        self.inner
            .transfers_stopped_total
            .with_label_values(&[reason])
            .inc();
    }

    /// Increment the failed pause counter.
    pub fn inc_pause_failure(&self) {
        self.inner.pause_failures_total.inc();
    }

    /// Increment the failed engine query counter.
    pub fn inc_engine_query_failure(&self) {
        self.inner.engine_query_failures_total.inc();
    }

    /// Increment the failed observer delivery counter.
    pub fn inc_observer_failure(&self) {
        self.inner.observer_failures_total.inc();
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the monitor counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let stopped = |reason: &str| {
            self.inner
                .transfers_stopped_total
                .with_label_values(&[reason])
                .get()
        };
        MetricsSnapshot {
            ticks_total: self.inner.ticks_total.get(),
            tracked_transfers: self.inner.tracked_transfers.get(),
            ratio_stops_total: stopped("ratio_complete"),
            timeout_stops_total: stopped("timed_out"),
            external_pauses_total: stopped("paused"),
            pause_failures_total: self.inner.pause_failures_total.get(),
            engine_query_failures_total: self.inner.engine_query_failures_total.get(),
            observer_failures_total: self.inner.observer_failures_total.get(),
        }
    }
}

fn counter(name: &'static str, help: &str) -> Result<IntCounter> {
    IntCounter::with_opts(Opts::new(name, help))
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}
