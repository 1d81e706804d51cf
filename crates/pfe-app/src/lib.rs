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

//! Seeding lifecycle monitor and host wiring.
//!
//! Layout: `monitor/` (store, sampler, policy, fan-out, tick loop),
//! `observers.rs` (built-in observers), `bootstrap.rs` (host wiring),
//! `error.rs`.

/// Host wiring around a simulated engine.
pub mod bootstrap;
/// Application error types.
pub mod error;
/// Lifecycle monitor and its components.
pub mod monitor;
/// Logging and event bus observers.
pub mod observers;

pub use bootstrap::{MonitorHost, SimulationPlan, bootstrap, init_telemetry, load_settings};
pub use error::{AppError, AppResult};
pub use monitor::{LifecycleMonitor, MonitorConfig, MonitorStatus, TransferObserver};
