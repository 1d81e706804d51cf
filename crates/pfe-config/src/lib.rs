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

//! File-backed settings for the lifecycle monitor and its host.
//!
//! Layout: `properties.rs` (key/value text format), `model.rs` (typed
//! `Settings`), `validate.rs` (field parsing), `loader.rs` (`SettingsFile`
//! location, load and store), `defaults.rs`, `error.rs`.

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod properties;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{SETTINGS_ENV_VAR, SETTINGS_FILE_NAME, SettingsFile};
pub use model::Settings;
pub use properties::Properties;
