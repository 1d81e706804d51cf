//! Settings file discovery, loading and persistence.
//!
//! # Design
//! - The file is located once: `PFE_SETTINGS` wins, otherwise the file sits
//!   next to the executable.
//! - A missing file is not an error; defaults apply and the fact is logged.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{ConfigError, ConfigResult};
use crate::model::Settings;
use crate::properties::Properties;

/// Environment variable naming an explicit settings path.
pub const SETTINGS_ENV_VAR: &str = "PFE_SETTINGS";
/// File name used when the settings path is derived from the executable.
pub const SETTINGS_FILE_NAME: &str = "pfe_settings.ini";

const FILE_HEADER: &str = "pfe lifecycle monitor settings";

/// Handle to a settings file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsFile {
    path: PathBuf,
}

impl SettingsFile {
    /// Settings file at an explicit path.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Locate the settings file from the environment or the executable
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if `PFE_SETTINGS` is unset and the
    /// executable path cannot be determined.
    pub fn locate() -> ConfigResult<Self> {
        let executable = || {
            env::current_exe().map_err(|source| ConfigError::Io {
                operation: "settings.locate_executable",
                path: PathBuf::from(SETTINGS_FILE_NAME),
                source,
            })
        };
        Self::locate_with(env::var_os(SETTINGS_ENV_VAR), executable)
    }

    fn locate_with(
        explicit: Option<OsString>,
        executable: impl FnOnce() -> ConfigResult<PathBuf>,
    ) -> ConfigResult<Self> {
        if let Some(path) = explicit.filter(|value| !value.is_empty()) {
            return Ok(Self::at(path));
        }
        let exe = executable()?;
        let dir = exe.parent().map_or_else(PathBuf::new, Path::to_path_buf);
        Ok(Self::at(dir.join(SETTINGS_FILE_NAME)))
    }

    /// Path of the settings file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file currently exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Load settings, falling back to defaults when the file is missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file exists but cannot be read, or
    /// [`ConfigError::InvalidField`] when a value is malformed.
    pub fn load(&self) -> ConfigResult<Settings> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "settings file not found; using defaults");
                return Ok(Settings::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    operation: "settings.read",
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let settings = Settings::from_properties(&Properties::parse(&text))?;
        info!(
            path = %self.path.display(),
            trackers = settings.trackers.len(),
            seeding_ratio = settings.seeding_ratio,
            seeding_timeout_secs = settings.seeding_timeout_secs,
            "settings loaded"
        );
        Ok(settings)
    }

    /// Write settings to the file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the directory or file cannot be
    /// written.
    pub fn store(&self, settings: &Settings) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                operation: "settings.create_dir",
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let text = settings.to_properties().render(Some(FILE_HEADER));
        fs::write(&self.path, text).map_err(|source| ConfigError::Io {
            operation: "settings.write",
            path: self.path.clone(),
            source,
        })?;
        info!(path = %self.path.display(), "settings stored");
        Ok(())
    }
}
