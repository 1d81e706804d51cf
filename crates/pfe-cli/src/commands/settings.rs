use std::path::PathBuf;

use anyhow::anyhow;
use pfe_config::{Settings, SettingsFile};

use crate::error::{CliError, CliResult};
use crate::output::to_json;

pub(crate) fn handle_settings_show(settings: &Settings) -> CliResult<()> {
    println!("{}", to_json(settings)?);
    Ok(())
}

pub(crate) fn handle_settings_init(file: &SettingsFile, force: bool) -> CliResult<()> {
    let path = write_defaults(file, force)?;
    println!("wrote default settings to {}", path.display());
    Ok(())
}

fn write_defaults(file: &SettingsFile, force: bool) -> CliResult<PathBuf> {
    if file.exists() && !force {
        return Err(CliError::validation(format!(
            "settings file already exists at {}; pass --force to overwrite",
            file.path().display()
        )));
    }
    file.store(&Settings::default())
        .map_err(|err| CliError::failure(anyhow!("failed to write settings: {}", err.detail())))?;
    Ok(file.path().to_path_buf())
}
