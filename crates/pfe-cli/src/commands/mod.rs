pub(crate) mod hash;
pub(crate) mod run;
pub(crate) mod settings;

pub(crate) use hash::handle_hash;
pub(crate) use run::handle_run;
pub(crate) use settings::{handle_settings_init, handle_settings_show};
