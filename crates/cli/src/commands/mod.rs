pub mod ask;
pub mod chat;
pub mod config_cmd;
pub mod events;
pub mod memories;
pub mod serve;

use anyhow::Context;
use ferrodesk_config::AppConfig;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The config file to read: `--config` if given, else the default location.
pub fn config_file(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

/// Load, apply `FERRODESK_*` overrides and validate.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let file = config_file(path);
    debug!(path = %file.display(), "Loading configuration");
    AppConfig::load_with_env(&file).with_context(|| format!("Failed to load config from {}", file.display()))
}
