//! `ferrodesk config`: show or initialise configuration.

use anyhow::Context;
use ferrodesk_config::AppConfig;
use std::path::Path;

pub fn run(config_path: Option<&Path>, init: bool, force: bool) -> anyhow::Result<()> {
    let file = super::config_file(config_path);

    if init {
        if file.exists() && !force {
            anyhow::bail!("{} already exists (use --force to overwrite)", file.display());
        }
        if let Some(dir) = file.parent() {
            std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        std::fs::write(&file, AppConfig::default_toml())
            .with_context(|| format!("Failed to write {}", file.display()))?;
        println!("Wrote default configuration to {}", file.display());
        return Ok(());
    }

    let config = super::load_config(config_path)?;
    println!("# {}", file.display());
    println!("{}", toml::to_string_pretty(&config.redacted())?);
    Ok(())
}
