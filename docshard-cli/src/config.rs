//! Config file location

use anyhow::{Context, Result};
use docshard_client::StoreConfig;
use std::path::PathBuf;

/// Default config path: `~/.docshard/config.toml`
pub fn default_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Failed to get home directory")?;
    Ok(home.join(".docshard").join("config.toml"))
}

/// Resolve the effective configuration
///
/// An explicit path must exist. Otherwise the default path is used when
/// present, and `DOCSHARD_*` environment settings when it is not.
pub fn load(path: Option<&str>) -> Result<StoreConfig> {
    if let Some(path) = path {
        return StoreConfig::load(path).with_context(|| format!("Failed to load config {}", path));
    }
    let default = default_path()?;
    if default.exists() {
        return StoreConfig::load(&default)
            .with_context(|| format!("Failed to load config {}", default.display()));
    }
    Ok(StoreConfig::from_env()?)
}
