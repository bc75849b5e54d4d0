//! Locating and loading `sunrise-alarm.toml`.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::Config;
use super::validation::validate_config;
use crate::common::constants::*;
use crate::common::utils::private_path;

/// Configuration directory chosen with `--config`, set once at startup.
static CONFIG_DIR: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Set the configuration directory for the current process.
///
/// Can only be called once; later calls fail.
pub fn set_config_dir(dir: Option<String>) -> Result<()> {
    CONFIG_DIR
        .set(dir.map(PathBuf::from))
        .map_err(|_| anyhow::anyhow!("Configuration directory already set"))
}

/// The custom configuration directory, or None when using the default one.
pub fn get_custom_config_dir() -> Option<PathBuf> {
    CONFIG_DIR.get().and_then(|dir| dir.clone())
}

pub fn get_config_path() -> Result<PathBuf> {
    if let Some(custom_dir) = get_custom_config_dir() {
        return Ok(custom_dir.join(CONFIG_FILE_NAME));
    }

    let config_dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(config_dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load the configuration, writing the default file first if none exists.
pub fn load() -> Result<Config> {
    let config_path = get_config_path()?;

    if !config_path.exists() {
        super::builder::create_default_config(&config_path)
            .context("Failed to create default config during load")?;
        log_debug!("Created default config at {}", private_path(&config_path));
    }

    load_from_path(&config_path).with_context(|| {
        format!(
            "Failed to load configuration from {}",
            private_path(&config_path)
        )
    })
}

/// Load configuration from a specific path. Never creates the file.
pub fn load_from_path(path: &Path) -> Result<Config> {
    if !path.exists() {
        anyhow::bail!("Configuration file not found: {}", private_path(path));
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", private_path(path)))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", private_path(path)))?;

    validate_config(&config)?;
    apply_defaults(&mut config);

    Ok(config)
}

fn apply_defaults(config: &mut Config) {
    if config.api_endpoint.is_none() {
        config.api_endpoint = Some(DEFAULT_API_ENDPOINT.to_string());
    }
    if config.request_timeout_secs.is_none() {
        config.request_timeout_secs = Some(DEFAULT_REQUEST_TIMEOUT_SECS);
    }
    if config.timezone.is_none() {
        config.timezone = Some(DEFAULT_TIMEZONE.to_string());
    }
    if config.busy_policy.is_none() {
        config.busy_policy = Some(DEFAULT_BUSY_POLICY.to_string());
    }
}
