//! Configuration for sunrise-alarm.
//!
//! Settings are read from `sunrise-alarm.toml`, located in
//! `$XDG_CONFIG_HOME/sunrise-alarm/` or in the directory given with `--config`.
//! A commented default file is written the first time the configuration is
//! loaded and none exists.
//!
//! ```toml
//! #[Sunrise source]
//! api_endpoint = "https://api.sunrise-sunset.org/json" # Sunrise source endpoint
//! request_timeout_secs = 15                            # Request timeout in seconds (1-120)
//! timezone = "auto"                                    # "auto" (from coordinates) or an IANA zone name
//!
//! #[Scheduling]
//! busy_policy = "reject"                               # While an alarm operation runs: "reject" or "queue"
//! ```
//!
//! Locations, the alarm timing preference and the alarm itself are user state,
//! not configuration; they live in the state directory (see [`crate::store`]).

pub mod builder;
pub mod loading;
pub mod validation;

use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::alarm::BusyPolicy;
use crate::common::constants::*;
use crate::sunrise::ZonePolicy;

pub use builder::create_default_config;
pub use loading::{get_config_path, get_custom_config_dir, load, load_from_path, set_config_dir};

/// Settings from `sunrise-alarm.toml`. Missing fields take their defaults on load.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub api_endpoint: Option<String>,
    pub request_timeout_secs: Option<u64>,
    /// `"auto"` or an IANA zone name.
    pub timezone: Option<String>,
    /// `"reject"` or `"queue"`.
    pub busy_policy: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        load()
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        load_from_path(path)
    }

    pub fn get_config_path() -> Result<PathBuf> {
        get_config_path()
    }

    pub fn api_endpoint(&self) -> &str {
        self.api_endpoint.as_deref().unwrap_or(DEFAULT_API_ENDPOINT)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn zone_policy(&self) -> Result<ZonePolicy> {
        ZonePolicy::from_config_value(self.timezone.as_deref().unwrap_or(DEFAULT_TIMEZONE))
    }

    pub fn busy_policy(&self) -> Result<BusyPolicy> {
        self.busy_policy
            .as_deref()
            .unwrap_or(DEFAULT_BUSY_POLICY)
            .parse()
    }

    /// Print the effective settings.
    pub fn log_config(&self) {
        log_block_start!("Loaded configuration");
        log_indented!("Sunrise source: {}", self.api_endpoint());
        log_indented!("Request timeout: {}s", self.request_timeout().as_secs());
        log_indented!(
            "Time zone: {}",
            self.timezone.as_deref().unwrap_or(DEFAULT_TIMEZONE)
        );
        log_indented!(
            "Busy policy: {}",
            self.busy_policy.as_deref().unwrap_or(DEFAULT_BUSY_POLICY)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.api_endpoint(), DEFAULT_API_ENDPOINT);
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
        assert_eq!(config.zone_policy().unwrap(), ZonePolicy::Coordinates);
        assert_eq!(config.busy_policy().unwrap(), BusyPolicy::Reject);
    }

    #[test]
    fn test_explicit_values() {
        let config: Config = toml::from_str(
            r#"
            api_endpoint = "http://localhost:8080/json"
            request_timeout_secs = 5
            timezone = "Europe/Lisbon"
            busy_policy = "queue"
            "#,
        )
        .unwrap();

        assert_eq!(config.api_endpoint(), "http://localhost:8080/json");
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(
            config.zone_policy().unwrap(),
            ZonePolicy::Fixed(chrono_tz::Europe::Lisbon)
        );
        assert_eq!(config.busy_policy().unwrap(), BusyPolicy::Queue);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(toml::from_str::<Config>("alarm_offset = 15").is_err());
    }
}
