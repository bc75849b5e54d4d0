//! Configuration validation.

use anyhow::Result;

use super::Config;
use crate::common::constants::*;
use crate::sunrise::ZonePolicy;

/// Reject values the application cannot run with.
pub fn validate_config(config: &Config) -> Result<()> {
    if let Some(endpoint) = &config.api_endpoint {
        validate_endpoint(endpoint)?;
    }

    if let Some(timeout) = config.request_timeout_secs
        && !(MINIMUM_REQUEST_TIMEOUT_SECS..=MAXIMUM_REQUEST_TIMEOUT_SECS).contains(&timeout)
    {
        anyhow::bail!(
            "request_timeout_secs ({}) must be between {} and {} seconds",
            timeout,
            MINIMUM_REQUEST_TIMEOUT_SECS,
            MAXIMUM_REQUEST_TIMEOUT_SECS
        );
    }

    if let Some(zone) = &config.timezone {
        ZonePolicy::from_config_value(zone)
            .map_err(|e| anyhow::anyhow!("timezone: {e} (use \"auto\" or an IANA name)"))?;
    }

    if let Some(policy) = &config.busy_policy {
        policy
            .parse::<crate::alarm::BusyPolicy>()
            .map_err(|e| anyhow::anyhow!("busy_policy: {e}"))?;
    }

    Ok(())
}

fn validate_endpoint(endpoint: &str) -> Result<()> {
    let url = reqwest::Url::parse(endpoint)
        .map_err(|e| anyhow::anyhow!("api_endpoint '{endpoint}' is not a valid URL: {e}"))?;

    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!(
            "api_endpoint must use http or https (got '{}')",
            url.scheme()
        );
    }
    Ok(())
}
