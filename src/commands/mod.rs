//! Command-line command handlers.
//!
//! Each command lives in its own submodule and works against an [`AppContext`]
//! built once per process from the loaded configuration.

pub mod alarm;
pub mod help;
pub mod location;
pub mod refresh;
pub mod sunrise;
pub mod timing;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone};
use std::path::PathBuf;
use std::sync::Arc;

use crate::alarm::{AlarmScheduler, OutboxDispatcher, SchedulerParams};
use crate::config::{Config, get_custom_config_dir};
use crate::registry::{LocationRegistry, SavedLocation};
use crate::store::{FileStore, KeyValueStore};
use crate::sunrise::{ReqwestTransport, SunriseResolver};
use crate::time_source::RealTimeSource;

/// Everything the commands operate on.
pub struct AppContext {
    pub config: Config,
    pub state_dir: PathBuf,
    pub registry: Arc<LocationRegistry>,
    pub scheduler: AlarmScheduler,
    pub outbox: Arc<OutboxDispatcher>,
}

impl AppContext {
    /// Wire the file store, registry, resolver and scheduler for this process.
    pub fn build(config: Config) -> Result<Self> {
        let file_store = FileStore::for_config_dir(get_custom_config_dir().as_deref())?;
        let state_dir = file_store.dir().to_path_buf();
        let store: Arc<dyn KeyValueStore> = Arc::new(file_store);

        let registry = Arc::new(
            LocationRegistry::load(store.clone()).context("Failed to load saved locations")?,
        );

        let transport = Arc::new(ReqwestTransport::new(config.request_timeout())?);
        let clock = Arc::new(RealTimeSource);
        let resolver = SunriseResolver::new(
            transport,
            clock.clone(),
            config.api_endpoint(),
            config.zone_policy()?,
        );

        let outbox = Arc::new(OutboxDispatcher::new(store.clone()));
        let scheduler = AlarmScheduler::new(SchedulerParams {
            registry: registry.clone(),
            resolver,
            dispatcher: outbox.clone(),
            store,
            clock,
            busy_policy: config.busy_policy()?,
        });

        Ok(Self {
            config,
            state_dir,
            registry,
            scheduler,
            outbox,
        })
    }

    /// The selected location, or an error telling the user how to pick one.
    pub fn require_selected(&self) -> Result<SavedLocation> {
        self.registry.selected().context(
            "No location is selected. Use 'sunrise-alarm location select <id>' first",
        )
    }
}

/// Format an instant the way every command prints it.
pub(crate) fn format_instant<Z: TimeZone>(instant: &DateTime<Z>) -> String
where
    Z::Offset: std::fmt::Display,
{
    instant.format("%Y-%m-%d %H:%M:%S %:z").to_string()
}

/// Print a JSON document on stdout, bypassing the decorated logger.
pub(crate) fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
