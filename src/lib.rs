//! # sunrise-alarm library
//!
//! Internal library for the `sunrise-alarm` binary. It exists so the core can be
//! tested apart from CLI dispatch (`main.rs`).
//!
//! ## Architecture
//!
//! - **Registry**: [`registry`] holds saved locations, the single selection and
//!   the alarm timing preference
//! - **Date parsing**: [`date_parser`] turns upstream timestamps into instants
//!   through an ordered fallback chain
//! - **Sunrise resolution**: [`sunrise`] queries the remote sunrise source and
//!   re-anchors its answer onto the requested calendar date
//! - **Scheduling**: [`alarm`] is the alarm state machine and the notification
//!   hand-off
//! - **Infrastructure**: configuration, key-value storage, clock, logging
//! - **Commands**: [`commands`] implements the CLI subcommands

// Import macros from logger module for use in all submodules
#[macro_use]
pub mod logger;

pub mod alarm;
pub mod args;
pub mod commands;
pub mod common;
pub mod config;
pub mod date_parser;
pub mod error;
pub mod registry;
pub mod store;
pub mod sunrise;
pub mod time_source;

#[cfg(any(test, feature = "testing-support"))]
pub mod testing;

pub use alarm::{AlarmScheduler, BusyPolicy};
pub use error::AlarmError;
pub use registry::{AlarmTiming, LocationRegistry, SavedLocation};
