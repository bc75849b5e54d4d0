//! Persisted alarm state.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::common::constants::ALARM_STATE_KEY;
use crate::registry::AlarmTiming;
use crate::store::{KeyValueStore, StoreError, get_json, set_json};

/// Where the scheduler is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmPhase {
    Disabled,
    /// A setup or diagnostic arming is waiting on resolution or dispatch.
    Enabling,
    Enabled,
}

impl AlarmPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmPhase::Disabled => "disabled",
            AlarmPhase::Enabling => "enabling",
            AlarmPhase::Enabled => "enabled",
        }
    }
}

/// What armed the current alarm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmKind {
    #[default]
    Sunrise,
    /// One-off alarm at `now + delay`, bypassing sunrise resolution.
    Diagnostic,
}

/// The single alarm. The label is a snapshot of the location name at arming
/// time and is not updated when the location is renamed or deleted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlarmState {
    pub enabled: bool,
    pub fire_instant: Option<DateTime<FixedOffset>>,
    pub location_label: String,
    #[serde(default)]
    pub kind: AlarmKind,
    #[serde(default)]
    pub timing: Option<AlarmTiming>,
}

impl AlarmState {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn armed(
        fire_instant: DateTime<FixedOffset>,
        location_label: &str,
        kind: AlarmKind,
        timing: Option<AlarmTiming>,
    ) -> Self {
        Self {
            enabled: true,
            fire_instant: Some(fire_instant),
            location_label: location_label.to_string(),
            kind,
            timing,
        }
    }

    /// Whether this state describes a usable armed alarm.
    pub fn is_armed(&self) -> bool {
        self.enabled && self.fire_instant.is_some()
    }

    /// Load the stored state; a missing key means a disabled alarm.
    pub fn load(store: &dyn KeyValueStore) -> Result<Self, StoreError> {
        Ok(get_json(store, ALARM_STATE_KEY)?.unwrap_or_default())
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> Result<(), StoreError> {
        set_json(store, ALARM_STATE_KEY, self)
    }
}
