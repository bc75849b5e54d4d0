//! Application constants and default values.
//!
//! Product decisions (the fixed alarm offset, the storage keys) live here next to
//! the configuration defaults and validation limits.

// ═══ Alarm Policy ═══

/// Magnitude of the offset applied to sunrise, in minutes.
pub const ALARM_OFFSET_MINUTES: i64 = 10;
pub const ALARM_TITLE: &str = "Sunrise Alarm";
pub const BEFORE_SUNRISE_BODY: &str = "Good morning! The sun will rise in 10 minutes.";
pub const AFTER_SUNRISE_BODY: &str = "Good morning! The sun has risen!";
pub const DIAGNOSTIC_BODY: &str = "Test alarm: notification delivery is working.";
pub const DEFAULT_DIAGNOSTIC_DELAY_SECS: u64 = 10;

// ═══ Configuration Defaults ═══

pub const CONFIG_FILE_NAME: &str = "sunrise-alarm.toml";
pub const APP_DIR_NAME: &str = "sunrise-alarm";
pub const DEFAULT_API_ENDPOINT: &str = "https://api.sunrise-sunset.org/json";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_TIMEZONE: &str = "auto";
pub const DEFAULT_BUSY_POLICY: &str = "reject";

// ═══ Validation Limits ═══

pub const MINIMUM_REQUEST_TIMEOUT_SECS: u64 = 1;
pub const MAXIMUM_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const MINIMUM_LATITUDE: f64 = -90.0;
pub const MAXIMUM_LATITUDE: f64 = 90.0;
pub const MINIMUM_LONGITUDE: f64 = -180.0;
pub const MAXIMUM_LONGITUDE: f64 = 180.0;
pub const MAXIMUM_DIAGNOSTIC_DELAY_SECS: u64 = 86_400;

// ═══ Storage Keys ═══

pub const LOCATIONS_KEY: &str = "saved_locations";
pub const TIMING_KEY: &str = "alarm_timing";
pub const ALARM_STATE_KEY: &str = "alarm_state";
/// Count of alarm state writes, compared before a late result is applied.
pub const ALARM_REVISION_KEY: &str = "alarm_revision";
/// Lock file held while the alarm state is compared and written.
pub const STORE_LOCK_FILE: &str = "alarm.lock";

// ═══ Upstream Protocol ═══

/// Status value the sunrise source reports for a usable response.
pub const UPSTREAM_STATUS_OK: &str = "OK";
/// Literal `date` parameter meaning "today" in the source's own zone.
pub const UPSTREAM_TODAY_TOKEN: &str = "today";

// ═══ Exit Codes ═══

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
