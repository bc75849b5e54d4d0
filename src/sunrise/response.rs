//! Wire format of the sunrise source.
//!
//! ```json
//! {
//!   "results": {
//!     "sunrise": "2024-03-10T06:15:30+00:00",
//!     "sunset": "2024-03-10T18:02:11+00:00",
//!     "solar_noon": "...", "day_length": 42401,
//!     "civil_twilight_begin": "...", "...": "..."
//!   },
//!   "status": "OK"
//! }
//! ```
//!
//! Only `status` and `results.sunrise` are read; every other field is ignored.

use serde::Deserialize;

use crate::common::constants::UPSTREAM_STATUS_OK;
use crate::error::AlarmError;

#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    results: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SunriseResults {
    sunrise: String,
}

/// Decode a response body and return the raw sunrise timestamp.
pub fn extract_sunrise(body: &str) -> Result<String, AlarmError> {
    if body.trim().is_empty() {
        return Err(AlarmError::EmptyResponse);
    }

    let envelope: Envelope =
        serde_json::from_str(body).map_err(|e| AlarmError::Decode(e.to_string()))?;

    if envelope.status != UPSTREAM_STATUS_OK {
        return Err(AlarmError::Decode(format!(
            "upstream reported status {}",
            envelope.status
        )));
    }

    let results: SunriseResults = serde_json::from_value(envelope.results)
        .map_err(|e| AlarmError::Decode(format!("results: {e}")))?;

    Ok(results.sunrise)
}
