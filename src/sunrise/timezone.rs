//! Which time zone a location's calendar day is read in.

use chrono_tz::Tz;
use std::sync::OnceLock;
use tzf_rs::DefaultFinder;

/// How the resolver picks the zone used for "today", "tomorrow" and re-anchoring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZonePolicy {
    /// Look the zone up from the location's coordinates.
    Coordinates,
    /// Use one zone for every location.
    Fixed(Tz),
}

impl ZonePolicy {
    /// Parse the `timezone` config value: `"auto"` or an IANA zone name.
    pub fn from_config_value(value: &str) -> anyhow::Result<Self> {
        if value.eq_ignore_ascii_case("auto") {
            return Ok(ZonePolicy::Coordinates);
        }
        value
            .parse::<Tz>()
            .map(ZonePolicy::Fixed)
            .map_err(|_| anyhow::anyhow!("unknown time zone '{value}'"))
    }

    pub fn zone_for(&self, latitude: f64, longitude: f64) -> Tz {
        match self {
            ZonePolicy::Coordinates => determine_timezone_from_coordinates(latitude, longitude),
            ZonePolicy::Fixed(tz) => *tz,
        }
    }
}

/// Determine the time zone for coordinates from zone boundary data.
///
/// Falls back to `$TZ`, then UTC, for points the boundary data does not name
/// (open ocean, unparseable names).
pub fn determine_timezone_from_coordinates(latitude: f64, longitude: f64) -> Tz {
    static FINDER: OnceLock<DefaultFinder> = OnceLock::new();
    let finder = FINDER.get_or_init(DefaultFinder::new);

    // tzf-rs takes (longitude, latitude)
    let tz_name = finder.get_tz_name(longitude, latitude);

    match tz_name.parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => match std::env::var("TZ") {
            Ok(tz_str) => tz_str.parse().unwrap_or(Tz::UTC),
            Err(_) => Tz::UTC,
        },
    }
}
