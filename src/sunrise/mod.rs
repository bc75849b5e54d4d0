//! Sunrise resolution against the remote sunrise source.
//!
//! The source answers with a timestamp whose calendar date is whatever the
//! server considered "the day" for the request, which can disagree with the
//! location's own calendar near midnight. The resolver therefore trusts the
//! upstream value only for the time of day and always puts that time on the
//! calendar date the caller asked for:
//!
//! ```text
//! upstream  2024-03-09T06:15:30Z ─┐
//!                                 ├─► 2024-03-10 06:15:30 (location zone)
//! target    2024-03-10 ───────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`response`]: decoding of the JSON envelope
//! - [`timezone`]: choice of the location zone
//! - [`transport`]: the HTTP seam and its `reqwest` implementation

pub mod response;
pub mod timezone;
pub mod transport;

pub use timezone::{ZonePolicy, determine_timezone_from_coordinates};
pub use transport::{HttpTransport, ReqwestTransport};

use std::sync::Arc;

use chrono::{DateTime, Days, FixedOffset, NaiveDate, TimeZone, Timelike};
use chrono_tz::Tz;
use reqwest::Url;

use crate::common::constants::UPSTREAM_TODAY_TOKEN;
use crate::date_parser;
use crate::error::AlarmError;
use crate::time_source::TimeSource;

/// The `date` parameter sent upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestDay {
    /// The literal `today` token.
    Today,
    Date(NaiveDate),
}

impl RequestDay {
    fn as_param(&self) -> String {
        match self {
            RequestDay::Today => UPSTREAM_TODAY_TOKEN.to_string(),
            RequestDay::Date(date) => date.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Resolves sunrise instants for coordinates. Performs no retries.
pub struct SunriseResolver {
    transport: Arc<dyn HttpTransport>,
    clock: Arc<dyn TimeSource>,
    endpoint: String,
    zones: ZonePolicy,
}

impl SunriseResolver {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn TimeSource>,
        endpoint: impl Into<String>,
        zones: ZonePolicy,
    ) -> Self {
        Self {
            transport,
            clock,
            endpoint: endpoint.into(),
            zones,
        }
    }

    /// Zone whose calendar defines "today" at these coordinates.
    pub fn zone_for(&self, latitude: f64, longitude: f64) -> Tz {
        self.zones.zone_for(latitude, longitude)
    }

    /// Today's date in the location zone.
    pub fn today_for(&self, latitude: f64, longitude: f64) -> NaiveDate {
        let zone = self.zone_for(latitude, longitude);
        self.clock.now().with_timezone(&zone).date_naive()
    }

    /// Tomorrow's date in the location zone.
    pub fn tomorrow_for(&self, latitude: f64, longitude: f64) -> NaiveDate {
        let today = self.today_for(latitude, longitude);
        today.checked_add_days(Days::new(1)).unwrap_or(today)
    }

    /// Build the request URL for the given coordinates and day.
    pub fn request_url(
        &self,
        latitude: f64,
        longitude: f64,
        day: RequestDay,
    ) -> Result<Url, AlarmError> {
        crate::registry::validate_coordinates(latitude, longitude)
            .map_err(|e| AlarmError::InvalidRequest(e.to_string()))?;

        Url::parse_with_params(
            &self.endpoint,
            &[
                ("lat", latitude.to_string()),
                ("lng", longitude.to_string()),
                ("formatted", "0".to_string()),
                ("date", day.as_param()),
            ],
        )
        .map_err(|e| AlarmError::InvalidRequest(format!("{}: {e}", self.endpoint)))
    }

    /// Sunrise at the coordinates on `date` (in the location's calendar).
    pub async fn resolve_for(
        &self,
        latitude: f64,
        longitude: f64,
        date: NaiveDate,
    ) -> Result<DateTime<Tz>, AlarmError> {
        self.resolve(latitude, longitude, RequestDay::Date(date), date)
            .await
    }

    /// Today's sunrise, requested with the upstream `today` token.
    pub async fn resolve_today(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<DateTime<Tz>, AlarmError> {
        let today = self.today_for(latitude, longitude);
        self.resolve(latitude, longitude, RequestDay::Today, today)
            .await
    }

    /// Tomorrow's sunrise: the next one that is never in the past.
    pub async fn resolve_tomorrow(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<DateTime<Tz>, AlarmError> {
        let tomorrow = self.tomorrow_for(latitude, longitude);
        self.resolve_for(latitude, longitude, tomorrow).await
    }

    async fn resolve(
        &self,
        latitude: f64,
        longitude: f64,
        day: RequestDay,
        anchor: NaiveDate,
    ) -> Result<DateTime<Tz>, AlarmError> {
        let url = self.request_url(latitude, longitude, day)?;
        log_debug!("Requesting sunrise: {url}");

        let body = self.transport.get(&url).await?;
        let raw = response::extract_sunrise(&body)?;

        let (instant, strategy) = date_parser::parse_with_strategy(&raw)?;
        log_debug!("Parsed upstream sunrise '{raw}' using {strategy:?}");

        let zone = self.zone_for(latitude, longitude);
        anchor_to_date(instant, anchor, zone)
    }
}

/// Put the wall-clock time of `instant` (as seen in `zone`) on `date`.
///
/// Sub-second precision is dropped. A time that falls into a DST gap on `date`
/// cannot be composed; an ambiguous one resolves to the earlier instant.
pub fn anchor_to_date(
    instant: DateTime<FixedOffset>,
    date: NaiveDate,
    zone: Tz,
) -> Result<DateTime<Tz>, AlarmError> {
    let local = instant.with_timezone(&zone).time();
    let time = local.with_nanosecond(0).unwrap_or(local);

    zone.from_local_datetime(&date.and_time(time))
        .earliest()
        .ok_or_else(|| AlarmError::CalendarCompose {
            date,
            time,
            zone: zone.name().to_string(),
        })
}
