//! Timestamp parsing with an ordered fallback chain.
//!
//! The sunrise source has been observed to emit its timestamps both with and
//! without fractional seconds, and strict RFC 3339 parsing rejects strings that
//! are valid in every other respect. [`parse`] therefore tries, in order:
//!
//! 1. strict RFC 3339 with fractional seconds (`2024-03-10T06:15:30.123+00:00`)
//! 2. strict RFC 3339 without fractional seconds (`2024-03-10T06:15:30Z`)
//! 3. explicit templates read against the proleptic Gregorian calendar with UTC
//!    as the reference zone:
//!    - `yyyy-MM-dd'T'HH:mm:ssXXXXX` (`+hh:mm` or `Z`)
//!    - `yyyy-MM-dd'T'HH:mm:ss.SSSXXXXX`
//!    - `yyyy-MM-dd'T'HH:mm:ssZ` (`+hhmm` or `Z`)
//!    - `yyyy-MM-dd'T'HH:mm:ss.SSSZ`
//!
//! The first strategy that succeeds wins. A template string without any zone
//! indicator is read as UTC.

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

static STRICT_FRACTIONAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{1,9}(?:Z|[+-]\d{2}:\d{2})$")
        .expect("static regex")
});

static STRICT_WHOLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:Z|[+-]\d{2}:\d{2})$").expect("static regex")
});

// Splits a template candidate into its wall-clock body and optional zone suffix.
static ZONE_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<body>.+?)(?P<zone>Z|[+-]\d{2}:\d{2}|[+-]\d{4})?$").expect("static regex")
});

/// No strategy in the chain accepted the input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no date format matched {input:?}")]
pub struct DateParseError {
    pub input: String,
}

/// Which link of the chain produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Rfc3339Fractional,
    Rfc3339,
    Template(&'static str),
}

/// How a template expects its zone suffix to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ZoneStyle {
    /// `+hh:mm` or `Z`
    Extended,
    /// `+hhmm` or `Z`
    Basic,
}

struct Template {
    pattern: &'static str,
    layout: &'static str,
    zone: ZoneStyle,
}

const TEMPLATES: [Template; 4] = [
    Template {
        pattern: "yyyy-MM-dd'T'HH:mm:ssXXXXX",
        layout: "%Y-%m-%dT%H:%M:%S",
        zone: ZoneStyle::Extended,
    },
    Template {
        pattern: "yyyy-MM-dd'T'HH:mm:ss.SSSXXXXX",
        layout: "%Y-%m-%dT%H:%M:%S%.3f",
        zone: ZoneStyle::Extended,
    },
    Template {
        pattern: "yyyy-MM-dd'T'HH:mm:ssZ",
        layout: "%Y-%m-%dT%H:%M:%S",
        zone: ZoneStyle::Basic,
    },
    Template {
        pattern: "yyyy-MM-dd'T'HH:mm:ss.SSSZ",
        layout: "%Y-%m-%dT%H:%M:%S%.3f",
        zone: ZoneStyle::Basic,
    },
];

/// Parse a raw upstream timestamp into an absolute instant.
pub fn parse(raw: &str) -> Result<DateTime<FixedOffset>, DateParseError> {
    parse_with_strategy(raw).map(|(instant, _)| instant)
}

/// Parse like [`parse`], also reporting which strategy matched.
pub fn parse_with_strategy(raw: &str) -> Result<(DateTime<FixedOffset>, Strategy), DateParseError> {
    let input = raw.trim();

    if STRICT_FRACTIONAL.is_match(input)
        && let Ok(instant) = DateTime::parse_from_rfc3339(input)
    {
        return Ok((instant, Strategy::Rfc3339Fractional));
    }

    if STRICT_WHOLE.is_match(input)
        && let Ok(instant) = DateTime::parse_from_rfc3339(input)
    {
        return Ok((instant, Strategy::Rfc3339));
    }

    TEMPLATES
        .iter()
        .find_map(|template| {
            parse_template(input, template).map(|instant| (instant, Strategy::Template(template.pattern)))
        })
        .ok_or_else(|| DateParseError {
            input: raw.to_string(),
        })
}

fn parse_template(input: &str, template: &Template) -> Option<DateTime<FixedOffset>> {
    let captures = ZONE_SUFFIX.captures(input)?;
    let body = captures.name("body")?.as_str();

    let offset = match captures.name("zone") {
        Some(zone) => parse_zone(zone.as_str(), template.zone)?,
        // No zone indicator: read the wall clock as UTC
        None => FixedOffset::east_opt(0)?,
    };

    let naive = NaiveDateTime::parse_from_str(body, template.layout).ok()?;
    naive.and_local_timezone(offset).single()
}

fn parse_zone(zone: &str, style: ZoneStyle) -> Option<FixedOffset> {
    if zone == "Z" {
        return FixedOffset::east_opt(0);
    }

    let (sign, digits) = match zone.split_at(1) {
        ("+", rest) => (1, rest),
        ("-", rest) => (-1, rest),
        _ => return None,
    };

    let (hours, minutes) = match style {
        ZoneStyle::Extended => digits.split_once(':')?,
        ZoneStyle::Basic if digits.len() == 4 && !digits.contains(':') => digits.split_at(2),
        ZoneStyle::Basic => return None,
    };

    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_fractional_rfc3339_wins_first() {
        let (instant, strategy) = parse_with_strategy("2024-03-10T06:15:30.250+00:00").unwrap();
        assert_eq!(strategy, Strategy::Rfc3339Fractional);
        assert_eq!(instant.timestamp(), utc(2024, 3, 10, 6, 15, 30).timestamp());
        assert_eq!(instant.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_whole_second_rfc3339() {
        let (instant, strategy) = parse_with_strategy("2024-03-10T06:15:30Z").unwrap();
        assert_eq!(strategy, Strategy::Rfc3339);
        assert_eq!(instant, utc(2024, 3, 10, 6, 15, 30));
    }

    #[test]
    fn test_non_utc_offset_is_honored() {
        let instant = parse("2024-03-10T07:15:30+01:00").unwrap();
        assert_eq!(instant, utc(2024, 3, 10, 6, 15, 30));
        assert_eq!(instant.offset().local_minus_utc(), 3600);
    }

    #[test]
    fn test_each_template_parses_its_own_shape() {
        let expected = utc(2024, 3, 10, 6, 15, 30);
        let cases = [
            (0, "2024-03-10T08:15:30+02:00"),
            (1, "2024-03-10T08:15:30.000+02:00"),
            (2, "2024-03-10T08:15:30+0200"),
            (3, "2024-03-10T08:15:30.000+0200"),
        ];

        for (index, raw) in cases {
            let instant = parse_template(raw, &TEMPLATES[index])
                .unwrap_or_else(|| panic!("template {index} rejected {raw}"));
            assert_eq!(instant, expected, "template {index}");
            assert_eq!(parse(raw).unwrap(), expected, "chain for {raw}");
        }
    }

    #[test]
    fn test_basic_offset_falls_through_to_template() {
        let (instant, strategy) = parse_with_strategy("2024-03-10T01:15:30-0500").unwrap();
        assert_eq!(strategy, Strategy::Template("yyyy-MM-dd'T'HH:mm:ssZ"));
        assert_eq!(instant, utc(2024, 3, 10, 6, 15, 30));
    }

    #[test]
    fn test_missing_zone_assumes_utc() {
        let (instant, strategy) = parse_with_strategy("2024-03-10T06:15:30").unwrap();
        assert_eq!(strategy, Strategy::Template("yyyy-MM-dd'T'HH:mm:ssXXXXX"));
        assert_eq!(instant, utc(2024, 3, 10, 6, 15, 30));
        assert_eq!(instant.offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_literal_z_with_milliseconds() {
        let instant = parse("2024-03-10T06:15:30.999Z").unwrap();
        assert_eq!(instant.timestamp(), utc(2024, 3, 10, 6, 15, 30).timestamp());
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        assert_eq!(
            parse("  2024-03-10T06:15:30Z\n").unwrap(),
            utc(2024, 3, 10, 6, 15, 30)
        );
    }

    #[test]
    fn test_unmatched_inputs_are_rejected() {
        for raw in [
            "",
            "yesterday",
            "06:15:30",
            "2024-03-10",
            "10/03/2024 06:15",
            "2024-13-10T06:15:30Z",
            "2024-03-10T06:15:30+2500",
        ] {
            let err = parse(raw).unwrap_err();
            assert_eq!(err.input, raw);
        }
    }

    #[test]
    fn test_offset_style_must_match_template() {
        assert!(parse_template("2024-03-10T06:15:30+0000", &TEMPLATES[0]).is_none());
        assert!(parse_template("2024-03-10T06:15:30+00:00", &TEMPLATES[2]).is_none());
    }
}
