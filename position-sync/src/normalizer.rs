//! Converts the position payloads of the snapshot, cache and stream sources into [RawPosition].
//!
//! Every source names its fields differently and some report speed in km/h, so
//! each canonical field has a list of accepted names. Payloads are searched
//! layer by layer, the first layer carrying a non-null value wins.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use fleet_core::{Coordinates, Mmsi, NavigationStatus, RawPosition, SourceKind};
use serde_json::Value;

const KNOTS_PER_KMH: f64 = 1.0 / 1.852;
/// AIS speed over ground of 102.3 knots means not available.
const SPEED_NOT_AVAILABLE: f64 = 102.3;
/// Epoch values above this are in milliseconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 100_000_000_000.0;

const LATITUDE: &[&str] = &["lat", "latitude", "Latitude", "LAT"];
const LONGITUDE: &[&str] = &["lng", "lon", "long", "longitude", "Longitude", "LON"];
const SPEED_KNOTS: &[&str] = &["speed", "sog", "Sog", "SOG", "speedOverGround"];
const SPEED_KMH: &[&str] = &["speedKmh", "speed_kmh"];
const COURSE: &[&str] = &["course", "cog", "Cog", "COG", "courseOverGround"];
const HEADING: &[&str] = &["heading", "trueHeading", "TrueHeading", "hdg"];
const NAVIGATIONAL_STATUS: &[&str] = &[
    "navigationalStatus",
    "NavigationalStatus",
    "navigational_status",
    "navStatus",
];
const TIMESTAMP: &[&str] = &[
    "timestamp",
    "time_utc",
    "msgtime",
    "time",
    "lastUpdate",
    "updatedAt",
];
const STALE: &[&str] = &["isStale", "is_stale", "stale"];
const MMSI: &[&str] = &["mmsi", "MMSI", "UserID", "userId"];

pub fn normalize(layers: &[&Value], source_kind: SourceKind) -> RawPosition {
    let coordinates = match (number(layers, LATITUDE), number(layers, LONGITUDE)) {
        (Some(lat), Some(lng)) => Coordinates::new(lat, lng),
        _ => None,
    };

    let mut position = RawPosition::new(coordinates, source_kind);

    position.speed = number(layers, SPEED_KNOTS)
        .or_else(|| number(layers, SPEED_KMH).map(|v| v * KNOTS_PER_KMH))
        .filter(|v| *v >= 0.0 && *v < SPEED_NOT_AVAILABLE);
    position.course = number(layers, COURSE).filter(|v| (0.0..360.0).contains(v));
    position.heading = number(layers, HEADING).filter(|v| (0.0..360.0).contains(v));
    position.navigational_status = number(layers, NAVIGATIONAL_STATUS)
        .and_then(|v| NavigationStatus::from_code(v as i64));
    position.timestamp = field(layers, TIMESTAMP).and_then(timestamp);
    position.is_stale = field(layers, STALE).and_then(boolean).unwrap_or(false);

    position
}

pub fn mmsi(layers: &[&Value]) -> Option<Mmsi> {
    mmsi_value(field(layers, MMSI)?)
}

/// Mmsis arrive both as numbers and as strings.
pub fn mmsi_value(value: &Value) -> Option<Mmsi> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|v| Mmsi::try_from(v).ok()),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// AIS text fields are padded with spaces and '@', empty strings count as missing.
pub fn text(layers: &[&Value], names: &[&str]) -> Option<String> {
    let value = field(layers, names)?.as_str()?;
    let value = value.trim_matches(|c: char| c.is_whitespace() || c == '@');

    (!value.is_empty()).then(|| value.to_owned())
}

pub fn integer(layers: &[&Value], names: &[&str]) -> Option<i64> {
    number(layers, names)
        .filter(|v| v.fract() == 0.0)
        .map(|v| v as i64)
}

fn field<'a>(layers: &[&'a Value], names: &[&str]) -> Option<&'a Value> {
    layers
        .iter()
        .copied()
        .filter_map(Value::as_object)
        .flat_map(|object| names.iter().filter_map(move |name| object.get(*name)))
        .find(|v| !v.is_null())
}

fn number(layers: &[&Value], names: &[&str]) -> Option<f64> {
    let value = match field(layers, names)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };

    value.filter(|v: &f64| v.is_finite())
}

fn boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(v) => Some(*v),
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_i64().map(|v| v != 0),
        _ => None,
    }
}

fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            let v = n.as_f64()?;
            if v >= EPOCH_MILLIS_THRESHOLD {
                Utc.timestamp_millis_opt(v as i64).single()
            } else {
                Utc.timestamp_opt(v as i64, 0).single()
            }
        }
        Value::String(s) => parse_timestamp(s.trim()),
        _ => None,
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(v) = DateTime::parse_from_rfc3339(value) {
        return Some(v.with_timezone(&Utc));
    }

    // Go style timestamps, e.g. '2024-05-01 10:12:31.422 +0000 UTC'.
    let trimmed = value.trim_end_matches(" UTC");
    if let Ok(v) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f %z") {
        return Some(v.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|v| Utc.from_utc_datetime(&v))
}
