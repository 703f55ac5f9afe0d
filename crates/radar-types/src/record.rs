//! Normalized source records.
//!
//! The external record store holds loosely-typed documents: ids may be
//! plain strings or extended-JSON object ids, and numeric fields may be
//! stored as integers, doubles, or extended-JSON number wrappers. This
//! module turns such a document into a [`SourceRecord`] or rejects it.
//!
//! Rules:
//!
//! - An id is required (`_id`, then `id`, then the caller's fallback key).
//! - `lat` and `lon` are required and must be finite numbers.
//! - `velocity`, `baroAltitude`, `geoAltitude` are optional and default
//!   to 0 when absent or of an unexpected type.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One entity as reported by the record source, after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRecord {
    /// Opaque identity key assigned by the source.
    pub id: String,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Reported speed in source units per second.
    pub velocity: f64,
    /// Reported barometric altitude in feet.
    pub baro_altitude: i32,
    /// Reported geometric altitude in feet.
    pub geo_altitude: i32,
}

impl SourceRecord {
    /// Normalize a raw document into a record.
    ///
    /// `fallback_id` is used when the document carries no id of its own
    /// (for example the hash field name the document was stored under).
    /// Returns `None` when the id or either coordinate is missing.
    pub fn from_document(doc: &Value, fallback_id: Option<&str>) -> Option<Self> {
        let id = document_id(doc)
            .or_else(|| fallback_id.map(str::to_owned))
            .filter(|id| !id.is_empty())?;

        let lat = doc.get("lat").and_then(number_as_f64)?;
        let lon = doc.get("lon").and_then(number_as_f64)?;
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }

        let velocity = first_field(doc, &["velocity"])
            .and_then(number_as_f64)
            .filter(|v| v.is_finite())
            .unwrap_or(0.0);
        let baro_altitude = first_field(doc, &["baroAltitude", "baroaltitude"])
            .and_then(number_as_i32)
            .unwrap_or(0);
        let geo_altitude = first_field(doc, &["geoAltitude", "geoaltitude"])
            .and_then(number_as_i32)
            .unwrap_or(0);

        Some(Self {
            id,
            lat,
            lon,
            velocity,
            baro_altitude,
            geo_altitude,
        })
    }
}

/// Extract the identity key from `_id` (string or `{"$oid": ...}`) or `id`.
fn document_id(doc: &Value) -> Option<String> {
    match doc.get("_id") {
        Some(Value::String(s)) => return Some(s.clone()),
        Some(Value::Object(map)) => {
            if let Some(Value::String(oid)) = map.get("$oid") {
                return Some(oid.clone());
            }
        }
        _ => {}
    }
    match doc.get("id") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn first_field<'a>(doc: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| doc.get(*key))
}

/// Read a JSON number, or an extended-JSON number wrapper, as `f64`.
fn number_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Object(map) => ["$numberDouble", "$numberInt", "$numberLong"]
            .iter()
            .find_map(|key| map.get(*key))
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<f64>().ok()),
        _ => None,
    }
}

/// Read a JSON number as `i32`, truncating doubles and saturating at the
/// `i32` bounds.
#[allow(clippy::cast_possible_truncation)]
fn number_as_i32(value: &Value) -> Option<i32> {
    if let Some(n) = value.as_i64() {
        return Some(i32::try_from(n).unwrap_or(if n < 0 { i32::MIN } else { i32::MAX }));
    }
    number_as_f64(value)
        .filter(|f| f.is_finite())
        // `as` saturates for floats, which is the behavior we want here.
        .map(|f| f as i32)
}
