//! Simulated target state.
//!
//! A [`Target`] combines two kinds of fields:
//!
//! - **Source-controlled**: `velocity`, `baro_altitude`, `geo_altitude`.
//!   Overwritten by every reconciliation that still observes the target.
//! - **Simulated**: `position`, `heading`, `profile`, `maneuvering`.
//!   Owned by the motion simulator and preserved across reconciliations.

use serde::{Deserialize, Serialize};

use crate::record::SourceRecord;

/// Behavior profile assigned to a target when it is first observed.
///
/// The profile never changes for the lifetime of the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorProfile {
    /// Airliner-like: gentle, infrequent heading and altitude changes.
    Standard,
    /// Fighter-like: frequent soft maneuvers and occasional hard breaks.
    Aggressive,
}

impl BehaviorProfile {
    /// Whether this profile models a fighter (aggressive) platform.
    pub const fn is_aggressive(self) -> bool {
        matches!(self, Self::Aggressive)
    }
}

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees, positive north.
    pub lat: f64,
    /// Longitude in degrees, positive east.
    pub lon: f64,
}

impl GeoPoint {
    /// Create a new point.
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// One simulated entity tracked by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Stable identity key assigned by the record source.
    pub id: String,
    /// Current simulated position.
    pub position: GeoPoint,
    /// Speed in source units per second. Never negative.
    pub velocity: f64,
    /// Barometric altitude in feet. Never negative.
    pub baro_altitude: i32,
    /// Geometric altitude in feet. Never negative.
    pub geo_altitude: i32,
    /// Direction of travel in degrees, `[0, 360)`, 0 = north, 90 = east.
    pub heading: f64,
    /// Behavior profile chosen at creation.
    pub profile: BehaviorProfile,
    /// Whether a maneuver fired during the most recent tick.
    pub maneuvering: bool,
}

impl Target {
    /// Build a freshly observed target from a source record.
    ///
    /// `heading` and `profile` are chosen by the caller (the motion
    /// simulator draws them from its random source).
    pub fn from_record(record: &SourceRecord, heading: f64, profile: BehaviorProfile) -> Self {
        Self {
            id: record.id.clone(),
            position: GeoPoint::new(record.lat, record.lon),
            velocity: record.velocity.max(0.0),
            baro_altitude: record.baro_altitude.max(0),
            geo_altitude: record.geo_altitude.max(0),
            heading: normalize_heading(heading),
            profile,
            maneuvering: false,
        }
    }

    /// Overwrite the source-controlled fields from a fresh record.
    ///
    /// Position, heading, profile and maneuvering state are left untouched.
    pub fn apply_source(&mut self, record: &SourceRecord) {
        self.velocity = record.velocity.max(0.0);
        self.baro_altitude = record.baro_altitude.max(0);
        self.geo_altitude = record.geo_altitude.max(0);
    }
}

/// Wrap any angle in degrees into `[0, 360)`.
///
/// Non-finite input maps to `0.0`. `rem_euclid` can round up to exactly
/// `360.0` for tiny negative inputs, which is folded back to `0.0`.
pub fn normalize_heading(degrees: f64) -> f64 {
    if !degrees.is_finite() {
        return 0.0;
    }
    let wrapped = degrees.rem_euclid(360.0);
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}
