//! Wire messages exchanged with streaming clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::target::{BehaviorProfile, Target};

/// Parameters a client supplies when opening a target stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRequest {
    /// Desired pause between ticks in milliseconds. Absent or non-positive
    /// values select the server default.
    #[serde(default)]
    pub refresh_interval_ms: Option<i64>,
}

impl StreamRequest {
    /// Create a request with an explicit refresh interval.
    pub const fn with_interval_ms(ms: i64) -> Self {
        Self {
            refresh_interval_ms: Some(ms),
        }
    }

    /// Resolve the effective refresh interval in milliseconds.
    ///
    /// Returns the caller's value when it is present and positive,
    /// otherwise `default_ms`.
    pub fn resolve_interval_ms(&self, default_ms: u64) -> u64 {
        self.refresh_interval_ms
            .and_then(|ms| u64::try_from(ms).ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(default_ms)
    }
}

/// One target as emitted on the stream.
///
/// `display_id` is a presentation label derived from the target's rank in
/// the tick's snapshot. It is not the stable entity id and may change
/// between ticks when targets appear or disappear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackMessage {
    /// Rank-derived label such as `ID001`.
    pub display_id: String,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Speed rounded to whole source units per second.
    pub velocity: i32,
    /// Barometric altitude in feet.
    pub baro_altitude: i32,
    /// Geometric altitude in feet.
    pub geo_altitude: i32,
    /// Heading in degrees, `[0, 360)`.
    pub heading: f64,
    /// Behavior profile of the target.
    pub profile: BehaviorProfile,
    /// Whether the target maneuvered during the last tick.
    pub maneuvering: bool,
}

impl TrackMessage {
    /// Project a target into its wire form under the given display id.
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_target(target: &Target, display_id: String) -> Self {
        let velocity = if target.velocity.is_finite() {
            // `as` saturates at the i32 bounds.
            target.velocity.round() as i32
        } else {
            0
        };
        Self {
            display_id,
            lat: target.position.lat,
            lon: target.position.lon,
            velocity,
            baro_altitude: target.baro_altitude,
            geo_altitude: target.geo_altitude,
            heading: target.heading,
            profile: target.profile,
            maneuvering: target.maneuvering,
        }
    }
}

/// Format the display label for a 1-based rank: `ID001`, `ID002`, ...
///
/// Ranks above 999 simply widen (`ID1000`).
pub fn display_id(rank: usize) -> String {
    format!("ID{rank:03}")
}

/// Observability summary of the target store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStatus {
    /// Number of targets currently held.
    pub active_targets: usize,
    /// Number of completed reconciliations since start.
    pub reconciliations: u64,
    /// Wall-clock time of the last completed reconciliation.
    pub last_reconciled_at: Option<DateTime<Utc>>,
    /// Message of the most recent fetch failure, cleared on success.
    pub last_fetch_error: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::record::SourceRecord;

    #[test]
    fn display_ids_are_zero_padded() {
        assert_eq!(display_id(1), "ID001");
        assert_eq!(display_id(42), "ID042");
        assert_eq!(display_id(999), "ID999");
        assert_eq!(display_id(1000), "ID1000");
    }

    #[test]
    fn interval_falls_back_when_absent_or_non_positive() {
        assert_eq!(StreamRequest::default().resolve_interval_ms(1000), 1000);
        assert_eq!(StreamRequest::with_interval_ms(0).resolve_interval_ms(1000), 1000);
        assert_eq!(StreamRequest::with_interval_ms(-250).resolve_interval_ms(1000), 1000);
        assert_eq!(StreamRequest::with_interval_ms(250).resolve_interval_ms(1000), 250);
    }

    #[test]
    fn request_deserializes_without_interval() {
        let req: StreamRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.refresh_interval_ms, None);
    }

    #[test]
    fn message_rounds_velocity_and_uses_camel_case() {
        let record = SourceRecord {
            id: String::from("A"),
            lat: 39.0,
            lon: 35.0,
            velocity: 200.6,
            baro_altitude: 1000,
            geo_altitude: 1100,
        };
        let target = Target::from_record(&record, 45.0, BehaviorProfile::Standard);
        let msg = TrackMessage::from_target(&target, display_id(1));
        assert_eq!(msg.velocity, 201);
        assert_eq!(msg.heading, 45.0);

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["displayId"], "ID001");
        assert_eq!(json["baroAltitude"], 1000);
        assert_eq!(json["profile"], "standard");
        assert_eq!(json["maneuvering"], false);
    }
}
