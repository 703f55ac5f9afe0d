//! Containment policy: the fixed geographic rectangle every target must
//! stay inside.
//!
//! The region gates two things: which source records are admitted during
//! reconciliation, and whether a simulated step is kept or bounced.

use serde::Deserialize;

/// Inclusive latitude/longitude rectangle in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Region {
    /// Southern bound.
    #[serde(default = "default_min_lat")]
    pub min_lat: f64,
    /// Northern bound.
    #[serde(default = "default_max_lat")]
    pub max_lat: f64,
    /// Western bound.
    #[serde(default = "default_min_lon")]
    pub min_lon: f64,
    /// Eastern bound.
    #[serde(default = "default_max_lon")]
    pub max_lon: f64,
}

impl Region {
    /// Create a region from explicit bounds.
    pub const fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }

    /// Whether the point lies inside the region (bounds inclusive).
    ///
    /// Non-finite coordinates are never contained.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lon..=self.max_lon).contains(&lon)
    }

    /// Check that the bounds are finite, ordered, and on the globe.
    pub fn validate(&self) -> Result<(), String> {
        let bounds = [self.min_lat, self.max_lat, self.min_lon, self.max_lon];
        if bounds.iter().any(|b| !b.is_finite()) {
            return Err(String::from("region bounds must be finite"));
        }
        if self.min_lat > self.max_lat || self.min_lon > self.max_lon {
            return Err(format!(
                "region bounds are inverted: lat [{}, {}], lon [{}, {}]",
                self.min_lat, self.max_lat, self.min_lon, self.max_lon
            ));
        }
        if self.min_lat < -90.0 || self.max_lat > 90.0 || self.min_lon < -180.0 || self.max_lon > 180.0
        {
            return Err(String::from("region bounds exceed the valid lat/lon range"));
        }
        Ok(())
    }
}

impl Default for Region {
    fn default() -> Self {
        Self::new(
            default_min_lat(),
            default_max_lat(),
            default_min_lon(),
            default_max_lon(),
        )
    }
}

const fn default_min_lat() -> f64 {
    36.0
}

const fn default_max_lat() -> f64 {
    42.0
}

const fn default_min_lon() -> f64 {
    26.0
}

const fn default_max_lon() -> f64 {
    45.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interior_point_is_contained() {
        assert!(Region::default().contains(39.0, 35.0));
    }

    #[test]
    fn bounds_are_inclusive() {
        let r = Region::default();
        assert!(r.contains(36.0, 26.0));
        assert!(r.contains(42.0, 45.0));
    }

    #[test]
    fn exterior_points_are_rejected() {
        let r = Region::default();
        assert!(!r.contains(10.0, 10.0));
        assert!(!r.contains(35.99, 30.0));
        assert!(!r.contains(39.0, 45.01));
    }

    #[test]
    fn non_finite_points_are_rejected() {
        let r = Region::default();
        assert!(!r.contains(f64::NAN, 30.0));
        assert!(!r.contains(39.0, f64::INFINITY));
    }

    #[test]
    fn validate_rejects_bad_bounds() {
        assert!(Region::default().validate().is_ok());
        assert!(Region::new(42.0, 36.0, 26.0, 45.0).validate().is_err());
        assert!(Region::new(36.0, 42.0, f64::NAN, 45.0).validate().is_err());
        assert!(Region::new(-95.0, 42.0, 26.0, 45.0).validate().is_err());
    }
}
