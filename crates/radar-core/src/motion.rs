//! Motion simulator: advances every target by one tick.
//!
//! Each step runs four phases in order:
//!
//! 1. **Attribute jitter** -- velocity and both altitudes receive a small
//!    absolute plus relative perturbation. Velocity never drops below 0,
//!    and a stationary target (velocity 0) stays stationary.
//! 2. **Behavior roll** -- the target's [`BehaviorProfile`] decides whether
//!    it turns or changes altitude this tick.
//! 3. **Heading step** -- the position moves along the heading by
//!    `velocity * dt * position_scale` degrees (heading 0 = north,
//!    90 = east; `cos` feeds latitude, `sin` feeds longitude).
//! 4. **Containment** -- a step that would leave the [`Region`] is undone
//!    and the heading is reversed (bounce correction).
//!
//! The model is a visual approximation, not flight dynamics.

use radar_types::{BehaviorProfile, SourceRecord, Target, normalize_heading};

use crate::config::{MotionConfig, Span};
use crate::containment::Region;
use crate::random::RandomSource;

/// Seconds per minute, for converting climb rates in ft/min.
const SECONDS_PER_MINUTE: f64 = 60.0;

/// Outcome of stepping a single target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    /// A maneuver branch fired (aggressive profile only).
    pub maneuvering: bool,
    /// The position changed this tick.
    pub moved: bool,
    /// The step was undone by the containment policy.
    pub bounced: bool,
}

/// Aggregate outcome of one tick over the whole store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Targets stepped.
    pub targets: usize,
    /// Targets that maneuvered.
    pub maneuvering: usize,
    /// Targets bounced off the region boundary.
    pub bounced: usize,
}

/// Advances targets using a probabilistic motion model.
pub struct MotionSimulator {
    config: MotionConfig,
    region: Region,
    rng: Box<dyn RandomSource>,
}

impl std::fmt::Debug for MotionSimulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotionSimulator")
            .field("config", &self.config)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl MotionSimulator {
    /// Create a simulator with its own random source.
    pub fn new(config: MotionConfig, region: Region, rng: Box<dyn RandomSource>) -> Self {
        Self {
            config,
            region,
            rng,
        }
    }

    /// The containment region targets are held within.
    pub const fn region(&self) -> &Region {
        &self.region
    }

    /// The motion parameters in use.
    pub const fn config(&self) -> &MotionConfig {
        &self.config
    }

    /// Initialize a newly observed target: random heading in `[0, 360)`
    /// and a profile drawn with probability `aggressive_ratio`.
    pub fn spawn(&mut self, record: &SourceRecord) -> Target {
        let heading = self.rng.uniform(0.0, 360.0);
        let profile = if self.rng.chance(self.config.aggressive_ratio) {
            BehaviorProfile::Aggressive
        } else {
            BehaviorProfile::Standard
        };
        Target::from_record(record, heading, profile)
    }

    /// Advance every target by `delta_seconds`.
    pub fn tick<'a>(
        &mut self,
        targets: impl IntoIterator<Item = &'a mut Target>,
        delta_seconds: f64,
    ) -> TickReport {
        let mut report = TickReport::default();
        for target in targets {
            let step = self.step(target, delta_seconds);
            report.targets = report.targets.saturating_add(1);
            if step.maneuvering {
                report.maneuvering = report.maneuvering.saturating_add(1);
            }
            if step.bounced {
                report.bounced = report.bounced.saturating_add(1);
            }
        }
        report
    }

    /// Advance a single target by `delta_seconds`.
    ///
    /// Never fails. A negative or non-finite delta is treated as zero
    /// elapsed time.
    pub fn step(&mut self, target: &mut Target, delta_seconds: f64) -> StepReport {
        let dt = if delta_seconds.is_finite() { delta_seconds.max(0.0) } else { 0.0 };

        self.jitter(target);
        target.maneuvering = self.behave(target, dt);

        let mut report = StepReport {
            maneuvering: target.maneuvering,
            ..StepReport::default()
        };

        if target.velocity > 0.0 && dt > 0.0 {
            let before = target.position;
            let distance = target.velocity * dt * self.config.position_scale;
            let radians = target.heading.to_radians();
            let d_lat = radians.cos() * distance;
            let d_lon = radians.sin() * distance;

            target.position.lat += d_lat;
            target.position.lon += d_lon;

            if self.region.contains(target.position.lat, target.position.lon) {
                report.moved = true;
            } else {
                // Undo the step exactly.
                target.position = before;
                target.heading = normalize_heading(target.heading + 180.0);
                report.bounced = true;
            }
        }

        report
    }

    fn jitter(&mut self, target: &mut Target) {
        let cfg = &self.config;
        let rng = &mut self.rng;

        if target.velocity > 0.0 {
            let absolute = rng.uniform(-cfg.velocity_jitter, cfg.velocity_jitter);
            let relative = target.velocity * rng.uniform(-cfg.velocity_jitter_pct, cfg.velocity_jitter_pct);
            let next = target.velocity + absolute + relative;
            target.velocity = if next.is_finite() { next.max(0.0) } else { 0.0 };
        }

        for altitude in [&mut target.baro_altitude, &mut target.geo_altitude] {
            let current = f64::from(*altitude);
            let absolute = rng.uniform(-cfg.altitude_jitter_ft, cfg.altitude_jitter_ft);
            let relative = current * rng.uniform(-cfg.altitude_jitter_pct, cfg.altitude_jitter_pct);
            *altitude = offset_altitude(*altitude, absolute + relative);
        }
    }

    /// Roll this tick's behavioral event. Returns whether a maneuver fired.
    fn behave(&mut self, target: &mut Target, dt: f64) -> bool {
        let rng = &mut self.rng;
        match target.profile {
            BehaviorProfile::Aggressive => {
                let cfg = &self.config.aggressive;
                let roll = rng.uniform(0.0, 100.0);
                let branch = if roll < cfg.hard_maneuver_pct {
                    Some((cfg.hard_turn_deg, cfg.hard_climb_fpm))
                } else if roll < cfg.hard_maneuver_pct + cfg.soft_maneuver_pct {
                    Some((cfg.soft_turn_deg, cfg.soft_climb_fpm))
                } else {
                    None
                };
                let Some((turn, climb)) = branch else {
                    return false;
                };
                turn_by(target, signed_draw(rng.as_mut(), turn));
                climb_by(target, signed_draw(rng.as_mut(), climb), dt);
                true
            }
            BehaviorProfile::Standard => {
                let cfg = &self.config.standard;
                if rng.chance(cfg.turn_probability) {
                    turn_by(target, signed_draw(rng.as_mut(), cfg.turn_deg));
                }
                if rng.chance(cfg.climb_probability) {
                    climb_by(target, signed_draw(rng.as_mut(), cfg.climb_fpm), dt);
                }
                false
            }
        }
    }
}

/// Draw a magnitude from `span` with a random sign.
fn signed_draw(rng: &mut dyn RandomSource, span: Span) -> f64 {
    let sign = rng.sign();
    sign * rng.uniform(span.min, span.max)
}

fn turn_by(target: &mut Target, degrees: f64) {
    target.heading = normalize_heading(target.heading + degrees);
}

/// Apply a climb (positive) or descent (negative) rate in ft/min for `dt`
/// seconds to both altitude readings.
fn climb_by(target: &mut Target, feet_per_minute: f64, dt: f64) {
    let delta = feet_per_minute * dt / SECONDS_PER_MINUTE;
    target.baro_altitude = offset_altitude(target.baro_altitude, delta);
    target.geo_altitude = offset_altitude(target.geo_altitude, delta);
}

/// Add `delta_ft` to an altitude, rounding, flooring at 0 and saturating
/// at `i32::MAX`.
#[allow(clippy::cast_possible_truncation)]
fn offset_altitude(altitude: i32, delta_ft: f64) -> i32 {
    let next = (f64::from(altitude) + delta_ft).round();
    if next.is_finite() {
        // `as` saturates at i32::MAX; the floor handles the other side.
        next.max(0.0) as i32
    } else {
        altitude.max(0)
    }
}
