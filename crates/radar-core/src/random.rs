//! Injectable random source for the motion model.
//!
//! The simulator never touches a global RNG. It owns a boxed
//! [`RandomSource`], so production runs can seed from OS entropy while
//! tests replay a fixed seed or a scripted sequence of draws.

use std::collections::VecDeque;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Source of the random draws the motion model needs.
pub trait RandomSource: Send {
    /// Draw uniformly from `[min, max)`.
    ///
    /// Returns `min` when the range is empty or inverted, and `0.0` when
    /// `min` is not finite.
    fn uniform(&mut self, min: f64, max: f64) -> f64;

    /// Return `true` with the given probability. Values outside `[0, 1]`
    /// are clamped.
    fn chance(&mut self, probability: f64) -> bool;

    /// Return `1.0` or `-1.0` with equal probability.
    fn sign(&mut self) -> f64 {
        if self.chance(0.5) { 1.0 } else { -1.0 }
    }
}

/// [`RandomSource`] backed by a [`SmallRng`].
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: SmallRng,
}

impl SeededRandom {
    /// Deterministic source for a fixed seed.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Source seeded from operating-system entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: SmallRng::from_os_rng(),
        }
    }

    /// Seeded when `seed` is set, entropy-seeded otherwise.
    pub fn from_optional_seed(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_entropy, Self::from_seed)
    }
}

impl RandomSource for SeededRandom {
    fn uniform(&mut self, min: f64, max: f64) -> f64 {
        if !min.is_finite() {
            return 0.0;
        }
        if !max.is_finite() || min >= max {
            return min;
        }
        self.rng.random_range(min..max)
    }

    fn chance(&mut self, probability: f64) -> bool {
        if probability.is_nan() || probability <= 0.0 {
            false
        } else if probability >= 1.0 {
            true
        } else {
            self.rng.random_bool(probability)
        }
    }
}

/// [`RandomSource`] that replays a fixed script of unit draws.
///
/// Every call consumes one value `u` in `[0, 1)` from the script
/// (falling back to `fallback` once it runs dry):
///
/// - `uniform(min, max)` returns `min + u * (max - min)`
/// - `chance(p)` returns `u < p`
/// - `sign()` returns `1.0` when `u < 0.5`, else `-1.0`
#[derive(Debug, Clone)]
pub struct ScriptedRandom {
    script: VecDeque<f64>,
    fallback: f64,
}

impl ScriptedRandom {
    /// Create a scripted source. `fallback` is returned once the script
    /// is exhausted.
    pub fn new(script: impl IntoIterator<Item = f64>, fallback: f64) -> Self {
        Self {
            script: script.into_iter().collect(),
            fallback,
        }
    }

    /// A source whose every draw is `u`.
    pub fn constant(u: f64) -> Self {
        Self::new([], u)
    }

    /// Number of scripted draws not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }

    fn next_unit(&mut self) -> f64 {
        self.script.pop_front().unwrap_or(self.fallback).clamp(0.0, 1.0)
    }
}

impl RandomSource for ScriptedRandom {
    fn uniform(&mut self, min: f64, max: f64) -> f64 {
        let u = self.next_unit();
        if !min.is_finite() {
            return 0.0;
        }
        if !max.is_finite() || min >= max {
            return min;
        }
        (max - min).mul_add(u, min)
    }

    fn chance(&mut self, probability: f64) -> bool {
        self.next_unit() < probability
    }
}
