//! Simulation engine for the radar target stream.
//!
//! Keeps an in-memory fleet of moving targets synchronized with an
//! external record source, advances them with a probabilistic motion
//! model, and streams per-tick snapshots to any number of concurrent
//! sessions.
//!
//! # Modules
//!
//! - [`config`] -- YAML configuration with environment overrides
//! - [`containment`] -- The geographic region targets must stay inside
//! - [`random`] -- Injectable random source (seeded or scripted)
//! - [`motion`] -- Per-tick motion simulator
//! - [`source`] -- Target source trait and the in-memory source
//! - [`throttle`] -- Reconciliation throttle
//! - [`store`] -- Shared target store with throttled refresh
//! - [`session`] -- Streaming session loop

pub mod config;
pub mod containment;
pub mod motion;
pub mod random;
pub mod session;
pub mod source;
pub mod store;
pub mod throttle;

pub use config::{ConfigError, RadarConfig, SourceKind};
pub use containment::Region;
pub use motion::{MotionSimulator, StepReport, TickReport};
pub use random::{RandomSource, ScriptedRandom, SeededRandom};
pub use session::{
    SessionOutcome, SessionSummary, SinkError, StreamSession, TargetSink, resolve_interval,
};
pub use source::{SourceError, StaticTargetSource, TargetSource};
pub use store::{ReconcileReport, RefreshOutcome, TargetStore};
pub use throttle::ReloadThrottle;
