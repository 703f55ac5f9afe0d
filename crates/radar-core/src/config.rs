//! Configuration loading and typed config structures for the radar stream.
//!
//! The canonical configuration lives in `radar-config.yaml` at the project
//! root. This module defines strongly-typed structs that mirror the YAML
//! structure, and provides a loader that reads and validates the file.
//! Every field has a default, so an empty file is a valid configuration.

use std::path::Path;

use serde::Deserialize;

use crate::containment::Region;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but holds unusable values.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level service configuration.
///
/// Mirrors the structure of `radar-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RadarConfig {
    /// Listening address for the streaming server.
    #[serde(default)]
    pub server: ServerSection,

    /// Target record source settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Streaming cadence and reconciliation throttle.
    #[serde(default)]
    pub stream: StreamConfig,

    /// Containment region all targets must stay within.
    #[serde(default)]
    pub region: Region,

    /// Motion model parameters.
    #[serde(default)]
    pub motion: MotionConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RadarConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `RADAR_DRAGONFLY_URL` overrides `source.dragonfly_url`
    /// - `RADAR_PORT` overrides `server.port`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&contents)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// The environment is not consulted; see [`Self::apply_env_overrides`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config = Self::from_yaml(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        // serde_yml maps an empty document to unit, not to an empty mapping.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply environment variable overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from `lookup`, which maps a variable name to its
    /// value. Invalid values are logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("RADAR_DRAGONFLY_URL") {
            self.source.dragonfly_url = val;
        }
        if let Some(val) = lookup("RADAR_PORT") {
            match val.parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(e) => tracing::warn!(value = %val, error = %e, "ignoring invalid RADAR_PORT"),
            }
        }
    }

    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.region.validate().map_err(ConfigError::Invalid)?;
        self.motion.validate().map_err(ConfigError::Invalid)?;
        self.source.validate().map_err(ConfigError::Invalid)?;
        if self.stream.default_refresh_interval_ms == 0 {
            return Err(ConfigError::Invalid(String::from(
                "stream.default_refresh_interval_ms must be positive",
            )));
        }
        Ok(())
    }
}

/// Listening address configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSection {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Which record source backs the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Dragonfly / Redis hash of JSON documents.
    #[default]
    Dragonfly,
    /// In-memory source seeded from `source.static_records`.
    Static,
}

/// Target record source configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceConfig {
    /// Source backend.
    #[serde(default)]
    pub kind: SourceKind,

    /// Dragonfly connection URL (`redis://host:port/db`).
    #[serde(default = "default_dragonfly_url")]
    pub dragonfly_url: String,

    /// Hash key holding one JSON document per target.
    #[serde(default = "default_targets_key")]
    pub targets_key: String,

    /// Raw documents served by the static source.
    #[serde(default)]
    pub static_records: Vec<serde_json::Value>,

    /// Per-command timeout for Dragonfly reads, in milliseconds.
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,

    /// Timeout for each Dragonfly connection attempt, in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Reconnect attempts after a dropped connection. `0` retries forever.
    #[serde(default)]
    pub reconnect_max_attempts: u32,

    /// First reconnect backoff delay, in milliseconds.
    #[serde(default = "default_reconnect_min_delay_ms")]
    pub reconnect_min_delay_ms: u32,

    /// Backoff ceiling between reconnect attempts, in milliseconds.
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u32,
}

impl SourceConfig {
    fn validate(&self) -> Result<(), String> {
        if self.command_timeout_ms == 0 || self.connect_timeout_ms == 0 {
            return Err(String::from(
                "source.command_timeout_ms and source.connect_timeout_ms must be positive",
            ));
        }
        if self.reconnect_min_delay_ms > self.reconnect_max_delay_ms {
            return Err(format!(
                "source.reconnect_min_delay_ms ({}) exceeds reconnect_max_delay_ms ({})",
                self.reconnect_min_delay_ms, self.reconnect_max_delay_ms
            ));
        }
        Ok(())
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            dragonfly_url: default_dragonfly_url(),
            targets_key: default_targets_key(),
            static_records: Vec::new(),
            command_timeout_ms: default_command_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            reconnect_max_attempts: 0,
            reconnect_min_delay_ms: default_reconnect_min_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
        }
    }
}

/// Streaming cadence configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamConfig {
    /// Refresh interval used when the client does not ask for one.
    #[serde(default = "default_refresh_interval_ms")]
    pub default_refresh_interval_ms: u64,

    /// Minimum time between two reconciliations with the source.
    #[serde(default = "default_min_reconcile_interval_ms")]
    pub min_reconcile_interval_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            default_refresh_interval_ms: default_refresh_interval_ms(),
            min_reconcile_interval_ms: default_min_reconcile_interval_ms(),
        }
    }
}

/// Closed range `[min, max]` used by the motion model.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Span {
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
}

impl Span {
    /// Create a span.
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    fn check(self, name: &str) -> Result<(), String> {
        if !self.min.is_finite() || !self.max.is_finite() || self.min > self.max {
            return Err(format!("{name}: invalid range [{}, {}]", self.min, self.max));
        }
        Ok(())
    }
}

/// Motion model parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MotionConfig {
    /// Degrees of travel per (speed unit x second).
    #[serde(default = "default_position_scale")]
    pub position_scale: f64,

    /// Absolute velocity jitter per tick (+/- units).
    #[serde(default = "default_velocity_jitter")]
    pub velocity_jitter: f64,

    /// Relative velocity jitter per tick (+/- fraction of current value).
    #[serde(default = "default_velocity_jitter_pct")]
    pub velocity_jitter_pct: f64,

    /// Absolute altitude jitter per tick (+/- feet).
    #[serde(default = "default_altitude_jitter_ft")]
    pub altitude_jitter_ft: f64,

    /// Relative altitude jitter per tick (+/- fraction of current value).
    #[serde(default = "default_altitude_jitter_pct")]
    pub altitude_jitter_pct: f64,

    /// Probability that a newly observed target gets the aggressive profile.
    #[serde(default = "default_aggressive_ratio")]
    pub aggressive_ratio: f64,

    /// Aggressive (fighter-like) behavior.
    #[serde(default)]
    pub aggressive: AggressiveConfig,

    /// Standard (airliner-like) behavior.
    #[serde(default)]
    pub standard: StandardConfig,

    /// Fixed RNG seed. `None` seeds from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl MotionConfig {
    fn validate(&self) -> Result<(), String> {
        if !self.position_scale.is_finite() || self.position_scale < 0.0 {
            return Err(format!("motion.position_scale must be >= 0, got {}", self.position_scale));
        }
        for (name, value) in [
            ("motion.velocity_jitter", self.velocity_jitter),
            ("motion.velocity_jitter_pct", self.velocity_jitter_pct),
            ("motion.altitude_jitter_ft", self.altitude_jitter_ft),
            ("motion.altitude_jitter_pct", self.altitude_jitter_pct),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{name} must be >= 0, got {value}"));
            }
        }
        check_probability("motion.aggressive_ratio", self.aggressive_ratio)?;
        self.aggressive.validate()?;
        self.standard.validate()
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            position_scale: default_position_scale(),
            velocity_jitter: default_velocity_jitter(),
            velocity_jitter_pct: default_velocity_jitter_pct(),
            altitude_jitter_ft: default_altitude_jitter_ft(),
            altitude_jitter_pct: default_altitude_jitter_pct(),
            aggressive_ratio: default_aggressive_ratio(),
            aggressive: AggressiveConfig::default(),
            standard: StandardConfig::default(),
            seed: None,
        }
    }
}

/// Aggressive profile: one percentage roll per tick selects a hard
/// maneuver, a soft maneuver, or nothing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AggressiveConfig {
    /// Chance of a hard maneuver, in percent.
    #[serde(default = "default_hard_maneuver_pct")]
    pub hard_maneuver_pct: f64,
    /// Chance of a soft maneuver, in percent (exclusive with hard).
    #[serde(default = "default_soft_maneuver_pct")]
    pub soft_maneuver_pct: f64,
    /// Heading change magnitude of a hard maneuver, degrees.
    #[serde(default = "default_hard_turn_deg")]
    pub hard_turn_deg: Span,
    /// Climb/descent rate of a hard maneuver, feet per minute.
    #[serde(default = "default_hard_climb_fpm")]
    pub hard_climb_fpm: Span,
    /// Heading change magnitude of a soft maneuver, degrees.
    #[serde(default = "default_soft_turn_deg")]
    pub soft_turn_deg: Span,
    /// Climb/descent rate of a soft maneuver, feet per minute.
    #[serde(default = "default_soft_climb_fpm")]
    pub soft_climb_fpm: Span,
}

impl AggressiveConfig {
    fn validate(&self) -> Result<(), String> {
        let hard = self.hard_maneuver_pct;
        let soft = self.soft_maneuver_pct;
        if !(0.0..=100.0).contains(&hard)
            || !(0.0..=100.0).contains(&soft)
            || hard + soft > 100.0
        {
            return Err(format!(
                "motion.aggressive maneuver percentages out of range (hard {hard}, soft {soft})"
            ));
        }
        self.hard_turn_deg.check("motion.aggressive.hard_turn_deg")?;
        self.hard_climb_fpm.check("motion.aggressive.hard_climb_fpm")?;
        self.soft_turn_deg.check("motion.aggressive.soft_turn_deg")?;
        self.soft_climb_fpm.check("motion.aggressive.soft_climb_fpm")
    }
}

impl Default for AggressiveConfig {
    fn default() -> Self {
        Self {
            hard_maneuver_pct: default_hard_maneuver_pct(),
            soft_maneuver_pct: default_soft_maneuver_pct(),
            hard_turn_deg: default_hard_turn_deg(),
            hard_climb_fpm: default_hard_climb_fpm(),
            soft_turn_deg: default_soft_turn_deg(),
            soft_climb_fpm: default_soft_climb_fpm(),
        }
    }
}

/// Standard profile: independent small turn and climb events.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StandardConfig {
    /// Per-tick probability of a heading adjustment.
    #[serde(default = "default_standard_turn_probability")]
    pub turn_probability: f64,
    /// Heading adjustment magnitude, degrees.
    #[serde(default = "default_standard_turn_deg")]
    pub turn_deg: Span,
    /// Per-tick probability of a climb or descent.
    #[serde(default = "default_standard_climb_probability")]
    pub climb_probability: f64,
    /// Climb/descent rate, feet per minute.
    #[serde(default = "default_standard_climb_fpm")]
    pub climb_fpm: Span,
}

impl StandardConfig {
    fn validate(&self) -> Result<(), String> {
        check_probability("motion.standard.turn_probability", self.turn_probability)?;
        check_probability("motion.standard.climb_probability", self.climb_probability)?;
        self.turn_deg.check("motion.standard.turn_deg")?;
        self.climb_fpm.check("motion.standard.climb_fpm")
    }
}

impl Default for StandardConfig {
    fn default() -> Self {
        Self {
            turn_probability: default_standard_turn_probability(),
            turn_deg: default_standard_turn_deg(),
            climb_probability: default_standard_climb_probability(),
            climb_fpm: default_standard_climb_fpm(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default log filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON log lines instead of human-readable text.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn check_probability(name: &str, p: f64) -> Result<(), String> {
    if (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(format!("{name} must be within [0, 1], got {p}"))
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    50053
}

fn default_dragonfly_url() -> String {
    "redis://localhost:6379".to_owned()
}

fn default_targets_key() -> String {
    "radar:targets".to_owned()
}

const fn default_command_timeout_ms() -> u64 {
    2000
}

const fn default_connect_timeout_ms() -> u64 {
    5000
}

const fn default_reconnect_min_delay_ms() -> u32 {
    100
}

const fn default_reconnect_max_delay_ms() -> u32 {
    10_000
}

const fn default_refresh_interval_ms() -> u64 {
    1000
}

const fn default_min_reconcile_interval_ms() -> u64 {
    5000
}

const fn default_position_scale() -> f64 {
    0.000_02
}

const fn default_velocity_jitter() -> f64 {
    2.0
}

const fn default_velocity_jitter_pct() -> f64 {
    0.01
}

const fn default_altitude_jitter_ft() -> f64 {
    15.0
}

const fn default_altitude_jitter_pct() -> f64 {
    0.005
}

const fn default_aggressive_ratio() -> f64 {
    0.2
}

const fn default_hard_maneuver_pct() -> f64 {
    10.0
}

const fn default_soft_maneuver_pct() -> f64 {
    30.0
}

const fn default_hard_turn_deg() -> Span {
    Span::new(90.0, 135.0)
}

const fn default_hard_climb_fpm() -> Span {
    Span::new(6000.0, 15_000.0)
}

const fn default_soft_turn_deg() -> Span {
    Span::new(3.0, 10.0)
}

const fn default_soft_climb_fpm() -> Span {
    Span::new(1000.0, 3000.0)
}

const fn default_standard_turn_probability() -> f64 {
    0.05
}

const fn default_standard_turn_deg() -> Span {
    Span::new(0.5, 3.0)
}

const fn default_standard_climb_probability() -> f64 {
    0.03
}

const fn default_standard_climb_fpm() -> Span {
    Span::new(200.0, 600.0)
}

fn default_log_level() -> String {
    "info".to_owned()
}
