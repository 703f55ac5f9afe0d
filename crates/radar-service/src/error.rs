//! Error types for the service binary.
//!
//! [`ServiceError`] is the top-level error type that wraps all possible
//! failure modes during startup and serving.

/// Top-level error for the service binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: radar_core::ConfigError,
    },

    /// The target source could not be set up.
    #[error("source error: {source}")]
    Source {
        /// The underlying data layer error.
        #[from]
        source: radar_db::DbError,
    },

    /// The streaming server failed to start or crashed.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: radar_observer::ServerError,
    },
}
