//! Error types for the data layer.
//!
//! All errors are propagated via [`DbError`] which wraps the underlying
//! [`fred`] and [`serde_json`] errors. At the [`TargetSource`] boundary
//! they are folded into a [`SourceError`].
//!
//! [`TargetSource`]: radar_core::TargetSource

use fred::error::ErrorKind;
use radar_core::SourceError;

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `Dragonfly`/Redis operation failed.
    #[error("Dragonfly error: {0}")]
    Dragonfly(#[from] fred::error::Error),

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<DbError> for SourceError {
    fn from(err: DbError) -> Self {
        match &err {
            DbError::Dragonfly(inner)
                if matches!(
                    inner.kind(),
                    ErrorKind::IO | ErrorKind::Timeout | ErrorKind::Canceled
                ) =>
            {
                Self::Unavailable(err.to_string())
            }
            DbError::Dragonfly(_) | DbError::Config(_) => Self::Query(err.to_string()),
            DbError::Serialization(_) => Self::Decode(err.to_string()),
        }
    }
}
