//! Data layer for the radar target stream.
//!
//! Provides [`DragonflyTargetSource`], the production
//! [`TargetSource`](radar_core::TargetSource) that reads target documents
//! from a `Dragonfly` hash.
//!
//! # Modules
//!
//! - [`dragonfly`] -- `Dragonfly` (Redis-compatible) target documents
//! - [`error`] -- Shared error types

pub mod dragonfly;
pub mod error;

// Re-export primary types for convenience.
pub use dragonfly::{DragonflyTargetSource, ProbeReport, decode_entries};
pub use error::DbError;
