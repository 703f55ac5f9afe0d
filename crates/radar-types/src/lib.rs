//! Shared type definitions for the radar target stream.
//!
//! This crate is the single source of truth for the data that flows
//! between the record source, the simulation engine, and the streaming
//! endpoint.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers (streaming session identifiers)
//! - [`target`] -- Simulated target state and behavior profiles
//! - [`record`] -- Normalized source records and document normalization
//! - [`message`] -- Wire messages exchanged with streaming clients

pub mod ids;
pub mod message;
pub mod record;
pub mod target;

// Re-export all public types at crate root for convenience.
pub use ids::SessionId;
pub use message::{StoreStatus, StreamRequest, TrackMessage, display_id};
pub use record::SourceRecord;
pub use target::{BehaviorProfile, GeoPoint, Target, normalize_heading};
