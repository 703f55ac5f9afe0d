//! Streaming server for the radar target stream.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws/targets`) running one streaming
//!   session per connection at the client's requested interval
//! - **REST endpoints** for the current snapshot and store status
//! - **Minimal HTML page** (`GET /`) with live counters and links
//!
//! # Architecture
//!
//! Every session shares one [`TargetStore`](radar_core::TargetStore).
//! Sessions advance and snapshot the store on their own clocks; the
//! store lets one session fetch from the source at a time while the rest
//! keep serving cached targets, so concurrent sessions never double-fetch. Server shutdown cancels the parent token every session
//! derives its cancellation from.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use error::ObserverError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, serve, start_server};
pub use state::{AppState, SessionGuard, StreamSettings};
