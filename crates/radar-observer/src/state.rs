//! Shared application state for the streaming server.
//!
//! [`AppState`] ties together the pieces every request needs: the shared
//! [`TargetStore`], the [`TargetSource`] it refreshes from, the stream
//! defaults, and the server-wide shutdown token that every streaming
//! session derives its own cancellation from.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use radar_core::{Region, TargetSource, TargetStore};
use tokio_util::sync::CancellationToken;

/// Stream defaults reported by the status endpoint and used by sessions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamSettings {
    /// Interval used when the client does not ask for one.
    pub default_interval: Duration,
    /// Minimum spacing between source reconciliations.
    pub min_reconcile_interval: Duration,
    /// Containment region targets are held within.
    pub region: Region,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            default_interval: Duration::from_secs(1),
            min_reconcile_interval: Duration::from_secs(5),
            region: Region::default(),
        }
    }
}

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
pub struct AppState {
    /// The target store every session streams from.
    pub store: Arc<TargetStore>,
    /// Source the store is reconciled against.
    pub source: Arc<dyn TargetSource>,
    /// Stream defaults.
    pub settings: StreamSettings,
    /// Cancelled when the server shuts down; sessions use child tokens.
    pub shutdown: CancellationToken,
    /// When the server state was created.
    pub started_at: DateTime<Utc>,
    sessions: Arc<AtomicUsize>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("settings", &self.settings)
            .field("started_at", &self.started_at)
            .field("active_sessions", &self.active_sessions())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Create the application state.
    pub fn new(
        store: Arc<TargetStore>,
        source: Arc<dyn TargetSource>,
        settings: StreamSettings,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            source,
            settings,
            shutdown,
            started_at: Utc::now(),
            sessions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of streaming sessions currently running.
    pub fn active_sessions(&self) -> usize {
        self.sessions.load(Ordering::Relaxed)
    }

    /// Count a session as active until the returned guard drops.
    pub fn track_session(&self) -> SessionGuard {
        self.sessions.fetch_add(1, Ordering::Relaxed);
        SessionGuard {
            sessions: Arc::clone(&self.sessions),
        }
    }
}

/// Keeps a session counted in [`AppState::active_sessions`].
#[derive(Debug)]
pub struct SessionGuard {
    sessions: Arc<AtomicUsize>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.sessions.fetch_sub(1, Ordering::Relaxed);
    }
}
