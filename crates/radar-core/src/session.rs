//! Streaming session controller.
//!
//! A [`StreamSession`] drives one client stream. Each tick it
//!
//! 1. stops if the cancellation token fired,
//! 2. refreshes the shared store when the throttle allows (a failed fetch
//!    keeps the cached targets; cancellation interrupts a slow fetch),
//! 3. advances every target by the session interval,
//! 4. snapshots the store and labels targets `ID001`, `ID002`, ... by rank,
//! 5. pushes one [`TrackMessage`] per target into the [`TargetSink`],
//! 6. sleeps for the interval, waking early on cancellation.
//!
//! The first sink error ends the session. Nothing in here is fatal to the
//! process; every way out is reported through [`SessionOutcome`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use radar_types::{SessionId, StreamRequest, TrackMessage, display_id};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::source::TargetSource;
use crate::store::{RefreshOutcome, TargetStore};

/// Errors reported by a [`TargetSink`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// The peer went away.
    #[error("sink closed")]
    Closed,

    /// The transport failed to deliver the message.
    #[error("sink transport error: {0}")]
    Transport(String),
}

/// Destination for the messages a session produces.
#[async_trait]
pub trait TargetSink: Send {
    /// Deliver one message.
    async fn emit(&mut self, message: TrackMessage) -> Result<(), SinkError>;
}

/// Why a session stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The cancellation token fired (client disconnect or shutdown).
    Cancelled,
    /// The sink rejected a message.
    SinkClosed(SinkError),
    /// The configured tick limit was reached.
    Completed,
}

/// Totals reported when a session ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    /// Session identifier used in logs.
    pub session_id: SessionId,
    /// Ticks fully or partially emitted.
    pub ticks: u64,
    /// Messages accepted by the sink.
    pub messages: u64,
    /// Why the session stopped.
    pub outcome: SessionOutcome,
}

/// Pick the session interval: the caller's value if positive, else
/// `default`.
pub fn resolve_interval(request: &StreamRequest, default: Duration) -> Duration {
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(request.resolve_interval_ms(default_ms))
}

/// One client stream over the shared store.
pub struct StreamSession {
    session_id: SessionId,
    store: Arc<TargetStore>,
    source: Arc<dyn TargetSource>,
    interval: Duration,
    cancel: CancellationToken,
    max_ticks: Option<u64>,
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("session_id", &self.session_id)
            .field("interval", &self.interval)
            .field("max_ticks", &self.max_ticks)
            .finish_non_exhaustive()
    }
}

impl StreamSession {
    /// Create an unbounded session.
    pub fn new(
        store: Arc<TargetStore>,
        source: Arc<dyn TargetSource>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            session_id: SessionId::new(),
            store,
            source,
            interval,
            cancel,
            max_ticks: None,
        }
    }

    /// Stop after `max_ticks` ticks.
    #[must_use]
    pub const fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = Some(max_ticks);
        self
    }

    /// This session's identifier.
    pub const fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Pacing interval between ticks.
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Run the session loop until cancellation, sink failure, or the tick
    /// limit.
    pub async fn run(self, sink: &mut dyn TargetSink) -> SessionSummary {
        let session_id = self.session_id;
        let delta_seconds = self.interval.as_secs_f64();
        let mut ticks: u64 = 0;
        let mut messages: u64 = 0;

        info!(
            %session_id,
            interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
            source = %self.source.describe(),
            "Stream session started"
        );

        let outcome = 'session: loop {
            if self.cancel.is_cancelled() {
                break SessionOutcome::Cancelled;
            }

            let refreshed = tokio::select! {
                () = self.cancel.cancelled() => break SessionOutcome::Cancelled,
                outcome = self.store.refresh_if_due(self.source.as_ref()) => outcome,
            };
            if let RefreshOutcome::Failed(error) = refreshed {
                debug!(%session_id, %error, "Serving cached targets");
            }

            self.store.tick(delta_seconds).await;
            let snapshot = self.store.snapshot().await;
            ticks = ticks.saturating_add(1);

            for (rank, target) in (1_usize..).zip(snapshot.iter()) {
                let message = TrackMessage::from_target(target, display_id(rank));
                debug!(%session_id, display_id = %message.display_id, id = %target.id, "Emitting target");
                if let Err(err) = sink.emit(message).await {
                    debug!(%session_id, error = %err, "Sink rejected message");
                    break 'session SessionOutcome::SinkClosed(err);
                }
                messages = messages.saturating_add(1);
            }

            if self.max_ticks.is_some_and(|max| ticks >= max) {
                break SessionOutcome::Completed;
            }

            tokio::select! {
                () = self.cancel.cancelled() => break SessionOutcome::Cancelled,
                () = tokio::time::sleep(self.interval) => {}
            }
        };

        info!(%session_id, ticks, messages, outcome = ?outcome, "Stream session ended");

        SessionSummary {
            session_id,
            ticks,
            messages,
            outcome,
        }
    }
}
