//! `WebSocket` handler for per-client target streaming.
//!
//! Clients connect to `GET /ws/targets?refresh_interval_ms=N` and receive
//! one JSON-encoded [`TrackMessage`] text frame per target per tick. Each
//! connection runs its own [`StreamSession`] at its own interval over the
//! shared store.
//!
//! The socket is split: the session writes through a [`WsSink`], while a
//! reader task watches for a close frame or disconnect and cancels the
//! session. Server shutdown cancels every session through the parent
//! token.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::rejection::QueryRejection;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use radar_core::{SinkError, StreamSession, TargetSink, resolve_interval};
use radar_types::{StreamRequest, TrackMessage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::ObserverError;
use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming targets.
///
/// # Route
///
/// `GET /ws/targets`
pub async fn ws_targets(
    query: Result<Query<StreamRequest>, QueryRejection>,
    State(state): State<Arc<AppState>>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ObserverError> {
    // Query errors are reported before upgrade errors.
    let Query(request) = query.map_err(|e| ObserverError::InvalidQuery(e.body_text()))?;
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };
    Ok(ws
        .on_upgrade(move |socket| handle_ws(socket, state, request))
        .into_response())
}

/// [`TargetSink`] writing JSON text frames to the socket.
pub struct WsSink {
    sender: SplitSink<WebSocket, Message>,
}

impl WsSink {
    /// Wrap the write half of a socket.
    pub const fn new(sender: SplitSink<WebSocket, Message>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl TargetSink for WsSink {
    async fn emit(&mut self, message: TrackMessage) -> Result<(), SinkError> {
        let json =
            serde_json::to_string(&message).map_err(|e| SinkError::Transport(e.to_string()))?;
        self.sender
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))
    }
}

/// Run one session for the lifetime of the connection.
async fn handle_ws(socket: WebSocket, state: Arc<AppState>, request: StreamRequest) {
    let _guard = state.track_session();
    let interval = resolve_interval(&request, state.settings.default_interval);
    let cancel = state.shutdown.child_token();

    let (sender, receiver) = socket.split();
    let reader = tokio::spawn(watch_peer(receiver, cancel.clone()));

    let session = StreamSession::new(
        Arc::clone(&state.store),
        Arc::clone(&state.source),
        interval,
        cancel.clone(),
    );
    let session_id = session.session_id();
    debug!(%session_id, active = state.active_sessions(), "WebSocket client connected");

    let mut sink = WsSink::new(sender);
    let summary = session.run(&mut sink).await;

    cancel.cancel();
    reader.abort();
    // Best effort; the peer may already be gone.
    let _ = sink.sender.send(Message::Close(None)).await;

    info!(
        %session_id,
        ticks = summary.ticks,
        messages = summary.messages,
        outcome = ?summary.outcome,
        "WebSocket session closed"
    );
}

/// Cancel the session when the client closes or the socket errors.
///
/// Client text and binary frames are ignored.
async fn watch_peer(mut receiver: SplitStream<WebSocket>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => return,
            msg = receiver.next() => match msg {
                Some(Ok(Message::Close(_))) | None => {
                    debug!("WebSocket client disconnected");
                    cancel.cancel();
                    return;
                }
                Some(Err(e)) => {
                    debug!("WebSocket error: {e}");
                    cancel.cancel();
                    return;
                }
                Some(Ok(_)) => {}
            },
        }
    }
}
