//! REST endpoint handlers.
//!
//! Snapshot reads never tick the simulation; only streaming sessions
//! advance targets.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/targets` | Current targets as stream messages |
//! | `GET` | `/api/status` | Store counters, uptime, and stream settings |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::{Html, IntoResponse};
use chrono::Utc;
use radar_types::{StoreStatus, TrackMessage, display_id};
use serde::Serialize;

use crate::error::ObserverError;
use crate::state::AppState;

/// Body of `GET /api/status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Store counters.
    pub store: StoreStatus,
    /// Seconds since the server state was created.
    pub uptime_seconds: i64,
    /// Streaming sessions currently connected.
    pub active_sessions: usize,
    /// Description of the record source.
    pub source: String,
    /// Interval used when a client does not request one.
    pub default_refresh_interval_ms: u64,
    /// Minimum spacing between reconciliations.
    pub min_reconcile_interval_ms: u64,
    /// Containment region bounds.
    pub region: RegionSummary,
}

/// Containment bounds as reported by the status endpoint.
#[derive(Debug, Serialize)]
pub struct RegionSummary {
    /// Southern bound.
    pub min_lat: f64,
    /// Northern bound.
    pub max_lat: f64,
    /// Western bound.
    pub min_lon: f64,
    /// Eastern bound.
    pub max_lon: f64,
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page showing server status and API links.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = state.store.status().await;
    let targets = status.active_targets;
    let reconciliations = status.reconciliations;
    let sessions = state.active_sessions();
    let last_reconciled = status
        .last_reconciled_at
        .map_or_else(|| String::from("never"), |t| t.to_rfc3339());
    let source = state.source.describe();

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Radar Target Stream</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; margin-bottom: 0.25rem; }}
        .subtitle {{ color: #8b949e; margin-top: 0; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 120px;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #58a6ff; font-size: 1.5rem; font-weight: bold; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
        li::before {{ content: "GET "; color: #7ee787; font-weight: bold; }}
    </style>
</head>
<body>
    <h1>Radar Target Stream</h1>
    <p class="subtitle">Source: {source}</p>

    <div>
        <div class="metric">
            <div class="label">Targets</div>
            <div class="value">{targets}</div>
        </div>
        <div class="metric">
            <div class="label">Sessions</div>
            <div class="value">{sessions}</div>
        </div>
        <div class="metric">
            <div class="label">Reconciliations</div>
            <div class="value">{reconciliations}</div>
        </div>
    </div>
    <p>Last reconciled: {last_reconciled}</p>

    <h2>Endpoints</h2>
    <ul>
        <li><a href="/api/targets">/api/targets</a></li>
        <li><a href="/api/status">/api/status</a></li>
        <li>/ws/targets?refresh_interval_ms=1000 (WebSocket)</li>
    </ul>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// GET /api/targets -- current snapshot
// ---------------------------------------------------------------------------

/// Return the current id-sorted snapshot with display ids, without
/// advancing the simulation.
pub async fn list_targets(State(state): State<Arc<AppState>>) -> Json<Vec<TrackMessage>> {
    let snapshot = state.store.snapshot().await;
    let messages = (1_usize..)
        .zip(snapshot.iter())
        .map(|(rank, target)| TrackMessage::from_target(target, display_id(rank)))
        .collect();
    Json(messages)
}

// ---------------------------------------------------------------------------
// GET /api/status -- store and stream status
// ---------------------------------------------------------------------------

/// Report store counters, uptime, session count, and stream settings.
pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ObserverError> {
    let settings = state.settings;
    let response = StatusResponse {
        store: state.store.status().await,
        uptime_seconds: Utc::now()
            .signed_duration_since(state.started_at)
            .num_seconds(),
        active_sessions: state.active_sessions(),
        source: state.source.describe(),
        default_refresh_interval_ms: u64::try_from(settings.default_interval.as_millis())
            .unwrap_or(u64::MAX),
        min_reconcile_interval_ms: u64::try_from(settings.min_reconcile_interval.as_millis())
            .unwrap_or(u64::MAX),
        region: RegionSummary {
            min_lat: settings.region.min_lat,
            max_lat: settings.region.max_lat,
            min_lon: settings.region.min_lon,
            max_lon: settings.region.max_lon,
        },
    };
    Ok(Json(serde_json::to_value(&response)?))
}
