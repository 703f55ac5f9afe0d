//! Integration tests for the streaming server endpoints.
//!
//! Most tests use Axum's `Router` directly via `tower::ServiceExt`
//! without starting a TCP server. The lifecycle and `WebSocket` tests bind
//! an ephemeral port and talk to the real server.

#![allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::float_cmp)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use futures::{SinkExt, StreamExt};
use axum::http::{Request, StatusCode};
use radar_core::config::MotionConfig;
use radar_core::{MotionSimulator, Region, SeededRandom, StaticTargetSource, TargetStore};
use radar_observer::router::build_router;
use radar_observer::state::{AppState, StreamSettings};
use radar_types::SourceRecord;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

fn record(id: &str, lat: f64, lon: f64) -> SourceRecord {
    SourceRecord {
        id: id.to_owned(),
        lat,
        lon,
        velocity: 240.0,
        baro_altitude: 28_000,
        geo_altitude: 28_150,
    }
}

fn make_test_state(records: Vec<SourceRecord>) -> Arc<AppState> {
    let simulator = MotionSimulator::new(
        MotionConfig::default(),
        Region::default(),
        Box::new(SeededRandom::from_seed(99)),
    );
    let store = Arc::new(TargetStore::new(simulator, Duration::from_secs(5)));
    Arc::new(AppState::new(
        store,
        Arc::new(StaticTargetSource::new(records)),
        StreamSettings::default(),
        CancellationToken::new(),
    ))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_index_returns_html() {
    let app = build_router(make_test_state(Vec::new()));

    let response = app
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("Radar Target Stream"));
    assert!(html.contains("/ws/targets"));
}

#[tokio::test]
async fn test_targets_empty_before_first_reconcile() {
    let app = build_router(make_test_state(vec![record("A", 39.0, 35.0)]));

    let response = app
        .oneshot(Request::get("/api/targets").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_targets_lists_snapshot_with_display_ids() {
    let state = make_test_state(Vec::new());
    state
        .store
        .reconcile(&[
            record("B", 38.0, 30.0),
            record("A", 39.0, 35.0),
            record("OUT", 10.0, 10.0),
        ])
        .await;
    let app = build_router(Arc::clone(&state));

    let response = app
        .oneshot(Request::get("/api/targets").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    let targets = json.as_array().unwrap();
    assert_eq!(targets.len(), 2);
    assert_eq!(targets[0]["displayId"], "ID001");
    assert_eq!(targets[0]["lat"], 39.0);
    assert_eq!(targets[1]["displayId"], "ID002");
    assert_eq!(targets[1]["velocity"], 240);
}

#[tokio::test]
async fn test_snapshot_read_does_not_tick() {
    let state = make_test_state(Vec::new());
    state.store.reconcile(&[record("A", 39.0, 35.0)]).await;
    let app = build_router(Arc::clone(&state));

    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(Request::get("/api/targets").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_to_json(response.into_body()).await;
        assert_eq!(json[0]["lat"], 39.0);
        assert_eq!(json[0]["lon"], 35.0);
    }
}

#[tokio::test]
async fn test_status_reports_store_and_settings() {
    let state = make_test_state(Vec::new());
    state.store.reconcile(&[record("A", 39.0, 35.0)]).await;
    let app = build_router(state);

    let response = app
        .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["store"]["active_targets"], 1);
    assert_eq!(json["store"]["reconciliations"], 1);
    assert!(json["store"]["last_reconciled_at"].is_string());
    assert_eq!(json["active_sessions"], 0);
    assert_eq!(json["source"], "static in-memory source");
    assert_eq!(json["default_refresh_interval_ms"], 1000);
    assert_eq!(json["min_reconcile_interval_ms"], 5000);
    assert_eq!(json["region"]["min_lat"], 36.0);
    assert_eq!(json["region"]["max_lon"], 45.0);
}

#[tokio::test]
async fn test_ws_rejects_invalid_interval() {
    let app = build_router(make_test_state(Vec::new()));

    let response = app
        .oneshot(
            Request::get("/ws/targets?refresh_interval_ms=fast")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], 400);
}

#[tokio::test]
async fn test_ws_requires_upgrade() {
    let app = build_router(make_test_state(Vec::new()));

    let response = app
        .oneshot(
            Request::get("/ws/targets?refresh_interval_ms=500")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = build_router(make_test_state(Vec::new()));

    let response = app
        .oneshot(Request::get("/api/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_server_serves_and_shuts_down() {
    let state = make_test_state(Vec::new());
    let shutdown = CancellationToken::new();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(radar_observer::serve(listener, state, shutdown.clone()));

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /api/status HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let text = String::from_utf8_lossy(&raw);
    assert!(text.starts_with("HTTP/1.1 200"));

    shutdown.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}

/// Bind an ephemeral port and serve `state` until `shutdown` fires.
async fn spawn_server(
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> (
    std::net::SocketAddr,
    tokio::task::JoinHandle<Result<(), radar_observer::ServerError>>,
) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(radar_observer::serve(listener, state, shutdown));
    (addr, server)
}

/// Poll until no streaming session is registered.
async fn wait_for_no_sessions(state: &AppState) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while state.active_sessions() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_ws_streams_ticks_until_client_closes() {
    let state = make_test_state(vec![record("B", 38.0, 30.0), record("A", 39.0, 35.0)]);
    let shutdown = CancellationToken::new();
    let (addr, server) = spawn_server(Arc::clone(&state), shutdown.clone()).await;

    let url = format!("ws://{addr}/ws/targets?refresh_interval_ms=50");
    let (mut socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();

    let mut labels = Vec::new();
    while labels.len() < 2 {
        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let Message::Text(text) = frame {
            let json: Value = serde_json::from_str(text.as_str()).unwrap();
            labels.push((
                json["displayId"].as_str().unwrap().to_owned(),
                json["lat"].as_f64().unwrap(),
            ));
        }
    }
    // Id order: "A" (lat 39) ranks before "B" (lat 38).
    assert_eq!(labels[0].0, "ID001");
    assert!((labels[0].1 - 39.0).abs() < 0.1);
    assert_eq!(labels[1].0, "ID002");
    assert!((labels[1].1 - 38.0).abs() < 0.1);
    assert_eq!(state.active_sessions(), 1);

    socket.close(None).await.unwrap();
    wait_for_no_sessions(&state).await;

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_ws_dropped_client_ends_session() {
    let state = make_test_state(vec![record("A", 39.0, 35.0)]);
    let shutdown = CancellationToken::new();
    let (addr, _server) = spawn_server(Arc::clone(&state), shutdown.clone()).await;

    let url = format!("ws://{addr}/ws/targets?refresh_interval_ms=50");
    let (mut socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(state.active_sessions(), 1);

    drop(socket);
    wait_for_no_sessions(&state).await;
    shutdown.cancel();
}

#[tokio::test]
async fn test_shutdown_closes_open_streams() {
    let state = make_test_state(vec![record("A", 39.0, 35.0)]);
    let shutdown = CancellationToken::new();
    let (addr, server) = spawn_server(Arc::clone(&state), shutdown.clone()).await;

    let url = format!("ws://{addr}/ws/targets?refresh_interval_ms=50");
    let (mut socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    shutdown.cancel();

    // The server sends a close frame; the stream then ends.
    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(frame) = socket.next().await {
            match frame {
                Ok(Message::Close(_)) | Err(_) => return true,
                Ok(_) => {}
            }
        }
        true
    })
    .await
    .unwrap();
    assert!(closed);

    wait_for_no_sessions(&state).await;
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
