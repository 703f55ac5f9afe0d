//! Radar target stream service binary.
//!
//! Wires the record source, target store and streaming server together
//! and serves until Ctrl-C.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `RADAR_CONFIG` (default `radar-config.yaml`)
//! 2. Initialize structured logging (tracing)
//! 3. Connect and probe the target source
//! 4. Build the motion simulator and target store
//! 5. Warm the store with a first reconciliation
//! 6. Serve HTTP + `WebSocket` until Ctrl-C cancels the shutdown token

mod error;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use radar_core::config::{LoggingConfig, SourceConfig};
use radar_core::{
    MotionSimulator, RadarConfig, RefreshOutcome, SeededRandom, SourceKind, StaticTargetSource,
    TargetSource, TargetStore,
};
use radar_db::DragonflyTargetSource;
use radar_observer::{AppState, ServerConfig, StreamSettings};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::ServiceError;

/// Config file used when `RADAR_CONFIG` is not set.
const DEFAULT_CONFIG_PATH: &str = "radar-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, source setup, or the server fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration. Logging depends on it, so it comes first.
    let config_path = config_path();
    let config = load_config(&config_path)?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!("radar-service starting");
    info!(
        path = %config_path.display(),
        host = %config.server.host,
        port = config.server.port,
        source = ?config.source.kind,
        default_refresh_interval_ms = config.stream.default_refresh_interval_ms,
        min_reconcile_interval_ms = config.stream.min_reconcile_interval_ms,
        "Configuration loaded"
    );

    // 3. Connect the target source.
    let source = build_source(&config.source).await?;

    // 4. Build the simulator and store.
    let rng = SeededRandom::from_optional_seed(config.motion.seed);
    let simulator = MotionSimulator::new(config.motion.clone(), config.region, Box::new(rng));
    let min_reconcile_interval = Duration::from_millis(config.stream.min_reconcile_interval_ms);
    let store = Arc::new(TargetStore::new(simulator, min_reconcile_interval));
    info!(
        seeded = config.motion.seed.is_some(),
        aggressive_ratio = config.motion.aggressive_ratio,
        "Target store initialized"
    );

    // 5. Warm the store so REST reads have data before the first session.
    match store.refresh_if_due(source.as_ref()).await {
        RefreshOutcome::Reconciled(report) => {
            info!(active = report.active, "Initial reconciliation complete");
        }
        RefreshOutcome::Failed(error) => {
            warn!(%error, "Initial reconciliation failed, sessions will retry");
        }
        RefreshOutcome::Skipped => {}
    }

    // 6. Serve until Ctrl-C.
    let shutdown = CancellationToken::new();
    spawn_ctrl_c_handler(shutdown.clone());

    let settings = StreamSettings {
        default_interval: Duration::from_millis(config.stream.default_refresh_interval_ms),
        min_reconcile_interval,
        region: config.region,
    };
    let state = Arc::new(AppState::new(store, source, settings, shutdown.clone()));
    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };

    radar_observer::start_server(&server_config, state, shutdown)
        .await
        .map_err(ServiceError::from)?;

    info!("radar-service shutdown complete");
    Ok(())
}

/// Resolve the config file path from `RADAR_CONFIG`.
fn config_path() -> PathBuf {
    std::env::var_os("RADAR_CONFIG").map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

/// Load configuration, falling back to defaults when the file is absent.
fn load_config(path: &Path) -> Result<RadarConfig, ServiceError> {
    if path.exists() {
        return Ok(RadarConfig::from_file(path)?);
    }
    let mut config = RadarConfig::default();
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins; otherwise `logging.level` from the config applies.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Build the configured target source.
///
/// A Dragonfly source that connects but fails its probe is still used;
/// sessions keep retrying on their own schedule.
async fn build_source(config: &SourceConfig) -> Result<Arc<dyn TargetSource>, ServiceError> {
    match config.kind {
        SourceKind::Dragonfly => {
            info!(
                url = %config.dragonfly_url,
                targets_key = %config.targets_key,
                "Connecting to Dragonfly"
            );
            let source = DragonflyTargetSource::connect(config).await?;
            if let Err(e) = source.probe().await {
                warn!(error = %e, "Dragonfly probe failed");
            }
            Ok(Arc::new(source))
        }
        SourceKind::Static => {
            let source = StaticTargetSource::from_documents(&config.static_records);
            info!(
                documents = config.static_records.len(),
                "Using static target source"
            );
            Ok(Arc::new(source))
        }
    }
}

/// Cancel `shutdown` on Ctrl-C.
fn spawn_ctrl_c_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            return;
        }
        info!("Ctrl-C received, shutting down");
        shutdown.cancel();
    });
}
