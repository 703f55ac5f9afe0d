//! Shared target store.
//!
//! One [`TargetStore`] is shared by every streaming session through an
//! `Arc`. It holds two independent locks:
//!
//! - the **fleet** lock guards the target map, the simulator (and its
//!   RNG) and the status counters. Every access is a short critical
//!   section with no `.await` inside.
//! - the **throttle** lock makes the due check and the timestamp update
//!   atomic. It is released before the source fetch. While a fetch is in
//!   flight, other sessions skip the refresh and keep serving the cached
//!   targets.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use radar_types::{SourceRecord, StoreStatus, Target};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::motion::{MotionSimulator, TickReport};
use crate::source::TargetSource;
use crate::throttle::ReloadThrottle;

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Targets created for ids seen for the first time.
    pub added: usize,
    /// Existing targets whose source fields were refreshed.
    pub updated: usize,
    /// Targets deleted because the snapshot no longer lists them.
    pub removed: usize,
    /// Records ignored (outside the region, empty id, or duplicate id).
    pub skipped: usize,
    /// Targets in the store after the pass.
    pub active: usize,
}

/// Result of [`TargetStore::refresh_if_due`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The throttle window had not elapsed, or another caller's fetch was
    /// in flight; nothing was fetched.
    Skipped,
    /// A snapshot was fetched and applied.
    Reconciled(ReconcileReport),
    /// The fetch failed; cached targets were kept.
    Failed(String),
}

struct Fleet {
    targets: BTreeMap<String, Target>,
    simulator: MotionSimulator,
    reconciliations: u64,
    last_reconciled_at: Option<DateTime<Utc>>,
    last_fetch_error: Option<String>,
}

/// Thread-safe map of simulated targets keyed by id.
pub struct TargetStore {
    fleet: Mutex<Fleet>,
    throttle: Mutex<ReloadThrottle>,
    refreshing: AtomicBool,
}

/// Clears the in-flight flag when the fetch finishes or is dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for TargetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetStore").finish_non_exhaustive()
    }
}

impl TargetStore {
    /// Create an empty store.
    pub fn new(simulator: MotionSimulator, min_reconcile_interval: Duration) -> Self {
        Self {
            fleet: Mutex::new(Fleet {
                targets: BTreeMap::new(),
                simulator,
                reconciliations: 0,
                last_reconciled_at: None,
                last_fetch_error: None,
            }),
            throttle: Mutex::new(ReloadThrottle::new(min_reconcile_interval)),
            refreshing: AtomicBool::new(false),
        }
    }

    /// Apply a full source snapshot.
    ///
    /// Records outside the containment region (or with an empty id) are
    /// skipped. Matched ids get their source fields refreshed, new ids are
    /// spawned by the simulator, and ids missing from the snapshot are
    /// removed. For duplicate ids the first occurrence wins.
    pub async fn reconcile(&self, records: &[SourceRecord]) -> ReconcileReport {
        let mut fleet = self.fleet.lock().await;
        let Fleet {
            targets,
            simulator,
            reconciliations,
            last_reconciled_at,
            last_fetch_error,
        } = &mut *fleet;

        let region = *simulator.region();
        let mut report = ReconcileReport::default();
        let mut seen: BTreeSet<&str> = BTreeSet::new();

        for record in records {
            if record.id.is_empty() || !region.contains(record.lat, record.lon) {
                debug!(id = %record.id, lat = record.lat, lon = record.lon, "Skipping record outside region");
                report.skipped = report.skipped.saturating_add(1);
                continue;
            }
            if !seen.insert(record.id.as_str()) {
                debug!(id = %record.id, "Skipping duplicate record");
                report.skipped = report.skipped.saturating_add(1);
                continue;
            }
            if let Some(target) = targets.get_mut(&record.id) {
                target.apply_source(record);
                report.updated = report.updated.saturating_add(1);
            } else {
                targets.insert(record.id.clone(), simulator.spawn(record));
                report.added = report.added.saturating_add(1);
            }
        }

        let before = targets.len();
        targets.retain(|id, _| seen.contains(id.as_str()));
        report.removed = before.saturating_sub(targets.len());
        report.active = targets.len();

        *reconciliations = reconciliations.saturating_add(1);
        *last_reconciled_at = Some(Utc::now());
        *last_fetch_error = None;

        info!(
            added = report.added,
            updated = report.updated,
            removed = report.removed,
            skipped = report.skipped,
            active = report.active,
            "Reconciled targets"
        );
        report
    }

    /// Point-in-time copy of every target, sorted by id.
    pub async fn snapshot(&self) -> Vec<Target> {
        self.fleet.lock().await.targets.values().cloned().collect()
    }

    /// Advance every target by `delta_seconds`.
    pub async fn tick(&self, delta_seconds: f64) -> TickReport {
        let mut fleet = self.fleet.lock().await;
        let Fleet {
            targets, simulator, ..
        } = &mut *fleet;
        simulator.tick(targets.values_mut(), delta_seconds)
    }

    /// Number of targets currently tracked.
    pub async fn len(&self) -> usize {
        self.fleet.lock().await.targets.len()
    }

    /// Whether the store tracks no targets.
    pub async fn is_empty(&self) -> bool {
        self.fleet.lock().await.targets.is_empty()
    }

    /// Fetch and reconcile if the throttle allows it.
    ///
    /// The due check, the timestamp update and claiming the in-flight flag
    /// happen under the throttle lock; the fetch itself runs without it.
    /// Callers arriving while a fetch is in flight get
    /// [`RefreshOutcome::Skipped`] at once. The timestamp is updated before
    /// fetching, so a failing source is retried no sooner than the minimum
    /// interval unless the store is empty.
    ///
    /// Dropping the returned future mid-fetch releases the in-flight flag.
    pub async fn refresh_if_due(&self, source: &dyn TargetSource) -> RefreshOutcome {
        let _in_flight = {
            let mut throttle = self.throttle.lock().await;
            if self.refreshing.load(Ordering::Acquire) {
                debug!("Refresh already in flight, serving cached targets");
                return RefreshOutcome::Skipped;
            }
            let now = Instant::now();
            if !throttle.is_due(now, self.is_empty().await) {
                return RefreshOutcome::Skipped;
            }
            throttle.mark(now);
            self.refreshing.store(true, Ordering::Release);
            InFlight(&self.refreshing)
        };

        match source.fetch_all().await {
            Ok(records) => RefreshOutcome::Reconciled(self.reconcile(&records).await),
            Err(err) => {
                let message = err.to_string();
                warn!(source = %source.describe(), error = %message, "Target fetch failed, keeping cached targets");
                self.fleet.lock().await.last_fetch_error = Some(message.clone());
                RefreshOutcome::Failed(message)
            }
        }
    }

    /// Current counters for the status endpoint.
    pub async fn status(&self) -> StoreStatus {
        let fleet = self.fleet.lock().await;
        StoreStatus {
            active_targets: fleet.targets.len(),
            reconciliations: fleet.reconciliations,
            last_reconciled_at: fleet.last_reconciled_at,
            last_fetch_error: fleet.last_fetch_error.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use std::sync::Arc;

    use radar_types::BehaviorProfile;

    use super::*;
    use crate::config::MotionConfig;
    use crate::containment::Region;
    use crate::random::SeededRandom;
    use crate::source::{SourceError, StaticTargetSource};

    fn record(id: &str, lat: f64, lon: f64) -> SourceRecord {
        SourceRecord {
            id: id.to_owned(),
            lat,
            lon,
            velocity: 250.0,
            baro_altitude: 30_000,
            geo_altitude: 30_200,
        }
    }

    fn store() -> TargetStore {
        let simulator = MotionSimulator::new(
            MotionConfig::default(),
            Region::default(),
            Box::new(SeededRandom::from_seed(11)),
        );
        TargetStore::new(simulator, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn reconcile_adds_in_region_records() {
        let store = store();
        let report = store
            .reconcile(&[record("A", 39.0, 35.0), record("B", 10.0, 10.0)])
            .await;

        assert_eq!(report.added, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.active, 1);
        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.first().unwrap().id, "A");
    }

    #[tokio::test]
    async fn reconcile_is_idempotent() {
        let store = store();
        let records = [record("A", 39.0, 35.0), record("B", 38.0, 30.0)];
        store.reconcile(&records).await;
        let first = store.snapshot().await;

        let report = store.reconcile(&records).await;
        assert_eq!(report.added, 0);
        assert_eq!(report.updated, 2);
        assert_eq!(report.removed, 0);
        assert_eq!(store.snapshot().await, first);
    }

    #[tokio::test]
    async fn reconcile_preserves_simulated_fields() {
        let store = store();
        store.reconcile(&[record("A", 39.0, 35.0)]).await;
        store.tick(1.0).await;
        let before = store.snapshot().await.into_iter().next().unwrap();

        let mut changed = record("A", 37.0, 28.0);
        changed.velocity = 400.0;
        changed.baro_altitude = 12_000;
        store.reconcile(&[changed]).await;
        let after = store.snapshot().await.into_iter().next().unwrap();

        assert_eq!(after.position, before.position);
        assert_eq!(after.heading, before.heading);
        assert_eq!(after.profile, before.profile);
        assert_eq!(after.velocity, 400.0);
        assert_eq!(after.baro_altitude, 12_000);
    }

    #[tokio::test]
    async fn reconcile_removes_missing_ids() {
        let store = store();
        store
            .reconcile(&[record("A", 39.0, 35.0), record("B", 38.0, 30.0)])
            .await;
        let b_before = store
            .snapshot()
            .await
            .into_iter()
            .find(|t| t.id == "B")
            .unwrap();

        let report = store.reconcile(&[record("B", 38.0, 30.0)]).await;
        assert_eq!(report.removed, 1);

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        let b_after = snapshot.first().unwrap();
        assert_eq!(b_after.id, "B");
        assert_eq!(b_after.heading, b_before.heading);
    }

    #[tokio::test]
    async fn record_leaving_region_drops_target() {
        let store = store();
        store.reconcile(&[record("A", 39.0, 35.0)]).await;
        let report = store.reconcile(&[record("A", 50.0, 35.0)]).await;
        assert_eq!(report.removed, 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn duplicate_ids_keep_first_occurrence() {
        let store = store();
        let mut second = record("A", 39.0, 35.0);
        second.velocity = 999.0;
        let report = store.reconcile(&[record("A", 39.0, 35.0), second]).await;

        assert_eq!(report.added, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(store.snapshot().await.first().unwrap().velocity, 250.0);
    }

    #[tokio::test]
    async fn snapshot_is_sorted_by_id() {
        let store = store();
        store
            .reconcile(&[
                record("C", 39.0, 35.0),
                record("A", 39.0, 35.0),
                record("B", 39.0, 35.0),
            ])
            .await;
        let ids: Vec<String> = store.snapshot().await.into_iter().map(|t| t.id).collect();
        assert_eq!(ids, ["A", "B", "C"]);
    }

    #[tokio::test]
    async fn aggressive_ratio_one_spawns_aggressive_targets() {
        let config = MotionConfig {
            aggressive_ratio: 1.0,
            ..MotionConfig::default()
        };
        let simulator = MotionSimulator::new(config, Region::default(), Box::new(SeededRandom::from_seed(3)));
        let store = TargetStore::new(simulator, Duration::from_secs(5));
        store.reconcile(&[record("A", 39.0, 35.0)]).await;
        assert_eq!(store.snapshot().await.first().unwrap().profile, BehaviorProfile::Aggressive);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_is_throttled() {
        let store = store();
        let source = StaticTargetSource::new(vec![record("A", 39.0, 35.0)]);

        assert!(matches!(store.refresh_if_due(&source).await, RefreshOutcome::Reconciled(_)));
        assert_eq!(store.refresh_if_due(&source).await, RefreshOutcome::Skipped);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(matches!(store.refresh_if_due(&source).await, RefreshOutcome::Reconciled(_)));
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetch_keeps_cached_targets() {
        let store = store();
        let source = StaticTargetSource::new(vec![record("A", 39.0, 35.0)]);
        store.refresh_if_due(&source).await;

        source.set_failure(Some(SourceError::Unavailable(String::from("connection refused"))));
        tokio::time::advance(Duration::from_secs(6)).await;
        let outcome = store.refresh_if_due(&source).await;

        assert!(matches!(outcome, RefreshOutcome::Failed(_)));
        assert_eq!(store.len().await, 1);
        let status = store.status().await;
        assert_eq!(status.reconciliations, 1);
        assert!(status.last_fetch_error.unwrap().contains("connection refused"));

        // The failed attempt still counts against the window.
        assert_eq!(store.refresh_if_due(&source).await, RefreshOutcome::Skipped);
    }

    #[tokio::test]
    async fn concurrent_refreshes_reconcile_once() {
        let store = Arc::new(store());
        let source = Arc::new(StaticTargetSource::new(vec![record("A", 39.0, 35.0)]));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let source = Arc::clone(&source);
                tokio::spawn(async move { store.refresh_if_due(source.as_ref()).await })
            })
            .collect();

        let mut reconciled = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), RefreshOutcome::Reconciled(_)) {
                reconciled += 1;
            }
        }
        assert_eq!(reconciled, 1);
        assert_eq!(source.fetch_count(), 1);
        assert_eq!(store.status().await.reconciliations, 1);
    }

    /// Source whose fetch never completes, signalling once it has started.
    struct StalledSource {
        started: Arc<tokio::sync::Notify>,
    }

    #[async_trait::async_trait]
    impl TargetSource for StalledSource {
        async fn fetch_all(&self) -> Result<Vec<SourceRecord>, SourceError> {
            self.started.notify_one();
            std::future::pending().await
        }

        fn describe(&self) -> String {
            String::from("stalled source")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_fetch_does_not_block_other_callers() {
        let store = Arc::new(store());
        store.reconcile(&[record("A", 39.0, 35.0)]).await;
        let started = Arc::new(tokio::sync::Notify::new());
        let stalled = Arc::new(StalledSource {
            started: Arc::clone(&started),
        });

        let pending = {
            let store = Arc::clone(&store);
            let stalled = Arc::clone(&stalled);
            tokio::spawn(async move { store.refresh_if_due(stalled.as_ref()).await })
        };
        started.notified().await;

        let other = StaticTargetSource::new(vec![record("B", 38.0, 30.0)]);
        assert_eq!(store.refresh_if_due(&other).await, RefreshOutcome::Skipped);
        assert_eq!(other.fetch_count(), 0);
        assert_eq!(store.len().await, 1);

        // Aborting the stalled call releases the in-flight flag.
        pending.abort();
        assert!(pending.await.unwrap_err().is_cancelled());
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(matches!(store.refresh_if_due(&other).await, RefreshOutcome::Reconciled(_)));
        assert_eq!(other.fetch_count(), 1);
    }

    #[tokio::test]
    async fn status_reflects_reconciliation() {
        let store = store();
        assert_eq!(store.status().await, StoreStatus::default());

        store.reconcile(&[record("A", 39.0, 35.0)]).await;
        let status = store.status().await;
        assert_eq!(status.active_targets, 1);
        assert_eq!(status.reconciliations, 1);
        assert!(status.last_reconciled_at.is_some());
    }
}
