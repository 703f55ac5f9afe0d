//! Target source trait and the in-memory implementation.
//!
//! The store pulls fresh snapshots through [`TargetSource`]. The trait
//! abstracts the backing store: the Dragonfly adapter in `radar-db` in
//! production, or [`StaticTargetSource`] in tests and offline mode.

use std::sync::Mutex;

use async_trait::async_trait;
use radar_types::SourceRecord;

/// Errors a target source can report for one fetch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The backing store could not be reached.
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// The query itself failed.
    #[error("source query failed: {0}")]
    Query(String),

    /// The response could not be decoded at all.
    #[error("source decode failed: {0}")]
    Decode(String),
}

/// A provider of complete target snapshots.
///
/// Implementations return every record currently known; ordering is not
/// required. Individual malformed documents are dropped by the
/// implementation, never reported as a fetch error.
#[async_trait]
pub trait TargetSource: Send + Sync {
    /// Fetch the full current snapshot.
    async fn fetch_all(&self) -> Result<Vec<SourceRecord>, SourceError>;

    /// Short human-readable description for logs.
    fn describe(&self) -> String;
}

/// In-memory [`TargetSource`] with a swappable snapshot.
///
/// A forced failure can be armed to exercise the degraded path.
#[derive(Debug, Default)]
pub struct StaticTargetSource {
    inner: Mutex<StaticInner>,
}

#[derive(Debug, Default)]
struct StaticInner {
    records: Vec<SourceRecord>,
    failure: Option<SourceError>,
    fetches: u64,
}

impl StaticTargetSource {
    /// Create a source serving the given records.
    pub fn new(records: Vec<SourceRecord>) -> Self {
        Self {
            inner: Mutex::new(StaticInner {
                records,
                failure: None,
                fetches: 0,
            }),
        }
    }

    /// Build a source from raw documents, dropping any that fail
    /// normalization.
    pub fn from_documents(documents: &[serde_json::Value]) -> Self {
        let records = documents
            .iter()
            .filter_map(|doc| SourceRecord::from_document(doc, None))
            .collect();
        Self::new(records)
    }

    /// Replace the served snapshot.
    pub fn set_records(&self, records: Vec<SourceRecord>) {
        self.with_inner(|inner| inner.records = records);
    }

    /// Make every subsequent fetch fail with `error` (or succeed again
    /// with `None`).
    pub fn set_failure(&self, error: Option<SourceError>) {
        self.with_inner(|inner| inner.failure = error);
    }

    /// Number of fetches served so far, including failed ones.
    pub fn fetch_count(&self) -> u64 {
        self.with_inner(|inner| inner.fetches)
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut StaticInner) -> R) -> R {
        // Poisoning is ignored: the guarded data is plain values.
        let mut guard = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut guard)
    }
}

#[async_trait]
impl TargetSource for StaticTargetSource {
    async fn fetch_all(&self) -> Result<Vec<SourceRecord>, SourceError> {
        self.with_inner(|inner| {
            inner.fetches = inner.fetches.saturating_add(1);
            inner
                .failure
                .clone()
                .map_or_else(|| Ok(inner.records.clone()), Err)
        })
    }

    fn describe(&self) -> String {
        String::from("static in-memory source")
    }
}
