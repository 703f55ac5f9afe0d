//! `Dragonfly` (Redis-compatible) target source.
//!
//! Target documents live in a single hash. Each field is an entity id and
//! each value is that entity's JSON document.
//!
//! # Key Patterns
//!
//! | Pattern | Type | Description |
//! |---------|------|-------------|
//! | `radar:targets` | Hash | field = entity id, value = JSON target document |
//!
//! Every fetch is one `HGETALL`. Documents are normalized with
//! [`SourceRecord::from_document`], using the hash field as the id when
//! the document carries none. Fields and values are read as raw bytes, so
//! a malformed document (bad JSON, invalid UTF-8, missing coordinates) is
//! skipped on its own; only a failed round trip fails the fetch.
//!
//! The client reconnects with exponential backoff after the server drops,
//! and every command carries a timeout, so an outage surfaces as a failed
//! fetch instead of a stalled one.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use fred::prelude::*;
use fred::types::Key;
use radar_core::config::SourceConfig;
use radar_core::{SourceError, TargetSource};
use radar_types::SourceRecord;
use tracing::{debug, info};

use crate::error::DbError;

/// Result of the startup connectivity probe.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport {
    /// Raw hash entries found under the targets key.
    pub documents: usize,
    /// Entries that normalized into usable records.
    pub usable: usize,
    /// First usable record in id order, if any.
    pub first: Option<SourceRecord>,
}

/// Target source backed by a `Dragonfly` hash.
#[derive(Clone)]
pub struct DragonflyTargetSource {
    client: Client,
    targets_key: String,
}

impl std::fmt::Debug for DragonflyTargetSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DragonflyTargetSource")
            .field("targets_key", &self.targets_key)
            .finish_non_exhaustive()
    }
}

impl DragonflyTargetSource {
    /// Connect to `Dragonfly` as described by `config`.
    ///
    /// `config.dragonfly_url` should follow the Redis URL scheme:
    /// `redis://host:port` or `redis://host:port/db`. The first connection
    /// must succeed; later drops are retried with exponential backoff.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the URL cannot be parsed or the
    /// targets key is empty.
    /// Returns [`DbError::Dragonfly`] if the connection fails.
    pub async fn connect(config: &SourceConfig) -> Result<Self, DbError> {
        if config.targets_key.is_empty() {
            return Err(DbError::Config(String::from("targets key must not be empty")));
        }
        let mut client_config = Config::from_url(&config.dragonfly_url)
            .map_err(|e| DbError::Config(format!("Invalid Dragonfly URL: {e}")))?;
        client_config.fail_fast = true;

        let command_timeout = Duration::from_millis(config.command_timeout_ms);
        let connect_timeout = Duration::from_millis(config.connect_timeout_ms);
        let policy = ReconnectPolicy::new_exponential(
            config.reconnect_max_attempts,
            config.reconnect_min_delay_ms,
            config.reconnect_max_delay_ms,
            2,
        );

        let client = Builder::from_config(client_config)
            .with_performance_config(|perf| {
                perf.default_command_timeout = command_timeout;
            })
            .with_connection_config(|conn| {
                conn.connection_timeout = connect_timeout;
                conn.internal_command_timeout = command_timeout;
            })
            .set_policy(policy)
            .build()?;
        client.init().await?;

        info!(
            targets_key = %config.targets_key,
            command_timeout_ms = config.command_timeout_ms,
            reconnect_max_attempts = config.reconnect_max_attempts,
            "Connected to Dragonfly"
        );
        Ok(Self {
            client,
            targets_key: config.targets_key.clone(),
        })
    }

    /// The hash key target documents are read from.
    pub fn targets_key(&self) -> &str {
        &self.targets_key
    }

    /// Read and normalize every document, sorted by id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the `HGETALL` fails or times out.
    pub async fn fetch_records(&self) -> Result<Vec<SourceRecord>, DbError> {
        Ok(decode_entries(self.fetch_raw().await?))
    }

    async fn fetch_raw(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>, DbError> {
        let entries: HashMap<Key, Vec<u8>> = self.client.hgetall(&self.targets_key).await?;
        Ok(entries
            .into_iter()
            .map(|(field, raw)| (field.as_bytes().to_vec(), raw))
            .collect())
    }

    /// Store one raw document under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] if the document cannot be
    /// encoded, or [`DbError::Dragonfly`] if the write fails.
    pub async fn put_document(&self, id: &str, document: &serde_json::Value) -> Result<(), DbError> {
        let json = serde_json::to_string(document)?;
        let _: i64 = self
            .client
            .hset(&self.targets_key, (id, json.as_str()))
            .await?;
        Ok(())
    }

    /// Store raw bytes under `id`, bypassing JSON encoding.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the write fails.
    pub async fn put_raw(&self, id: &str, bytes: Vec<u8>) -> Result<(), DbError> {
        let _: i64 = self.client.hset(&self.targets_key, (id, bytes)).await?;
        Ok(())
    }

    /// Remove the document stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the delete fails.
    pub async fn remove_document(&self, id: &str) -> Result<(), DbError> {
        let _: i64 = self.client.hdel(&self.targets_key, id).await?;
        Ok(())
    }

    /// Check that the source answers, and log what it holds.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the read fails.
    pub async fn probe(&self) -> Result<ProbeReport, DbError> {
        let entries = self.fetch_raw().await?;
        let documents = entries.len();
        let records = decode_entries(entries);
        let report = ProbeReport {
            documents,
            usable: records.len(),
            first: records.into_iter().next(),
        };

        match &report.first {
            Some(first) => info!(
                targets_key = %self.targets_key,
                documents = report.documents,
                usable = report.usable,
                first_id = %first.id,
                first_lat = first.lat,
                first_lon = first.lon,
                "Dragonfly probe succeeded"
            ),
            None => info!(
                targets_key = %self.targets_key,
                documents = report.documents,
                "Dragonfly probe succeeded, no usable target documents"
            ),
        }
        Ok(report)
    }
}

#[async_trait]
impl TargetSource for DragonflyTargetSource {
    async fn fetch_all(&self) -> Result<Vec<SourceRecord>, SourceError> {
        Ok(self.fetch_records().await?)
    }

    fn describe(&self) -> String {
        format!("dragonfly hash {}", self.targets_key)
    }
}

/// Normalize raw hash entries into records sorted by id.
///
/// Each entry is decoded on its own. Values that are not JSON (invalid
/// UTF-8 included) and documents that fail normalization are skipped.
pub fn decode_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Vec<SourceRecord>
where
    K: AsRef<[u8]>,
    V: AsRef<[u8]>,
{
    let mut records: Vec<SourceRecord> = entries
        .into_iter()
        .filter_map(|(field, raw)| decode_entry(field.as_ref(), raw.as_ref()))
        .collect();
    records.sort_by(|a, b| a.id.cmp(&b.id));
    records
}

fn decode_entry(field: &[u8], raw: &[u8]) -> Option<SourceRecord> {
    let label = String::from_utf8_lossy(field);
    let document: serde_json::Value = match serde_json::from_slice(raw) {
        Ok(doc) => doc,
        Err(e) => {
            debug!(field = %label, error = %e, "Skipping non-JSON target document");
            return None;
        }
    };
    // A non-UTF-8 field cannot serve as the fallback id.
    let fallback_id = std::str::from_utf8(field).ok();
    let record = SourceRecord::from_document(&document, fallback_id);
    if record.is_none() {
        debug!(field = %label, "Skipping malformed target document");
    }
    record
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    fn entries(pairs: &[(&str, &str)]) -> HashMap<Vec<u8>, Vec<u8>> {
        pairs
            .iter()
            .map(|(k, v)| (k.as_bytes().to_vec(), v.as_bytes().to_vec()))
            .collect()
    }

    #[test]
    fn decodes_and_sorts_by_id() {
        let records = decode_entries(entries(&[
            ("B", r#"{"_id":"B","lat":38.0,"lon":30.0,"velocity":150}"#),
            ("A", r#"{"_id":"A","lat":39.0,"lon":35.0,"velocity":220.5,"baroAltitude":31000}"#),
        ]));
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["A", "B"]);
        assert_eq!(records.first().map(|r| r.baro_altitude), Some(31_000));
    }

    #[test]
    fn hash_field_is_fallback_id() {
        let records = decode_entries(entries(&[("TK1907", r#"{"lat":39.0,"lon":35.0}"#)]));
        assert_eq!(records.len(), 1);
        assert_eq!(records.first().map(|r| r.id.as_str()), Some("TK1907"));
    }

    #[test]
    fn document_id_wins_over_field() {
        let records = decode_entries(entries(&[(
            "field",
            r#"{"_id":{"$oid":"65f0c0ffee"},"lat":39.0,"lon":35.0}"#,
        )]));
        assert_eq!(records.first().map(|r| r.id.as_str()), Some("65f0c0ffee"));
    }

    #[test]
    fn malformed_documents_are_skipped() {
        let records = decode_entries(entries(&[
            ("bad-json", "not json"),
            ("no-lat", r#"{"lon":35.0}"#),
            ("ok", r#"{"lat":39.0,"lon":35.0}"#),
        ]));
        assert_eq!(records.len(), 1);
        assert_eq!(records.first().map(|r| r.lat), Some(39.0));
    }

    #[test]
    fn invalid_utf8_entries_are_skipped_individually() {
        let mut raw = entries(&[("ok", r#"{"lat":39.0,"lon":35.0}"#)]);
        raw.insert(b"bad-value".to_vec(), vec![0x7b, 0xff, 0xfe, 0x7d]);
        // No document id and a non-UTF-8 field: nothing to name it by.
        raw.insert(vec![0xc3, 0x28], br#"{"lat":38.0,"lon":30.0}"#.to_vec());

        let records = decode_entries(raw);
        assert_eq!(records.len(), 1);
        assert_eq!(records.first().map(|r| r.id.as_str()), Some("ok"));
    }

    #[test]
    fn document_id_covers_non_utf8_field() {
        let raw = [(vec![0xff_u8], br#"{"_id":"TK1907","lat":39.0,"lon":35.0}"#.to_vec())];
        let records = decode_entries(raw);
        assert_eq!(records.first().map(|r| r.id.as_str()), Some("TK1907"));
    }
}
