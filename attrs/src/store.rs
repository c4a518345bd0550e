//! Reference table store
//!
//! Holds one decoded [`AttributeTable`] per [`TableKey`]. Tables are
//! inserted whole and never mutated in place; a refresh swaps the `Arc`.
//! The store also carries the loading observables handed to the
//! presentation layer (`is_loading`, `last_error`).

// RwLock poisoning is exceptional (requires panic in critical section) - allow expect for internal locks
#![allow(clippy::expect_used)]

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::Deserialize;

use crate::decoder;
use crate::errors::{AttrsError, Result};
use crate::model::{AttributeTable, NumberRange, TableKey};

// ─────────────────────────────────────────────────────────────────────────────
// Transport seam
// ─────────────────────────────────────────────────────────────────────────────

/// Encoded reference payload as served by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EncodedPayload {
    /// Obfuscated digit string
    pub checkstr: String,
    /// Epoch seconds the payload was shifted with
    #[serde(deserialize_with = "crate::model::lenient_i64")]
    pub timestamp: i64,
}

/// Source of encoded reference tables.
///
/// Implementations:
/// - `HttpPayloadFetcher` - reqwest against the attribute endpoint
/// - `MockPayloadFetcher` (tests) - in-memory payloads with call counting
#[async_trait]
pub trait PayloadFetcher: Send + Sync {
    /// Fetch the encoded table for one key.
    ///
    /// Any transport failure is reported as `AttrsError::Fetch`.
    async fn fetch(&self, key: TableKey) -> Result<EncodedPayload>;
}

/// Fetch, decode and parse one reference table.
pub async fn load_table(fetcher: &dyn PayloadFetcher, key: TableKey) -> Result<AttributeTable> {
    let payload = fetcher.fetch(key).await?;
    let text = decoder::decode(&payload.checkstr, payload.timestamp)?;
    AttributeTable::from_json(&text)
}

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

/// Per-(year, range) reference tables plus loading state.
#[derive(Debug, Default)]
pub struct ReferenceStore {
    tables: RwLock<HashMap<TableKey, Arc<AttributeTable>>>,
    empty: Arc<AttributeTable>,
    in_flight: AtomicUsize,
    last_error: RwLock<Option<AttrsError>>,
}

impl ReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: TableKey) -> bool {
        self.tables.read().expect("lock").contains_key(&key)
    }

    /// Keys from `keys` that are not stored yet, in the given order, each once.
    pub fn missing_keys(&self, keys: &[TableKey]) -> Vec<TableKey> {
        let tables = self.tables.read().expect("lock");
        let mut missing: Vec<TableKey> = Vec::with_capacity(keys.len());
        for key in keys {
            if !tables.contains_key(key) && !missing.contains(key) {
                missing.push(*key);
            }
        }
        missing
    }

    /// The table for `(range, year)`, or an empty table when absent.
    pub fn table(&self, range: NumberRange, year: i32) -> Arc<AttributeTable> {
        self.tables
            .read()
            .expect("lock")
            .get(&TableKey::new(year, range))
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.empty))
    }

    /// Store a batch of freshly loaded tables under one write lock.
    ///
    /// Keys stored concurrently by another load are left alone. Returns how
    /// many tables were inserted.
    pub fn insert_batch(&self, batch: Vec<(TableKey, AttributeTable)>) -> usize {
        let mut tables = self.tables.write().expect("lock");
        let mut inserted = 0;
        for (key, table) in batch {
            if let std::collections::hash_map::Entry::Vacant(slot) = tables.entry(key) {
                slot.insert(Arc::new(table));
                inserted += 1;
            }
        }
        inserted
    }

    /// Atomically replace (or add) the table for `key`.
    pub fn replace(&self, key: TableKey, table: AttributeTable) {
        self.tables
            .write()
            .expect("lock")
            .insert(key, Arc::new(table));
    }

    /// Stored keys, sorted
    pub fn loaded_keys(&self) -> Vec<TableKey> {
        let mut keys: Vec<TableKey> = self.tables.read().expect("lock").keys().copied().collect();
        keys.sort();
        keys
    }

    /// Years with at least one stored table
    pub fn loaded_years(&self) -> BTreeSet<i32> {
        self.tables
            .read()
            .expect("lock")
            .keys()
            .map(|key| key.year)
            .collect()
    }

    /// Whether any load is currently in flight
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Error of the most recent failed load, cleared when a new load starts
    pub fn last_error(&self) -> Option<AttrsError> {
        self.last_error.read().expect("lock").clone()
    }

    pub(crate) fn record_error(&self, err: AttrsError) {
        *self.last_error.write().expect("lock") = Some(err);
    }

    pub(crate) fn clear_error(&self) {
        *self.last_error.write().expect("lock") = None;
    }

    /// Mark a load as started; the returned guard marks it finished on drop.
    ///
    /// Leaves `last_error` alone: concurrent loads of one request share it.
    pub(crate) fn begin_load(&self) -> LoadGuard<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        LoadGuard { store: self }
    }
}

/// Keeps `is_loading` raised for the lifetime of one load.
pub(crate) struct LoadGuard<'a> {
    store: &'a ReferenceStore,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        self.store.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock implementation for tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(any(test, feature = "test-utils"))]
#[allow(clippy::unwrap_used)] // Mock code: panicking on poisoned lock is acceptable in tests
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Serves pre-encoded payloads from memory and records every fetch.
    #[derive(Debug, Default)]
    pub struct MockPayloadFetcher {
        payloads: Mutex<HashMap<TableKey, EncodedPayload>>,
        failures: Mutex<HashMap<TableKey, String>>,
        calls: Mutex<Vec<TableKey>>,
    }

    impl MockPayloadFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        /// Serve `json` for `key`, encoded with `timestamp`.
        pub fn add_json(&self, key: TableKey, json: &str, timestamp: i64) {
            let checkstr = decoder::encode(json, timestamp).unwrap();
            self.add_payload(key, EncodedPayload { checkstr, timestamp });
        }

        pub fn add_payload(&self, key: TableKey, payload: EncodedPayload) {
            self.payloads.lock().unwrap().insert(key, payload);
        }

        /// Make every fetch of `key` fail with `message`.
        pub fn fail(&self, key: TableKey, message: impl Into<String>) {
            self.failures.lock().unwrap().insert(key, message.into());
        }

        /// Keys fetched so far, in call order
        pub fn calls(&self) -> Vec<TableKey> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl PayloadFetcher for MockPayloadFetcher {
        async fn fetch(&self, key: TableKey) -> Result<EncodedPayload> {
            self.calls.lock().unwrap().push(key);
            if let Some(message) = self.failures.lock().unwrap().get(&key) {
                return Err(AttrsError::fetch(message.clone()));
            }
            // Unknown keys serve an empty document.
            let payload = self.payloads.lock().unwrap().get(&key).cloned();
            match payload {
                Some(payload) => Ok(payload),
                None => Ok(EncodedPayload {
                    checkstr: decoder::encode("{}", 1_700_000_000).unwrap(),
                    timestamp: 1_700_000_000,
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockPayloadFetcher;
    use super::*;
    use crate::model::{AttributeEntry, Category};
    use pretty_assertions::assert_eq;

    fn color_table(members: &str) -> AttributeTable {
        let mut table = AttributeTable::new();
        table.insert(Category::Color, AttributeEntry::new(Category::Color, "红", members));
        table
    }

    #[test]
    fn test_absent_table_is_empty() {
        let store = ReferenceStore::new();
        assert!(store.table(NumberRange::R49, 2024).is_empty());
        assert!(store.loaded_years().is_empty());
    }

    #[test]
    fn test_insert_batch_skips_present_keys() {
        let store = ReferenceStore::new();
        let key = TableKey::new(2024, NumberRange::R49);
        assert_eq!(store.insert_batch(vec![(key, color_table("01"))]), 1);
        assert_eq!(store.insert_batch(vec![(key, color_table("02"))]), 0);

        let table = store.table(NumberRange::R49, 2024);
        let entry = table.bucket(Category::Color.type_code()).unwrap().get("红").unwrap();
        assert_eq!(entry.members, vec!["01"]);
    }

    #[test]
    fn test_replace_swaps_table() {
        let store = ReferenceStore::new();
        let key = TableKey::new(2024, NumberRange::R49);
        store.replace(key, color_table("01"));
        let before = store.table(NumberRange::R49, 2024);
        store.replace(key, color_table("02"));

        let after = store.table(NumberRange::R49, 2024);
        assert_ne!(before, after);
        // Readers holding the old Arc keep a consistent table.
        assert!(before.bucket(Category::Color.type_code()).unwrap().get("红").unwrap().contains("01"));
    }

    #[test]
    fn test_missing_keys_and_loaded_years() {
        let store = ReferenceStore::new();
        store.replace(TableKey::new(2023, NumberRange::R49), AttributeTable::new());
        let missing = store.missing_keys(&TableKey::window_for_year(2024));
        assert_eq!(missing.len(), 3);
        assert!(!missing.contains(&TableKey::new(2023, NumberRange::R49)));
        assert_eq!(store.loaded_years().into_iter().collect::<Vec<_>>(), vec![2023]);
        assert_eq!(store.loaded_keys(), vec![TableKey::new(2023, NumberRange::R49)]);
        assert_eq!(store.missing_keys(&TableKey::window_for_year(i32::MIN)).len(), 2);
    }

    #[test]
    fn test_load_guard_tracks_in_flight() {
        let store = ReferenceStore::new();
        store.record_error(AttrsError::fetch("boom"));
        {
            let _outer = store.begin_load();
            let _inner = store.begin_load();
            assert!(store.is_loading());
            // A load in flight must not hide an error recorded by a sibling load.
            assert!(store.last_error().is_some());
        }
        assert!(!store.is_loading());
        store.clear_error();
        assert!(store.last_error().is_none());
    }

    #[tokio::test]
    async fn test_load_table_decodes_payload() {
        let fetcher = MockPayloadFetcher::new();
        let key = TableKey::new(2024, NumberRange::R49);
        fetcher.add_json(
            key,
            r#"{"3":{"红":{"type":"波色","name":"红","content1":"01,07"}}}"#,
            1_718_000_000,
        );

        let table = load_table(&fetcher, key).await.unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(fetcher.calls(), vec![key]);
    }

    #[tokio::test]
    async fn test_load_table_reports_decode_failure() {
        let fetcher = MockPayloadFetcher::new();
        let key = TableKey::new(2024, NumberRange::R49);
        fetcher.add_payload(
            key,
            EncodedPayload {
                checkstr: "1718065".to_string(),
                timestamp: 42,
            },
        );

        let err = load_table(&fetcher, key).await.unwrap_err();
        assert_eq!(err.category(), crate::errors::ErrorCategory::DecodeError);
    }
}
