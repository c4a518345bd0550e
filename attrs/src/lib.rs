//! Attribute classification and caching engine for lottery draw numbers
//!
//! Maps a drawn number (plus its number range and year) to categorical
//! attributes: color, zodiac, element, parity, size, door/segment bands,
//! color-parity and digit-sum bands. Table-driven categories come from
//! yearly reference tables fetched as obfuscated payloads; numeric ones are
//! closed-form.
//!
//! The crate:
//! - Decodes transport payloads into per-(year, range) reference tables
//! - Keeps the tables in an owned store and memoizes queries over them
//! - Routes caller-supplied category tags to the right classifier
//! - Does NOT render anything; chart and table layers consume the strings

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod cache;
pub mod classify;
pub mod config;
pub mod decoder;
pub mod dispatch;
pub mod errors;
pub mod http;
pub mod labels;
pub mod model;
pub mod number;
pub mod store;

pub use cache::{CacheStats, ListKey, ListKind, QueryCache, QueryKey, QueryTag};
pub use classify::{
    DEFAULT_COLOR, DEFAULT_COLOR_PARITY, DEFAULT_DOOR, DEFAULT_ELEMENT, DEFAULT_SEGMENT,
    DEFAULT_SUM_PARITY, DEFAULT_SUM_VALUE, DEFAULT_ZODIAC, current_year, ones_digit, parity,
    size_by_number, tens_digit,
};
pub use config::AttrsConfig;
pub use decoder::{DecodeError, decode, encode};
pub use dispatch::{CategoryTag, UNKNOWN};
pub use errors::{AttrsError, ErrorCategory, Result};
pub use http::HttpPayloadFetcher;
pub use labels::{LotteryKind, axis_labels, color_class, color_name, lunar_year, title};
pub use model::{AttributeEntry, AttributeTable, Category, CategoryBucket, NumberRange, TableKey, TypeCode};
pub use number::{pad_zero, pad_zero_period, parse_number};
pub use store::{EncodedPayload, PayloadFetcher, ReferenceStore, load_table};

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures::future::join_all;
use tokio::task::JoinSet;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Main entry point for attribute queries.
///
/// Owns the reference store, the query cache and the payload fetcher.
/// Cloning is cheap and every clone shares the same state, so one engine
/// can be handed to every query site of a session.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    store: ReferenceStore,
    cache: QueryCache,
    fetcher: Arc<dyn PayloadFetcher>,
    preload_years: Vec<i32>,
}

impl Engine {
    /// Create an engine from the config file, fetching over HTTP
    pub fn new() -> Result<Self> {
        let cfg = AttrsConfig::load()?;
        Self::from_config(&cfg)
    }

    /// Create an engine from an explicit config, fetching over HTTP
    pub fn from_config(cfg: &AttrsConfig) -> Result<Self> {
        let fetcher = HttpPayloadFetcher::from_config(cfg)?;

        tracing::info!(
            version = VERSION,
            endpoint = %fetcher.endpoint(),
            preload_years = ?cfg.preload_years,
            "attribute engine initialized"
        );

        Ok(Self::build(Arc::new(fetcher), cfg.preload_years.clone()))
    }

    /// Create an engine around any fetcher (tests, alternative transports)
    pub fn with_fetcher(fetcher: Arc<dyn PayloadFetcher>) -> Self {
        Self::build(fetcher, Vec::new())
    }

    fn build(fetcher: Arc<dyn PayloadFetcher>, preload_years: Vec<i32>) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                store: ReferenceStore::new(),
                cache: QueryCache::new(),
                fetcher,
                preload_years,
            }),
        }
    }

    pub fn store(&self) -> &ReferenceStore {
        &self.inner.store
    }

    pub fn cache(&self) -> &QueryCache {
        &self.inner.cache
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Loading
    // ─────────────────────────────────────────────────────────────────────────────

    /// Load the configured preload years
    pub async fn initialize(&self) -> bool {
        let years = self.inner.preload_years.clone();
        self.ensure_years_loaded(years).await
    }

    /// Make sure the four tables `year` depends on are stored.
    ///
    /// Missing keys are fetched concurrently. Returns `true` when nothing was
    /// missing or every missing table loaded; on failure the first error is
    /// recorded as `last_error` and nothing from this batch is stored.
    pub async fn ensure_year_loaded(&self, year: i32) -> bool {
        let store = &self.inner.store;
        if !self.needs_fetch(year) {
            return true;
        }

        store.clear_error();
        match self.load_year(year).await {
            Ok(()) => true,
            Err(err) => {
                store.record_error(err);
                false
            }
        }
    }

    /// Load several years concurrently; `true` iff every year loaded.
    ///
    /// When several years fail, `last_error` holds the error of the earliest
    /// failing year, independent of task completion order.
    pub async fn ensure_years_loaded(&self, years: impl IntoIterator<Item = i32>) -> bool {
        let years: BTreeSet<i32> = years.into_iter().collect();
        let pending: Vec<i32> = years.into_iter().filter(|y| self.needs_fetch(*y)).collect();
        if pending.is_empty() {
            return true;
        }

        let store = &self.inner.store;
        store.clear_error();

        let mut tasks = JoinSet::new();
        for year in pending {
            let engine = self.clone();
            tasks.spawn(async move { (year, engine.load_year(year).await) });
        }

        let mut failures: BTreeMap<i32, AttrsError> = BTreeMap::new();
        let mut task_failure = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((year, Err(err))) => {
                    failures.insert(year, err);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "year load task failed");
                    if task_failure.is_none() {
                        task_failure =
                            Some(AttrsError::internal(format!("year load task failed: {err}")));
                    }
                }
            }
        }

        match failures.into_values().next().or(task_failure) {
            Some(err) => {
                store.record_error(err);
                false
            }
            None => true,
        }
    }

    fn needs_fetch(&self, year: i32) -> bool {
        !self
            .inner
            .store
            .missing_keys(&TableKey::window_for_year(year))
            .is_empty()
    }

    /// Fetch and store the missing keys of one year's window.
    ///
    /// Does not touch `last_error`; callers record the returned error.
    async fn load_year(&self, year: i32) -> Result<()> {
        let store = &self.inner.store;
        let missing = store.missing_keys(&TableKey::window_for_year(year));
        if missing.is_empty() {
            return Ok(());
        }

        let _guard = store.begin_load();
        let fetcher = self.inner.fetcher.as_ref();
        let results = join_all(missing.iter().map(|key| load_table(fetcher, *key))).await;

        let mut batch = Vec::with_capacity(missing.len());
        for (key, result) in missing.into_iter().zip(results) {
            match result {
                Ok(table) => batch.push((key, table)),
                Err(err) => {
                    tracing::warn!(
                        year,
                        key = %key,
                        category = err.category().as_str(),
                        error = %err,
                        "failed to load reference table"
                    );
                    return Err(err);
                }
            }
        }

        let inserted = store.insert_batch(batch);
        if inserted > 0 {
            self.inner.cache.clear();
        }
        tracing::info!(year, inserted, "reference tables loaded");
        Ok(())
    }

    /// Atomically replace one table (refresh path) and drop every cached query.
    pub fn replace_table(&self, key: TableKey, table: AttributeTable) {
        self.inner.store.replace(key, table);
        self.inner.cache.clear();
        tracing::debug!(key = %key, "reference table replaced");
    }

    pub fn is_loading(&self) -> bool {
        self.inner.store.is_loading()
    }

    pub fn last_error(&self) -> Option<AttrsError> {
        self.inner.store.last_error()
    }

    pub fn loaded_years(&self) -> BTreeSet<i32> {
        self.inner.store.loaded_years()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mock::MockPayloadFetcher;
    use pretty_assertions::assert_eq;

    const TS: i64 = 1_718_000_000;

    fn engine_with(fetcher: &Arc<MockPayloadFetcher>) -> Engine {
        Engine::with_fetcher(Arc::clone(fetcher) as Arc<dyn PayloadFetcher>)
    }

    #[tokio::test]
    async fn test_ensure_year_loaded_fetches_window() {
        let fetcher = Arc::new(MockPayloadFetcher::new());
        let engine = engine_with(&fetcher);

        assert!(engine.ensure_year_loaded(2024).await);
        assert_eq!(fetcher.call_count(), 4);
        assert_eq!(engine.loaded_years().into_iter().collect::<Vec<_>>(), vec![2023, 2024]);
        assert!(!engine.is_loading());
        assert!(engine.last_error().is_none());
    }

    #[tokio::test]
    async fn test_second_load_is_free() {
        let fetcher = Arc::new(MockPayloadFetcher::new());
        let engine = engine_with(&fetcher);

        assert!(engine.ensure_year_loaded(2024).await);
        assert!(engine.ensure_year_loaded(2024).await);
        assert_eq!(fetcher.call_count(), 4);
    }

    #[tokio::test]
    async fn test_adjacent_year_only_fetches_new_keys() {
        let fetcher = Arc::new(MockPayloadFetcher::new());
        let engine = engine_with(&fetcher);

        assert!(engine.ensure_year_loaded(2024).await);
        assert!(engine.ensure_year_loaded(2025).await);
        // 2025 shares 202449/202460 with the 2024 window.
        assert_eq!(fetcher.call_count(), 6);
    }

    #[tokio::test]
    async fn test_failed_fetch_records_error_and_stores_nothing() {
        let fetcher = Arc::new(MockPayloadFetcher::new());
        fetcher.fail(TableKey::new(2023, NumberRange::R60), "connection refused");
        let engine = engine_with(&fetcher);

        assert!(!engine.ensure_year_loaded(2024).await);
        let err = engine.last_error().expect("error recorded");
        assert_eq!(err.category(), ErrorCategory::FetchError);
        assert!(engine.loaded_years().is_empty());
        assert!(!engine.is_loading());
    }

    #[tokio::test]
    async fn test_failed_year_keeps_other_years() {
        let fetcher = Arc::new(MockPayloadFetcher::new());
        fetcher.fail(TableKey::new(2019, NumberRange::R49), "timeout");
        let engine = engine_with(&fetcher);

        assert!(!engine.ensure_years_loaded([2024, 2020, 2024]).await);
        assert!(engine.store().contains(TableKey::new(2024, NumberRange::R49)));
        assert!(engine.store().contains(TableKey::new(2023, NumberRange::R60)));
        assert!(!engine.store().contains(TableKey::new(2020, NumberRange::R49)));

        let err = engine.last_error().expect("error recorded");
        assert_eq!(err.to_string(), "fetch error: timeout");
        assert!(!engine.is_loading());
    }

    #[tokio::test]
    async fn test_later_years_do_not_erase_earlier_failure() {
        let fetcher = Arc::new(MockPayloadFetcher::new());
        fetcher.fail(TableKey::new(2019, NumberRange::R49), "2020 window down");
        let engine = engine_with(&fetcher);

        // The failing year sorts first; every later year succeeds.
        assert!(!engine.ensure_years_loaded([2020, 2024, 2026, 2028]).await);

        let err = engine.last_error().expect("error recorded");
        assert_eq!(err.category(), ErrorCategory::FetchError);
        assert_eq!(err.to_string(), "fetch error: 2020 window down");
        assert_eq!(
            engine.loaded_years().into_iter().collect::<Vec<_>>(),
            vec![2023, 2024, 2025, 2026, 2027, 2028]
        );
    }

    #[tokio::test]
    async fn test_earliest_failing_year_wins() {
        let fetcher = Arc::new(MockPayloadFetcher::new());
        fetcher.fail(TableKey::new(2029, NumberRange::R60), "late");
        fetcher.fail(TableKey::new(2021, NumberRange::R60), "early");
        let engine = engine_with(&fetcher);

        assert!(!engine.ensure_years_loaded([2030, 2022]).await);
        assert_eq!(engine.last_error().expect("error recorded").to_string(), "fetch error: early");
    }

    #[tokio::test]
    async fn test_successful_reload_clears_error() {
        let fetcher = Arc::new(MockPayloadFetcher::new());
        fetcher.fail(TableKey::new(2019, NumberRange::R49), "down");
        let engine = engine_with(&fetcher);

        assert!(!engine.ensure_year_loaded(2020).await);
        assert!(engine.last_error().is_some());

        // Nothing to fetch: the recorded error stays visible.
        assert!(engine.ensure_years_loaded(Vec::<i32>::new()).await);
        assert!(engine.last_error().is_some());

        assert!(engine.ensure_years_loaded([2024]).await);
        assert!(engine.last_error().is_none());
    }

    #[tokio::test]
    async fn test_extreme_year_does_not_panic() {
        let fetcher = Arc::new(MockPayloadFetcher::new());
        let engine = engine_with(&fetcher);

        assert!(engine.ensure_year_loaded(i32::MIN).await);
        assert_eq!(fetcher.call_count(), 2);
    }

    #[tokio::test]
    async fn test_load_clears_cache() {
        let fetcher = Arc::new(MockPayloadFetcher::new());
        fetcher.add_json(
            TableKey::new(2024, NumberRange::R49),
            r#"{"1":{"马":{"type":"生肖对应号码","name":"马","content1":"07"}}}"#,
            TS,
        );
        let engine = engine_with(&fetcher);

        assert_eq!(engine.zodiac("07", NumberRange::R49, 2024), "鼠");
        assert!(engine.cache_stats().attributes > 0);

        assert!(engine.ensure_year_loaded(2024).await);
        assert_eq!(engine.cache_stats().attributes, 0);
        assert_eq!(engine.zodiac("07", NumberRange::R49, 2024), "马");
    }

    #[tokio::test]
    async fn test_initialize_uses_preload_years() {
        let fetcher = Arc::new(MockPayloadFetcher::new());
        let engine = Engine::build(Arc::clone(&fetcher) as Arc<dyn PayloadFetcher>, vec![2024]);

        assert!(engine.initialize().await);
        assert_eq!(fetcher.call_count(), 4);
    }
}
