//! Memoizing front end over the read operations.
//!
//! Parsed results are cached per (operation, arguments) key in a bounded
//! first-in-first-out cache, so identical repeated requests return the
//! previously assembled bundle without re-fetching or re-parsing. The
//! cache holds successes only and can be reset between test cases. RBA
//! reads go straight through; they lean on the byte-level fetch cache
//! instead.

use crate::abs;
use crate::abs::ReadConfig;
use crate::abs::ResultBundle;
use crate::error::ReadAbsError;
use crate::fetch::Fetcher;
use crate::fetch::FileCache;
use crate::metadata::SeriesMetadata;
use crate::rba;
use crate::table::Series;
use crate::table::Table;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use tracing::debug;

const DEFAULT_CACHE_CAPACITY: usize = 64;

/// Bounded FIFO cache of assembled result bundles.
struct ResultCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, Arc<ResultBundle>>,
    order: VecDeque<String>,
}

impl ResultCache {
    fn new(capacity: usize) -> ResultCache {
        ResultCache {
            capacity,
            state: Mutex::new(CacheState::default()),
        }
    }

    fn get(&self, key: &str) -> Option<Arc<ResultBundle>> {
        let state = self.state.lock().expect("cache lock");
        state.entries.get(key).cloned()
    }

    fn put(&self, key: String, bundle: ResultBundle) -> Arc<ResultBundle> {
        let bundle = Arc::new(bundle);
        let mut state = self.state.lock().expect("cache lock");
        if !state.entries.contains_key(&key) {
            state.order.push_back(key.clone());
        }
        state.entries.insert(key, Arc::clone(&bundle));
        while state.order.len() > self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                debug!(key = %oldest, "evicting cached result");
                state.entries.remove(&oldest);
            }
        }
        bundle
    }

    fn reset(&self) {
        let mut state = self.state.lock().expect("cache lock");
        *state = CacheState::default();
    }
}

/// Entry point bundling a fetcher with the result cache.
pub struct Client {
    fetcher: Box<dyn Fetcher>,
    cache: ResultCache,
}

impl Client {
    /// Client over the default on-disk fetch cache.
    pub fn new() -> Result<Client, ReadAbsError> {
        let fetcher = FileCache::new().map_err(ReadAbsError::FetchError)?;
        Ok(Client::with_fetcher(Box::new(fetcher)))
    }

    /// Client over a caller-supplied fetcher.
    pub fn with_fetcher(fetcher: Box<dyn Fetcher>) -> Client {
        Client {
            fetcher,
            cache: ResultCache::new(DEFAULT_CACHE_CAPACITY),
        }
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Client {
        self.cache = ResultCache::new(capacity);
        self
    }

    /// Drops every cached result; raw byte caching is unaffected.
    pub fn reset_cache(&self) {
        self.cache.reset();
    }

    /// Memoized [`abs::read_abs_cat`].
    pub fn read_abs_cat(
        &self,
        catalogue_id: &str,
        config: &ReadConfig,
    ) -> Result<Arc<ResultBundle>, ReadAbsError> {
        let key = format!("abs-cat|{catalogue_id}|{}", config.cache_key());
        if let Some(bundle) = self.cache.get(&key) {
            return Ok(bundle);
        }
        let bundle = abs::read_abs_cat(self.fetcher.as_ref(), catalogue_id, config)?;
        Ok(self.cache.put(key, bundle))
    }

    /// Memoized [`abs::grab_abs_url`].
    pub fn grab_abs_url(
        &self,
        url: &str,
        config: &ReadConfig,
    ) -> Result<Arc<ResultBundle>, ReadAbsError> {
        let key = format!("abs-url|{url}|{}", config.cache_key());
        if let Some(bundle) = self.cache.get(&key) {
            return Ok(bundle);
        }
        let bundle = abs::grab_abs_url(self.fetcher.as_ref(), url, config)?;
        Ok(self.cache.put(key, bundle))
    }

    pub fn read_rba_table(
        &self,
        table_code: &str,
    ) -> Result<(Table, Vec<SeriesMetadata>), ReadAbsError> {
        rba::read_rba_table(self.fetcher.as_ref(), table_code)
    }

    pub fn read_rba_ocr(&self, monthly: bool) -> Result<Series, ReadAbsError> {
        rba::read_rba_ocr(self.fetcher.as_ref(), monthly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::FakeFetcher;

    fn single_page_client() -> Client {
        let fetcher = FakeFetcher::new().with(
            "https://example.test/page",
            b"<a href=\"/data/6202001.xlsx\">x</a>".to_vec(),
        );
        Client::with_fetcher(Box::new(fetcher))
    }

    #[test]
    fn test_repeat_requests_never_refetch() {
        let fetcher = FakeFetcher::new().with(
            "https://example.test/page",
            b"<html><body>no links</body></html>".to_vec(),
        );
        let counter = fetcher.clone();
        let client = Client::with_fetcher(Box::new(fetcher));
        let config = ReadConfig::default();

        let first = client.grab_abs_url("https://example.test/page", &config).unwrap();
        let after_first = counter.calls();
        let second = client.grab_abs_url("https://example.test/page", &config).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(counter.calls(), after_first);
    }

    #[test]
    fn test_reset_cache_forces_recomputation() {
        let client = single_page_client();
        let config = ReadConfig::default();
        let first = client.grab_abs_url("https://example.test/page", &config).unwrap();
        client.reset_cache();
        let second = client.grab_abs_url("https://example.test/page", &config).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_distinct_configs_are_distinct_cache_keys() {
        let client = single_page_client();
        let plain = ReadConfig::default();
        let single = ReadConfig::default().single_excel_only("6202001");
        let first = client.grab_abs_url("https://example.test/page", &plain).unwrap();
        let second = client.grab_abs_url("https://example.test/page", &single).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_cache_capacity_evicts_oldest() {
        let fetcher = FakeFetcher::new()
            .with("https://example.test/a", b"<html></html>".to_vec())
            .with("https://example.test/b", b"<html></html>".to_vec());
        let client = Client::with_fetcher(Box::new(fetcher)).with_cache_capacity(1);
        let config = ReadConfig::default();

        let first_a = client.grab_abs_url("https://example.test/a", &config).unwrap();
        let _b = client.grab_abs_url("https://example.test/b", &config).unwrap();
        // "a" was evicted, so asking again recomputes
        let second_a = client.grab_abs_url("https://example.test/a", &config).unwrap();
        assert!(!Arc::ptr_eq(&first_a, &second_a));
    }
}
