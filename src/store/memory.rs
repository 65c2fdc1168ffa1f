//! In-memory record store
//!
//! Holds tables as vectors of items. Enforces the per-request key cap and
//! counts requests so batching is observable, and can replay injected
//! failures to exercise retry behavior.

use super::{RecordStore, ScanPage, StoreError, StoreResult, DEFAULT_MAX_BATCH_KEYS};
use crate::records::{item_key, Item};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

/// In-process store backed by hash maps
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Item>>>,
    max_batch_keys: usize,
    /// Items per scan page; whole tables when `None`
    page_size: Option<usize>,
    latency: Option<Duration>,
    requests: AtomicUsize,
    /// Errors returned by the next calls, one per call
    scheduled_failures: Mutex<VecDeque<StoreError>>,
    /// Error returned by every call when set
    persistent_failure: Mutex<Option<StoreError>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            max_batch_keys: DEFAULT_MAX_BATCH_KEYS,
            page_size: None,
            latency: None,
            requests: AtomicUsize::new(0),
            scheduled_failures: Mutex::new(VecDeque::new()),
            persistent_failure: Mutex::new(None),
        }
    }

    pub fn with_max_batch_keys(mut self, max: usize) -> Self {
        self.max_batch_keys = max.max(1);
        self
    }

    /// Split scans into pages of `size` items
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size.max(1));
        self
    }

    /// Delay every call, to exercise timeouts
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Add a table from JSON objects; non-object values are skipped
    pub fn with_table(self, table: &str, rows: Vec<Value>) -> Self {
        for row in rows {
            if let Value::Object(item) = row {
                self.insert(table, item);
            }
        }
        self
    }

    pub fn insert(&self, table: &str, item: Item) {
        if let Ok(mut tables) = self.tables.write() {
            tables.entry(table.to_string()).or_default().push(item);
        }
    }

    /// Fail the next call with `error`
    pub fn fail_next(&self, error: StoreError) {
        if let Ok(mut queue) = self.scheduled_failures.lock() {
            queue.push_back(error);
        }
    }

    /// Fail every call with `error` until cleared with `None`
    pub fn set_persistent_failure(&self, error: Option<StoreError>) {
        if let Ok(mut slot) = self.persistent_failure.lock() {
            *slot = error;
        }
    }

    /// Number of scan_page and batch_get calls received, failed ones included
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    async fn begin_request(&self) -> StoreResult<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(err) = self.persistent_failure.lock().ok().and_then(|slot| slot.clone()) {
            return Err(err);
        }
        if let Some(err) = self.scheduled_failures.lock().ok().and_then(|mut q| q.pop_front()) {
            return Err(err);
        }
        Ok(())
    }

    fn read_table(&self, table: &str) -> StoreResult<Vec<Item>> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StoreError::Unavailable("table lock poisoned".to_string()))?;
        Ok(tables.get(table).cloned().unwrap_or_default())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn scan_page(&self, table: &str, next_token: Option<&str>) -> StoreResult<ScanPage> {
        self.begin_request().await?;
        let items = self.read_table(table)?;
        let Some(size) = self.page_size else {
            return Ok(ScanPage::last(items));
        };

        let start = match next_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| StoreError::Request(format!("bad scan token '{}'", token)))?,
            None => 0,
        };
        let end = (start + size).min(items.len());
        let page = items.get(start..end).map(<[Item]>::to_vec).unwrap_or_default();
        Ok(ScanPage {
            items: page,
            next_token: (end < items.len()).then(|| end.to_string()),
        })
    }

    async fn batch_get(&self, table: &str, key: &str, ids: &[String]) -> StoreResult<Vec<Item>> {
        self.begin_request().await?;
        if ids.len() > self.max_batch_keys {
            return Err(StoreError::TooManyKeys {
                requested: ids.len(),
                max: self.max_batch_keys,
            });
        }

        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        Ok(self
            .read_table(table)?
            .into_iter()
            .filter(|item| item_key(item, key).is_some_and(|id| wanted.contains(id)))
            .collect())
    }

    fn max_batch_keys(&self) -> usize {
        self.max_batch_keys
    }
}
