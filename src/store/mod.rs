//! Backing document store
//!
//! The pipeline reads its inputs through the [`RecordStore`] trait, which
//! exposes the two primitives a document/key-value store offers: a paginated
//! table scan and a batched lookup by key. Implemented by:
//! - `MemoryStore`: in-process tables (tests, embedded use)
//! - `JsonDirStore`: a directory of table exports (offline rebuilds)
//! - `HttpStore`: a JSON gateway in front of the production store
//! - `DisabledStore`: refuses every call until a real store is configured

pub mod http;
pub mod json_dir;
pub mod memory;

pub use http::HttpStore;
pub use json_dir::JsonDirStore;
pub use memory::MemoryStore;

use crate::records::Item;
use async_trait::async_trait;
use thiserror::Error;

/// Per-request key cap of the production store
pub const DEFAULT_MAX_BATCH_KEYS: usize = 100;

/// Upper bound on pages followed by one scan, guards against a store that never stops paging
pub const MAX_SCAN_PAGES: usize = 10_000;

/// Store errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Store unreachable or returned a server-side failure
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Request rate exceeded
    #[error("Store throttled: {0}")]
    Throttled(String),

    /// Call exceeded its deadline
    #[error("Store call timed out after {0}ms")]
    Timeout(u64),

    /// Batch exceeded the per-request key cap
    #[error("Batch of {requested} keys exceeds the store limit of {max}")]
    TooManyKeys { requested: usize, max: usize },

    /// Table does not exist
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Request rejected by the store
    #[error("Invalid request: {0}")]
    Request(String),

    /// Response could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// No backing store is configured
    #[error("Store not configured: {0}")]
    NotConfigured(String),
}

impl StoreError {
    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable(_) | StoreError::Throttled(_) | StoreError::Timeout(_)
        )
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One page of a table scan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanPage {
    pub items: Vec<Item>,
    /// Continuation token, `None` on the last page
    pub next_token: Option<String>,
}

impl ScanPage {
    /// A page with no continuation
    pub fn last(items: Vec<Item>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }
}

/// Read access to the backing store
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Return one page of a table, starting after `next_token`
    async fn scan_page(&self, table: &str, next_token: Option<&str>) -> StoreResult<ScanPage>;

    /// Return every item of a table, following continuation tokens
    async fn scan(&self, table: &str) -> StoreResult<Vec<Item>> {
        let mut items = Vec::new();
        let mut next_token: Option<String> = None;
        for _ in 0..MAX_SCAN_PAGES {
            let page = self.scan_page(table, next_token.as_deref()).await?;
            items.extend(page.items);
            match page.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => return Ok(items),
            }
        }
        Err(StoreError::Request(format!(
            "scan of {} exceeded {} pages",
            table, MAX_SCAN_PAGES
        )))
    }

    /// Return the items of `table` whose `key` attribute is one of `ids`
    ///
    /// Unknown ids are simply absent from the result. Callers must not pass
    /// more than [`RecordStore::max_batch_keys`] ids.
    async fn batch_get(&self, table: &str, key: &str, ids: &[String]) -> StoreResult<Vec<Item>>;

    /// Maximum number of keys accepted by one `batch_get` call
    fn max_batch_keys(&self) -> usize {
        DEFAULT_MAX_BATCH_KEYS
    }
}

/// Stand-in used when no store is configured
///
/// Every call fails permanently, so a rebuild aborts before it can replace
/// the served snapshot with an empty graph.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledStore;

#[async_trait]
impl RecordStore for DisabledStore {
    async fn scan_page(&self, table: &str, _next_token: Option<&str>) -> StoreResult<ScanPage> {
        Err(StoreError::NotConfigured(format!("cannot scan {}", table)))
    }

    async fn batch_get(&self, table: &str, _key: &str, _ids: &[String]) -> StoreResult<Vec<Item>> {
        Err(StoreError::NotConfigured(format!("cannot read {}", table)))
    }
}
