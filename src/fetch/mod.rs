//! Record fetching
//!
//! Pulls the raw inputs of an assembly run out of a [`RecordStore`]. Four
//! tables are scanned whole; publications and researcher annotations are
//! looked up by id in batches no larger than the store's key cap. Batches run
//! concurrently and are merged into ordered maps, so the result does not
//! depend on input order or on which batch finishes first.

pub mod retry;

pub use retry::RetryPolicy;

use crate::assemble::AssemblyInputs;
use crate::records::{
    decode, decode_all, AdvisingEdge, Annotation, AuthorshipEdge, DescriptionRecord,
    LibraryEntry, MetricRecord, PublicationRecord, RecordError, ResearcherRecord,
};
use crate::store::{RecordStore, StoreError, MAX_SCAN_PAGES};
use futures::future::try_join_all;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Default deadline for a single store call
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetch errors
#[derive(Error, Debug)]
pub enum FetchError {
    /// A store call failed permanently or ran out of attempts
    #[error("{operation} failed after {attempts} attempt(s): {source}")]
    Store {
        operation: String,
        attempts: u32,
        source: StoreError,
    },

    /// A returned item could not be decoded
    #[error(transparent)]
    Malformed(#[from] RecordError),
}

pub type FetchResult<T> = Result<T, FetchError>;

/// Names of the tables the pipeline reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableNames {
    pub researchers: String,
    pub authorship_edges: String,
    pub advising_edges: String,
    pub library: String,
    pub papers: String,
    pub descriptions: String,
    pub metrics: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            researchers: "researchers".to_string(),
            authorship_edges: "paper-edges".to_string(),
            advising_edges: "advisor_edges".to_string(),
            library: "library".to_string(),
            papers: "papers".to_string(),
            descriptions: "descriptions".to_string(),
            metrics: "metrics".to_string(),
        }
    }
}

/// Reads pipeline inputs from a store under one retry policy
pub struct RecordFetcher {
    store: Arc<dyn RecordStore>,
    tables: TableNames,
    retry: RetryPolicy,
    timeout: Duration,
}

impl RecordFetcher {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            tables: TableNames::default(),
            retry: RetryPolicy::default(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_tables(mut self, tables: TableNames) -> Self {
        self.tables = tables;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    pub async fn fetch_all_researchers(&self) -> FetchResult<Vec<ResearcherRecord>> {
        self.scan_table(&self.tables.researchers).await
    }

    pub async fn fetch_all_authorship_edges(&self) -> FetchResult<Vec<AuthorshipEdge>> {
        self.scan_table(&self.tables.authorship_edges).await
    }

    pub async fn fetch_all_advising_edges(&self) -> FetchResult<Vec<AdvisingEdge>> {
        self.scan_table(&self.tables.advising_edges).await
    }

    pub async fn fetch_all_library_entries(&self) -> FetchResult<Vec<LibraryEntry>> {
        self.scan_table(&self.tables.library).await
    }

    /// Look up publications by document id; unknown ids are absent
    pub async fn fetch_publications_by_ids(
        &self,
        ids: &[String],
    ) -> FetchResult<BTreeMap<String, PublicationRecord>> {
        self.batch_lookup(&self.tables.papers, "document_id", ids, |p: &PublicationRecord| {
            p.document_id.clone()
        })
        .await
    }

    /// Look up biographies and influence scores by researcher id
    ///
    /// Both tables are queried concurrently and merged per researcher. Ids
    /// found in neither table are absent from the result.
    pub async fn fetch_annotations_by_ids(
        &self,
        ids: &[String],
    ) -> FetchResult<BTreeMap<String, Annotation>> {
        let (descriptions, metrics) = tokio::try_join!(
            self.batch_lookup(&self.tables.descriptions, "researcher_id", ids, |d: &DescriptionRecord| {
                d.researcher_id.clone()
            }),
            self.batch_lookup(&self.tables.metrics, "researcher_id", ids, |m: &MetricRecord| {
                m.researcher_id.clone()
            }),
        )?;

        let mut annotations: BTreeMap<String, Annotation> = BTreeMap::new();
        for (id, description) in descriptions {
            annotations.entry(id).or_default().about = description.about;
        }
        for (id, metric) in metrics {
            annotations.entry(id).or_default().influence = metric.influence;
        }
        Ok(annotations)
    }

    /// Run the whole fetch stage
    pub async fn fetch_inputs(&self) -> FetchResult<AssemblyInputs> {
        let (researchers, authorship, advising, library) = tokio::try_join!(
            self.fetch_all_researchers(),
            self.fetch_all_authorship_edges(),
            self.fetch_all_advising_edges(),
            self.fetch_all_library_entries(),
        )?;

        let document_ids: Vec<String> = library.iter().map(|e| e.document_id.clone()).collect();
        let researcher_ids: Vec<String> = researchers.iter().map(|r| r.researcher_id.clone()).collect();

        let (publications, annotations) = tokio::try_join!(
            self.fetch_publications_by_ids(&document_ids),
            self.fetch_annotations_by_ids(&researcher_ids),
        )?;

        info!(
            "Fetched {} researchers, {} authorship edges, {} advising edges, {} library entries, {} publications, {} annotations",
            researchers.len(),
            authorship.len(),
            advising.len(),
            library.len(),
            publications.len(),
            annotations.len()
        );

        Ok(AssemblyInputs {
            researchers,
            authorship,
            advising,
            library,
            publications,
            annotations,
        })
    }

    /// Follow a table's pages; the timeout and retry budget apply per page
    async fn scan_table<T: DeserializeOwned>(&self, table: &str) -> FetchResult<Vec<T>> {
        let store = self.store.as_ref();
        let operation = format!("scan {}", table);
        let mut items = Vec::new();
        let mut next_token: Option<String> = None;

        for page in 1..=MAX_SCAN_PAGES {
            let token = next_token.as_deref();
            let resp = self
                .retry
                .run(&operation, self.timeout, move || store.scan_page(table, token))
                .await?;
            items.extend(resp.items);

            match resp.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => {
                    debug!("Scanned {} items from {} in {} page(s)", items.len(), table, page);
                    return Ok(decode_all(table, items)?);
                }
            }
        }

        Err(FetchError::Store {
            operation,
            attempts: 1,
            source: StoreError::Request(format!("more than {} pages", MAX_SCAN_PAGES)),
        })
    }

    async fn batch_lookup<T, K>(
        &self,
        table: &str,
        key: &str,
        ids: &[String],
        key_of: K,
    ) -> FetchResult<BTreeMap<String, T>>
    where
        T: DeserializeOwned,
        K: Fn(&T) -> String,
    {
        let unique: Vec<String> = ids
            .iter()
            .filter(|id| !id.is_empty())
            .map(String::as_str)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();
        if unique.is_empty() {
            return Ok(BTreeMap::new());
        }

        let cap = self.store.max_batch_keys().max(1);
        let store = self.store.as_ref();
        let retry = &self.retry;
        let timeout = self.timeout;
        let operation = format!("batch_get {}", table);
        debug!(
            "Looking up {} ids in {} ({} batch(es) of at most {})",
            unique.len(),
            table,
            unique.len().div_ceil(cap),
            cap
        );

        let op = operation.as_str();
        let batches = try_join_all(unique.chunks(cap).map(move |chunk| async move {
            retry
                .run(op, timeout, move || store.batch_get(table, key, chunk))
                .await
        }))
        .await?;

        let mut merged = BTreeMap::new();
        for item in batches.into_iter().flatten() {
            let record: T = decode(table, item)?;
            let id = key_of(&record);
            merged.entry(id).or_insert(record);
        }
        debug!("Resolved {}/{} ids in {}", merged.len(), unique.len(), table);
        Ok(merged)
    }
}
