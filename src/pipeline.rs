//! Rebuild pipeline
//!
//! Fetch, assemble, persist, swap. A rebuild either completes all four steps
//! or leaves the served snapshot exactly as it was.

use crate::assemble::{AssemblyReport, GraphAssembler};
use crate::cache::{CacheError, CacheStore, SnapshotWriter};
use crate::fetch::{FetchError, RecordFetcher};
use crate::graph::GraphSnapshot;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Rebuild errors
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Cache writing is disabled in read-only deployments")]
    ReadOnly,

    #[error("A rebuild is already in progress")]
    RebuildInProgress,

    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Persist failed: {0}")]
    Persist(#[from] CacheError),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Outcome of a successful rebuild
#[derive(Debug, Clone, Serialize)]
pub struct RebuildSummary {
    pub nodes: usize,
    pub links: usize,
    pub duration_ms: u64,
    pub finished_at: DateTime<Utc>,
    pub report: AssemblyReport,
}

/// Builds snapshots from the store and installs them in the cache
pub struct RebuildPipeline {
    fetcher: RecordFetcher,
    assembler: GraphAssembler,
    cache: Arc<CacheStore>,
    writer: SnapshotWriter,
    read_only: bool,
    rebuild_lock: Mutex<()>,
}

impl RebuildPipeline {
    pub fn new(
        fetcher: RecordFetcher,
        assembler: GraphAssembler,
        cache: Arc<CacheStore>,
        writer: SnapshotWriter,
    ) -> Self {
        Self {
            fetcher,
            assembler,
            cache,
            writer,
            read_only: false,
            rebuild_lock: Mutex::new(()),
        }
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn fetcher(&self) -> &RecordFetcher {
        &self.fetcher
    }

    /// Fetch and assemble without persisting or swapping
    pub async fn build_snapshot(&self) -> PipelineResult<(GraphSnapshot, AssemblyReport)> {
        let inputs = self.fetcher.fetch_inputs().await?;
        Ok(self.assembler.assemble_with_report(&inputs))
    }

    /// Rebuild, persist and swap in a new snapshot
    pub async fn rebuild(&self) -> PipelineResult<RebuildSummary> {
        if self.read_only {
            warn!("Rejected rebuild: read-only deployment");
            return Err(PipelineError::ReadOnly);
        }

        let _guard = self.rebuild_lock.try_lock().map_err(|_| {
            warn!("Rejected rebuild: another rebuild is running");
            PipelineError::RebuildInProgress
        })?;

        let started = Instant::now();
        info!("Rebuilding graph snapshot");

        let (snapshot, report) = self.build_snapshot().await.map_err(|e| {
            error!("Rebuild aborted, keeping the served snapshot: {}", e);
            e
        })?;

        self.writer.write(&snapshot).await.map_err(|e| {
            error!("Rebuild aborted, could not persist snapshot: {}", e);
            PipelineError::from(e)
        })?;

        let snapshot = self.cache.replace(snapshot).await;
        let summary = RebuildSummary {
            nodes: snapshot.node_count(),
            links: snapshot.edge_count(),
            duration_ms: started.elapsed().as_millis() as u64,
            finished_at: Utc::now(),
            report,
        };
        info!(
            "Rebuild finished in {}ms: {} nodes, {} links",
            summary.duration_ms, summary.nodes, summary.links
        );
        Ok(summary)
    }
}
