//! Snapshot cache
//!
//! [`CacheStore`] holds the one snapshot every reader is served. It starts
//! unloaded; the first `get()` loads from the configured sources in priority
//! order and falls back to the empty graph when none is usable. Concurrent
//! first callers wait on a single load. Rebuilds swap in a new `Arc`, so
//! readers keep whatever snapshot they already hold.

pub mod persist;

pub use persist::{read_snapshot, SnapshotWriter};

use crate::graph::{GraphSnapshot, SnapshotError};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Snapshot file errors
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid snapshot: {0}")]
    Invalid(#[from] SnapshotError),
}

impl CacheError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether the file simply does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Where the served snapshot came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotOrigin {
    File(PathBuf),
    /// No source was usable
    Empty,
    /// Installed by a rebuild
    Rebuilt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheState {
    Unloaded,
    Loaded(SnapshotOrigin),
}

struct Slot {
    snapshot: Arc<GraphSnapshot>,
    origin: SnapshotOrigin,
}

/// Lazily loaded, atomically replaced snapshot holder
pub struct CacheStore {
    sources: Vec<PathBuf>,
    current: RwLock<Option<Slot>>,
    load_guard: Mutex<()>,
    loads: AtomicUsize,
}

impl CacheStore {
    /// Create an unloaded cache reading from `sources`, highest priority first
    pub fn new(sources: Vec<PathBuf>) -> Self {
        Self {
            sources,
            current: RwLock::new(None),
            load_guard: Mutex::new(()),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// Current snapshot, loading it on first use
    pub async fn get(&self) -> Arc<GraphSnapshot> {
        if let Some(slot) = self.current.read().await.as_ref() {
            return slot.snapshot.clone();
        }

        let _guard = self.load_guard.lock().await;
        if let Some(slot) = self.current.read().await.as_ref() {
            return slot.snapshot.clone();
        }

        let (snapshot, origin) = self.load_from_sources().await;
        let mut current = self.current.write().await;
        // A rebuild may have landed while the sources were read
        match current.as_ref() {
            Some(slot) => slot.snapshot.clone(),
            None => {
                let snapshot = Arc::new(snapshot);
                *current = Some(Slot {
                    snapshot: snapshot.clone(),
                    origin,
                });
                snapshot
            }
        }
    }

    /// Reload from the sources, replacing whatever is served
    pub async fn load(&self) -> Arc<GraphSnapshot> {
        let _guard = self.load_guard.lock().await;
        let (snapshot, origin) = self.load_from_sources().await;
        let snapshot = Arc::new(snapshot);
        *self.current.write().await = Some(Slot {
            snapshot: snapshot.clone(),
            origin,
        });
        snapshot
    }

    /// Swap in a freshly built snapshot
    pub async fn replace(&self, snapshot: GraphSnapshot) -> Arc<GraphSnapshot> {
        let snapshot = Arc::new(snapshot);
        *self.current.write().await = Some(Slot {
            snapshot: snapshot.clone(),
            origin: SnapshotOrigin::Rebuilt,
        });
        info!(
            "Swapped in rebuilt snapshot ({} nodes, {} links)",
            snapshot.node_count(),
            snapshot.edge_count()
        );
        snapshot
    }

    pub async fn state(&self) -> CacheState {
        match self.current.read().await.as_ref() {
            Some(slot) => CacheState::Loaded(slot.origin.clone()),
            None => CacheState::Unloaded,
        }
    }

    /// Number of source loads performed so far
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    async fn load_from_sources(&self) -> (GraphSnapshot, SnapshotOrigin) {
        self.loads.fetch_add(1, Ordering::SeqCst);

        for path in &self.sources {
            match read_snapshot(path).await {
                Ok(snapshot) => {
                    info!(
                        "Loaded snapshot from {} ({} nodes, {} links)",
                        path.display(),
                        snapshot.node_count(),
                        snapshot.edge_count()
                    );
                    return (snapshot, SnapshotOrigin::File(path.clone()));
                }
                Err(e) if e.is_not_found() => debug!("No snapshot at {}", path.display()),
                Err(e) => warn!("Skipping snapshot {}: {}", path.display(), e),
            }
        }

        warn!(
            "No usable snapshot among {} source(s), serving an empty graph",
            self.sources.len()
        );
        (GraphSnapshot::empty(), SnapshotOrigin::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphNode, LabNode};

    fn lab_graph(id: &str) -> GraphSnapshot {
        GraphSnapshot::new(vec![GraphNode::from(LabNode::new(id, id))], Vec::new())
    }

    #[tokio::test]
    async fn test_no_sources_serves_empty_graph() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::new(vec![dir.path().join("missing.json")]);
        assert_eq!(cache.state().await, CacheState::Unloaded);

        let snapshot = cache.get().await;

        assert!(snapshot.is_empty());
        assert_eq!(
            serde_json::to_value(snapshot.as_ref()).unwrap(),
            serde_json::json!({"nodes": [], "links": []})
        );
        assert_eq!(cache.state().await, CacheState::Loaded(SnapshotOrigin::Empty));
    }

    #[tokio::test]
    async fn test_first_usable_source_wins() {
        let dir = tempfile::tempdir().unwrap();
        let corrupt = dir.path().join("corrupt.json");
        let good = dir.path().join("good.json");
        let later = dir.path().join("later.json");
        std::fs::write(&corrupt, "{oops").unwrap();
        std::fs::write(&good, serde_json::to_string(&lab_graph("good")).unwrap()).unwrap();
        std::fs::write(&later, serde_json::to_string(&lab_graph("later")).unwrap()).unwrap();

        let cache = CacheStore::new(vec![dir.path().join("absent.json"), corrupt, good.clone(), later]);
        let snapshot = cache.get().await;

        assert_eq!(snapshot.nodes[0].id(), "good");
        assert_eq!(cache.state().await, CacheState::Loaded(SnapshotOrigin::File(good)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_access_loads_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        std::fs::write(&path, serde_json::to_string(&lab_graph("only")).unwrap()).unwrap();
        let cache = Arc::new(CacheStore::new(vec![path]));

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get().await })
            })
            .collect();
        let mut snapshots = Vec::new();
        for handle in handles {
            snapshots.push(handle.await.unwrap());
        }

        assert_eq!(cache.load_count(), 1);
        assert!(snapshots.iter().all(|s| Arc::ptr_eq(s, &snapshots[0])));
    }

    #[tokio::test]
    async fn test_replace_swaps_without_touching_held_snapshots() {
        let cache = CacheStore::new(Vec::new());
        let before = cache.get().await;

        cache.replace(lab_graph("fresh")).await;
        let after = cache.get().await;

        assert!(before.is_empty());
        assert_eq!(after.nodes[0].id(), "fresh");
        assert_eq!(cache.state().await, CacheState::Loaded(SnapshotOrigin::Rebuilt));
        assert_eq!(cache.load_count(), 1);
    }

    #[tokio::test]
    async fn test_replace_before_first_get_skips_load() {
        let cache = CacheStore::new(Vec::new());
        cache.replace(lab_graph("early")).await;

        assert_eq!(cache.get().await.nodes[0].id(), "early");
        assert_eq!(cache.load_count(), 0);
    }

    #[tokio::test]
    async fn test_explicit_load_rereads_sources() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        let cache = CacheStore::new(vec![path.clone()]);
        assert!(cache.get().await.is_empty());

        SnapshotWriter::new(&path).write(&lab_graph("written")).await.unwrap();
        let reloaded = cache.load().await;

        assert_eq!(reloaded.nodes[0].id(), "written");
        assert_eq!(cache.load_count(), 2);
    }

    #[tokio::test]
    async fn test_serves_file_with_stringified_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph_cache.json");
        std::fs::write(
            &path,
            r#"{"nodes": [{"id": "r1", "name": "Ada", "type": "researcher", "val": 1,
                "papers": [{"title": "T", "year": "2021", "document_id": "d1", "tags": []}],
                "tags": [], "influence": "87"}], "links": []}"#,
        )
        .unwrap();
        let cache = CacheStore::new(vec![path.clone()]);

        let snapshot = cache.get().await;

        assert_eq!(snapshot.node_count(), 1);
        assert_eq!(snapshot.nodes[0].as_researcher().unwrap().influence, Some(87.0));
        assert_eq!(cache.state().await, CacheState::Loaded(SnapshotOrigin::File(path)));
    }
}
