//! Snapshot files
//!
//! Snapshots are written to `<name>.tmp` next to the target and renamed over
//! it, so readers of the target path see either the old file or the new one.

use super::{CacheError, CacheResult};
use crate::graph::GraphSnapshot;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Atomically writes snapshots to one path
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    path: PathBuf,
}

impl SnapshotWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write(&self, snapshot: &GraphSnapshot) -> CacheResult<()> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CacheError::io(parent, e))?;
        }

        let tmp = temp_path(&self.path);
        if let Err(e) = write_synced(&tmp, &bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(CacheError::io(&tmp, e));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(CacheError::io(&self.path, e));
        }

        info!(
            "Wrote snapshot ({} nodes, {} links, {} bytes) to {}",
            snapshot.node_count(),
            snapshot.edge_count(),
            bytes.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Read, parse and validate a snapshot file
pub async fn read_snapshot(path: &Path) -> CacheResult<GraphSnapshot> {
    let bytes = tokio::fs::read(path).await.map_err(|e| CacheError::io(path, e))?;
    let snapshot: GraphSnapshot = serde_json::from_slice(&bytes)?;
    snapshot.validate()?;
    debug!("Read valid snapshot from {}", path.display());
    Ok(snapshot)
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphEdge, GraphNode, LabNode, ResearcherNode};

    fn sample() -> GraphSnapshot {
        GraphSnapshot::new(
            vec![
                GraphNode::from(ResearcherNode::new("r1", "Ada")),
                GraphNode::from(LabNode::new("aims_lab", "AIMS Lab")),
            ],
            vec![GraphEdge::affiliation("r1", "aims_lab")],
        )
    }

    #[test]
    fn test_temp_path_sits_next_to_target() {
        assert_eq!(
            temp_path(Path::new("/srv/cache/graph.json")),
            PathBuf::from("/srv/cache/graph.json.tmp")
        );
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("graph.json");
        let writer = SnapshotWriter::new(&path);

        writer.write(&sample()).await.unwrap();

        assert_eq!(read_snapshot(&path).await.unwrap(), sample());
        assert!(!temp_path(&path).exists());
    }

    #[tokio::test]
    async fn test_write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        std::fs::write(&path, "stale").unwrap();

        SnapshotWriter::new(&path).write(&GraphSnapshot::empty()).await.unwrap();

        assert_eq!(read_snapshot(&path).await.unwrap(), GraphSnapshot::empty());
    }

    #[tokio::test]
    async fn test_read_rejects_invalid_snapshots() {
        let dir = tempfile::tempdir().unwrap();

        let garbage = dir.path().join("garbage.json");
        std::fs::write(&garbage, "{\"nodes\": 3}").unwrap();
        assert!(matches!(read_snapshot(&garbage).await, Err(CacheError::Json(_))));

        let dangling = dir.path().join("dangling.json");
        let mut snapshot = sample();
        snapshot.edges.push(GraphEdge::paper("r1", "ghost"));
        std::fs::write(&dangling, serde_json::to_string(&snapshot).unwrap()).unwrap();
        assert!(matches!(read_snapshot(&dangling).await, Err(CacheError::Invalid(_))));

        let missing = dir.path().join("missing.json");
        assert!(read_snapshot(&missing).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_read_accepts_stringified_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph_cache.json");
        let legacy = serde_json::json!({
            "nodes": [
                {
                    "id": "r1", "name": "Ada", "type": "researcher", "val": 1,
                    "advisor": null, "contact_info": null, "labs": ["AIMS"], "standing": null,
                    "papers": [
                        {"title": "Scaling Laws", "year": "2021", "document_id": "d1", "tags": ["nlp"]},
                        {"title": "Draft", "year": "n/a", "document_id": "d2", "tags": null}
                    ],
                    "tags": ["nlp"], "influence": "87", "about": null
                },
                {
                    "id": "r2", "name": "Alan", "type": "researcher", "val": 1,
                    "advisor": "Ada", "contact_info": [], "labs": [], "standing": "PhD",
                    "papers": [], "tags": [], "influence": "unknown", "about": "Logician"
                },
                {"id": "aims_lab", "name": "AIMS Lab", "type": "lab", "val": 2}
            ],
            "links": [
                {"source": "r1", "target": "r2", "type": "paper"},
                {"source": "r1", "target": "aims_lab", "type": "researcher_lab"}
            ]
        });
        std::fs::write(&path, legacy.to_string()).unwrap();

        let snapshot = read_snapshot(&path).await.unwrap();

        let ada = snapshot.node("r1").and_then(GraphNode::as_researcher).unwrap();
        assert_eq!(ada.influence, Some(87.0));
        assert_eq!(ada.papers[0].year, Some(2021));
        assert_eq!(ada.papers[1].year, None);
        assert!(ada.papers[1].tags.is_empty());
        assert!(ada.contact_info.is_empty());
        let alan = snapshot.node("r2").and_then(GraphNode::as_researcher).unwrap();
        assert_eq!(alan.influence, None);
        assert_eq!(snapshot.edge_count(), 2);
    }
}
