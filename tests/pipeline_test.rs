use paper_pigeon::graph::GraphNode;
use paper_pigeon::store::{MemoryStore, StoreError};
use paper_pigeon::{
    CacheState, CacheStore, EdgeKind, FetchError, GraphAssembler, PipelineError, RebuildPipeline,
    RecordFetcher, RetryPolicy, SnapshotOrigin, SnapshotWriter,
};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay_ms: 1,
        max_delay_ms: 4,
        multiplier: 2.0,
    }
}

/// A small department: two co-authors, an advised student with a lab name,
/// a postdoc without an advisor who lists two labs, and a dangling edge
fn department() -> Arc<MemoryStore> {
    let mut papers: Vec<Value> = vec![
        json!({"document_id": "p1", "title": "Scaling Laws", "year": 2023, "tags": ["nlp", "vision"], "lab_id": "aims_lab"}),
        json!({"document_id": "p2", "title": "Grounding", "year": "2021", "tags": ["NLP"]}),
    ];
    // Enough library-referenced papers to force several batches
    papers.extend((0..150).map(|i| json!({"document_id": format!("bulk{}", i), "tags": []})));

    let mut library = vec![
        json!({"researcher_id": "ada", "document_id": "p1"}),
        json!({"researcher_id": "ada", "document_id": "p2"}),
        json!({"researcher_id": "ada", "document_id": "p1"}),
        json!({"researcher_id": "grace", "document_id": "ghost"}),
    ];
    library.extend((0..150).map(|i| json!({"researcher_id": "grace", "document_id": format!("bulk{}", i)})));

    Arc::new(
        MemoryStore::new()
            .with_table(
                "researchers",
                vec![
                    json!({"researcher_id": "ada", "name": "Ada", "labs": ["AIMS"]}),
                    json!({"researcher_id": "grace", "name": "Grace", "labs": ["Social Robotics Futures", "Quantum Basket Weaving"]}),
                    json!({"researcher_id": "alan", "name": "Alan", "advisor": "Ada", "labs": ["AIMS"]}),
                ],
            )
            .with_table(
                "paper-edges",
                vec![
                    json!({"researcher_one_id": "ada", "researcher_two_id": "grace"}),
                    json!({"researcher_one_id": "grace", "researcher_two_id": "ada"}),
                    json!({"researcher_one_id": "ada", "researcher_two_id": "nobody"}),
                ],
            )
            .with_table(
                "advisor_edges",
                vec![json!({"advisee_id": "alan", "advisor_id": "ada"})],
            )
            .with_table("library", library)
            .with_table("papers", papers)
            .with_table(
                "descriptions",
                vec![json!({"researcher_id": "ada", "about": "Works on language models."})],
            )
            .with_table(
                "metrics",
                vec![
                    json!({"researcher_id": "ada", "influence": 87.5}),
                    json!({"researcher_id": "grace", "influence": "not a number"}),
                ],
            ),
    )
}

fn pipeline(store: Arc<MemoryStore>, dir: &Path) -> RebuildPipeline {
    let path = dir.join("graph_cache.json");
    RebuildPipeline::new(
        RecordFetcher::new(store).with_retry(fast_retry()),
        GraphAssembler::default(),
        Arc::new(CacheStore::new(vec![path.clone()])),
        SnapshotWriter::new(path),
    )
}

fn researcher<'a>(snapshot: &'a paper_pigeon::GraphSnapshot, id: &str) -> &'a paper_pigeon::ResearcherNode {
    snapshot
        .node(id)
        .and_then(GraphNode::as_researcher)
        .unwrap_or_else(|| panic!("researcher {} missing", id))
}

#[tokio::test]
async fn test_department_snapshot_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(department(), dir.path());

    let summary = pipeline.rebuild().await.unwrap();
    let snapshot = pipeline.cache().get().await;

    assert!(snapshot.validate().is_ok());
    assert_eq!(summary.nodes, snapshot.node_count());
    assert_eq!(summary.report.researchers, 3);

    // One co-authorship edge despite the reversed duplicate; dangling one dropped
    let paper_edges: Vec<_> = snapshot.edges_of_kind(EdgeKind::Paper).collect();
    assert_eq!(paper_edges.len(), 1);
    assert_eq!(summary.report.dropped_edges, 1);

    // Advised student gets no affiliation even with a matching lab name
    let affiliations: HashSet<(&str, &str)> = snapshot
        .edges_of_kind(EdgeKind::ResearcherLab)
        .map(|e| (e.source.as_str(), e.target.as_str()))
        .collect();
    assert!(affiliations.contains(&("ada", "aims_lab")));
    assert!(affiliations.contains(&("grace", "social_futures_lab")));
    assert!(!affiliations.iter().any(|(source, _)| *source == "alan"));
    assert_eq!(summary.report.unresolved_lab_names, 1);

    assert_eq!(snapshot.edges_of_kind(EdgeKind::Advisor).count(), 1);

    let ada = researcher(&snapshot, "ada");
    assert_eq!(ada.tags, vec!["NLP", "nlp", "vision"]);
    assert_eq!(ada.papers.len(), 2);
    assert_eq!(ada.influence, Some(87.5));
    assert_eq!(ada.about.as_deref(), Some("Works on language models."));

    let grace = researcher(&snapshot, "grace");
    assert_eq!(grace.papers.len(), 150);
    assert_eq!(grace.influence, None);
    assert_eq!(summary.report.invalid_influence, 1);
    assert_eq!(summary.report.missing_publications, 1);
}

#[tokio::test]
async fn test_every_edge_endpoint_is_a_node() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(department(), dir.path());
    pipeline.rebuild().await.unwrap();
    let snapshot = pipeline.cache().get().await;

    let ids: HashSet<&str> = snapshot.nodes.iter().map(GraphNode::id).collect();
    for edge in &snapshot.edges {
        assert!(ids.contains(edge.source.as_str()), "dangling source {}", edge.source);
        assert!(ids.contains(edge.target.as_str()), "dangling target {}", edge.target);
    }
    for node in &snapshot.nodes {
        if let Some(r) = node.as_researcher() {
            let mut sorted = r.tags.clone();
            sorted.sort();
            sorted.dedup();
            assert_eq!(r.tags, sorted);
        }
    }
}

#[tokio::test]
async fn test_persisted_snapshot_reloads_through_a_fresh_cache() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(department(), dir.path());
    pipeline.rebuild().await.unwrap();
    let built = pipeline.cache().get().await;

    let path = dir.path().join("graph_cache.json");
    let restarted = CacheStore::new(vec![dir.path().join("absent.json"), path.clone()]);
    let reloaded = restarted.get().await;

    assert_eq!(*reloaded, *built);
    assert_eq!(restarted.state().await, CacheState::Loaded(SnapshotOrigin::File(path)));
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let dir = tempfile::tempdir().unwrap();
    let store = department();
    store.fail_next(StoreError::Throttled("slow down".into()));
    store.fail_next(StoreError::Unavailable("502".into()));
    let pipeline = pipeline(store, dir.path());

    let summary = pipeline.rebuild().await.unwrap();

    assert_eq!(summary.report.researchers, 3);
}

#[tokio::test]
async fn test_persistent_failure_keeps_last_known_good_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let store = department();
    let pipeline = pipeline(store.clone(), dir.path());
    pipeline.rebuild().await.unwrap();
    let served = pipeline.cache().get().await;
    let on_disk = std::fs::read_to_string(dir.path().join("graph_cache.json")).unwrap();

    store.set_persistent_failure(Some(StoreError::Unavailable("down".into())));
    let err = pipeline.rebuild().await.unwrap_err();

    match err {
        PipelineError::Fetch(FetchError::Store { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("unexpected error: {}", other),
    }
    assert!(Arc::ptr_eq(&served, &pipeline.cache().get().await));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("graph_cache.json")).unwrap(),
        on_disk
    );
}

#[tokio::test]
async fn test_read_only_rebuild_touches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = department();
    let pipeline = pipeline(store.clone(), dir.path()).with_read_only(true);

    assert!(matches!(pipeline.rebuild().await, Err(PipelineError::ReadOnly)));
    assert_eq!(store.request_count(), 0);
    assert!(pipeline.cache().get().await.is_empty());
}

#[tokio::test]
async fn test_snapshot_json_shape() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(department(), dir.path());
    pipeline.rebuild().await.unwrap();

    let raw = std::fs::read_to_string(dir.path().join("graph_cache.json")).unwrap();
    let value: Value = serde_json::from_str(&raw).unwrap();

    let nodes = value["nodes"].as_array().unwrap();
    let links = value["links"].as_array().unwrap();
    let ada = nodes.iter().find(|n| n["id"] == "ada").unwrap();
    assert_eq!(ada["type"], "researcher");
    assert_eq!(ada["val"], 1);
    let aims = nodes.iter().find(|n| n["id"] == "aims_lab").unwrap();
    assert_eq!(aims["type"], "lab");
    assert_eq!(aims["val"], 2);
    assert!(links.iter().any(|l| l["type"] == "researcher_lab" && l["source"] == "ada"));
}
