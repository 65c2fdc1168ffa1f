//! The served graph artifact
//!
//! A `GraphSnapshot` is built once per assembly run and replaced wholesale on
//! rebuild. Its wire form is `{"nodes": [...], "links": [...]}`.

use super::edge::GraphEdge;
use super::node::GraphNode;
use super::types::{EdgeKind, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Invariant violations detected by [`GraphSnapshot::validate`]
#[derive(Error, Debug, PartialEq)]
pub enum SnapshotError {
    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("Dangling {kind} edge {from} -> {to}")]
    DanglingEdge {
        kind: EdgeKind,
        from: String,
        to: String,
    },

    #[error("Researcher {0} has unsorted or duplicate tags")]
    UnsortedTags(String),
}

/// Complete `{nodes, links}` graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<GraphNode>,
    #[serde(rename = "links")]
    pub edges: Vec<GraphEdge>,
}

/// Node and edge counts by kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub nodes_by_kind: BTreeMap<NodeKind, usize>,
    pub edges_by_kind: BTreeMap<EdgeKind, usize>,
}

impl GraphSnapshot {
    pub fn new(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> Self {
        Self { nodes, edges }
    }

    /// The explicit empty graph served when no snapshot source is usable
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id() == id)
    }

    pub fn edges_of_kind(&self, kind: EdgeKind) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(move |e| e.kind == kind)
    }

    /// Check node id uniqueness, edge endpoints and tag ordering
    pub fn validate(&self) -> Result<(), SnapshotError> {
        let mut ids = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !ids.insert(node.id()) {
                return Err(SnapshotError::DuplicateNode(node.id().to_string()));
            }
            if let Some(researcher) = node.as_researcher() {
                if researcher.tags.windows(2).any(|w| w[0] >= w[1]) {
                    return Err(SnapshotError::UnsortedTags(researcher.id.clone()));
                }
            }
        }

        for edge in &self.edges {
            if !ids.contains(edge.source.as_str()) || !ids.contains(edge.target.as_str()) {
                return Err(SnapshotError::DanglingEdge {
                    kind: edge.kind,
                    from: edge.source.clone(),
                    to: edge.target.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn stats(&self) -> SnapshotStats {
        let mut stats = SnapshotStats {
            node_count: self.nodes.len(),
            edge_count: self.edges.len(),
            ..Default::default()
        };
        for node in &self.nodes {
            *stats.nodes_by_kind.entry(node.kind()).or_insert(0) += 1;
        }
        for edge in &self.edges {
            *stats.edges_by_kind.entry(edge.kind).or_insert(0) += 1;
        }
        stats
    }
}
