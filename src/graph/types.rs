//! Core type definitions for the research graph

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a graph vertex, serialized as the node's `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Researcher,
    Lab,
}

impl NodeKind {
    /// Render weight (`val`) used by the visualizer
    pub fn weight(&self) -> u32 {
        match self {
            NodeKind::Researcher => 1,
            NodeKind::Lab => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Researcher => "researcher",
            NodeKind::Lab => "lab",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Relation kind of an edge, serialized as the link's `type` field
///
/// - `Paper`: co-authorship, undirected
/// - `Advisor`: advisee -> advisor
/// - `ResearcherLab`: researcher -> lab, inferred from free-text lab names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Paper,
    Advisor,
    ResearcherLab,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Paper => "paper",
            EdgeKind::Advisor => "advisor",
            EdgeKind::ResearcherLab => "researcher_lab",
        }
    }

    /// Whether the endpoints of this relation are unordered
    pub fn is_undirected(&self) -> bool {
        matches!(self, EdgeKind::Paper)
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
