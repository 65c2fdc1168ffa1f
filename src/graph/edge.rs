//! Edge type for the research graph
//!
//! Serialized as a visualizer link: `{source, target, type}`.

use super::types::EdgeKind;
use serde::{Deserialize, Serialize};

/// A relation between two node ids
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Source node id (advisee for advising, researcher for affiliation)
    pub source: String,

    /// Target node id (advisor for advising, lab for affiliation)
    pub target: String,

    /// Relation kind
    #[serde(rename = "type")]
    pub kind: EdgeKind,
}

impl GraphEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: EdgeKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
        }
    }

    /// Co-authorship edge between two researchers
    pub fn paper(a: impl Into<String>, b: impl Into<String>) -> Self {
        Self::new(a, b, EdgeKind::Paper)
    }

    /// Advising edge from advisee to advisor
    pub fn advisor(advisee: impl Into<String>, advisor: impl Into<String>) -> Self {
        Self::new(advisee, advisor, EdgeKind::Advisor)
    }

    /// Affiliation edge from researcher to lab
    pub fn affiliation(researcher: impl Into<String>, lab: impl Into<String>) -> Self {
        Self::new(researcher, lab, EdgeKind::ResearcherLab)
    }

    /// Identity of the relation, ignoring endpoint order for undirected kinds
    pub fn key(&self) -> (EdgeKind, &str, &str) {
        let (a, b) = (self.source.as_str(), self.target.as_str());
        if self.kind.is_undirected() && b < a {
            (self.kind, b, a)
        } else {
            (self.kind, a, b)
        }
    }
}
