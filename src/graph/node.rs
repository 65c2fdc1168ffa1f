//! Node types for the research graph
//!
//! A node is either a researcher (weight 1) or a canonical lab (weight 2).
//! The serialized form is the visualizer's node schema: `type` carries the
//! kind and `val` the render weight.

use super::types::NodeKind;
use serde::{Deserialize, Serialize};

/// Publication summary embedded in a researcher node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperSummary {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "crate::records::lenient_year")]
    pub year: Option<i32>,
    pub document_id: String,
    #[serde(default, deserialize_with = "crate::records::string_list")]
    pub tags: Vec<String>,
}

/// A researcher vertex
///
/// Optional fields serialize as `null` when absent so the node schema stays
/// stable for consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearcherNode {
    pub id: String,
    pub name: String,
    #[serde(default = "researcher_weight")]
    pub val: u32,
    pub advisor: Option<String>,
    #[serde(default, deserialize_with = "crate::records::string_list")]
    pub contact_info: Vec<String>,
    #[serde(default, deserialize_with = "crate::records::string_list")]
    pub labs: Vec<String>,
    pub standing: Option<String>,
    #[serde(default)]
    pub papers: Vec<PaperSummary>,
    /// Sorted ascending, no duplicates
    #[serde(default, deserialize_with = "crate::records::string_list")]
    pub tags: Vec<String>,
    /// Influence score in [0, 100]
    #[serde(default, deserialize_with = "crate::records::lenient_influence")]
    pub influence: Option<f64>,
    pub about: Option<String>,
}

impl ResearcherNode {
    /// Create a researcher node with no optional details
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            val: NodeKind::Researcher.weight(),
            advisor: None,
            contact_info: Vec::new(),
            labs: Vec::new(),
            standing: None,
            papers: Vec::new(),
            tags: Vec::new(),
            influence: None,
            about: None,
        }
    }

    /// Whether this researcher has an advisor value
    pub fn has_advisor(&self) -> bool {
        self.advisor.as_deref().is_some_and(|a| !a.trim().is_empty())
    }
}

/// A canonical lab vertex
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabNode {
    pub id: String,
    pub name: String,
    #[serde(default = "lab_weight")]
    pub val: u32,
}

impl LabNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            val: NodeKind::Lab.weight(),
        }
    }
}

fn researcher_weight() -> u32 {
    NodeKind::Researcher.weight()
}

fn lab_weight() -> u32 {
    NodeKind::Lab.weight()
}

/// A vertex in the graph snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GraphNode {
    Researcher(ResearcherNode),
    Lab(LabNode),
}

impl GraphNode {
    pub fn id(&self) -> &str {
        match self {
            GraphNode::Researcher(r) => &r.id,
            GraphNode::Lab(l) => &l.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            GraphNode::Researcher(r) => &r.name,
            GraphNode::Lab(l) => &l.name,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            GraphNode::Researcher(_) => NodeKind::Researcher,
            GraphNode::Lab(_) => NodeKind::Lab,
        }
    }

    pub fn weight(&self) -> u32 {
        match self {
            GraphNode::Researcher(r) => r.val,
            GraphNode::Lab(l) => l.val,
        }
    }

    pub fn as_researcher(&self) -> Option<&ResearcherNode> {
        match self {
            GraphNode::Researcher(r) => Some(r),
            GraphNode::Lab(_) => None,
        }
    }
}

impl From<ResearcherNode> for GraphNode {
    fn from(node: ResearcherNode) -> Self {
        GraphNode::Researcher(node)
    }
}

impl From<LabNode> for GraphNode {
    fn from(node: LabNode) -> Self {
        GraphNode::Lab(node)
    }
}
