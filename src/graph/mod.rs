//! Research graph data model
//!
//! This module defines the typed snapshot served to the visualizer:
//! - Researcher and lab nodes (`node`)
//! - Authorship, advising and affiliation edges (`edge`)
//! - The `{nodes, links}` aggregate and its invariants (`snapshot`)
//! - The canonical lab registry (`lab`)

pub mod edge;
pub mod lab;
pub mod node;
pub mod snapshot;
pub mod types;

// Re-export main types
pub use edge::GraphEdge;
pub use lab::{LabRecord, LabRegistry};
pub use node::{GraphNode, LabNode, PaperSummary, ResearcherNode};
pub use snapshot::{GraphSnapshot, SnapshotError, SnapshotStats};
pub use types::{EdgeKind, NodeKind};
