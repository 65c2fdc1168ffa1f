//! Paper Pigeon graph pipeline
//!
//! Builds the research-network graph served to the visualizer and serves it
//! through a cache-first read path.
//!
//! # Architecture
//!
//! - [`store`]: the backing document store behind the `RecordStore` trait
//! - [`fetch`]: full scans and batched lookups with one retry policy
//! - [`resolve`]: fuzzy matching of free-text lab names
//! - [`assemble`]: joins records into a `{nodes, links}` snapshot
//! - [`cache`]: lazy-loaded, atomically swapped snapshot holder
//! - [`pipeline`]: fetch, assemble, persist, swap
//! - [`services`]: document links and knowledge-base collaborators
//! - [`http`]: the JSON API
//!
//! ## Example Usage
//!
//! ```rust
//! use paper_pigeon::records::ResearcherRecord;
//! use paper_pigeon::{AssemblyInputs, GraphAssembler, LabRegistry, LabResolver};
//!
//! let registry = LabRegistry::canonical();
//! let found = LabResolver::new().resolve("AIMS", registry.labs()).unwrap();
//! assert_eq!(found.lab.id, "aims_lab");
//!
//! let inputs = AssemblyInputs {
//!     researchers: vec![ResearcherRecord {
//!         researcher_id: "r1".to_string(),
//!         name: "Ada".to_string(),
//!         advisor: None,
//!         contact_info: vec![],
//!         labs: vec!["AIMS".to_string()],
//!         standing: None,
//!     }],
//!     ..Default::default()
//! };
//! let snapshot = GraphAssembler::default().assemble(&inputs);
//! assert_eq!(snapshot.edge_count(), 1);
//! assert!(snapshot.validate().is_ok());
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod assemble;
pub mod cache;
pub mod config;
pub mod fetch;
pub mod graph;
pub mod http;
pub mod pipeline;
pub mod records;
pub mod resolve;
pub mod services;
pub mod store;

// Re-export main types for convenience
pub use assemble::{AssemblyInputs, AssemblyReport, GraphAssembler};
pub use cache::{CacheError, CacheResult, CacheState, CacheStore, SnapshotOrigin, SnapshotWriter};
pub use config::{ConfigError, ConfigResult, PipelineConfig};
pub use fetch::{FetchError, FetchResult, RecordFetcher, RetryPolicy, TableNames};
pub use graph::{
    EdgeKind, GraphEdge, GraphNode, GraphSnapshot, LabNode, LabRecord, LabRegistry, NodeKind,
    ResearcherNode, SnapshotError,
};
pub use pipeline::{PipelineError, PipelineResult, RebuildPipeline, RebuildSummary};
pub use resolve::{LabMatch, LabResolver, MatchKind};
pub use services::{DocumentUrlIssuer, KnowledgeService, ServiceError, ServiceResult};
pub use store::{RecordStore, StoreError, StoreResult};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let ver = version();
        assert!(!ver.is_empty());
        assert_eq!(ver, "0.3.0");
    }
}
