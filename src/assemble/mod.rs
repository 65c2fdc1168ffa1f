//! Graph assembly
//!
//! Joins the fetched records into one [`GraphSnapshot`]. Assembly is a pure
//! function of its inputs: researchers keep their scan order, labs keep
//! registry order, and edges follow the order of the records they come from,
//! so identical inputs always produce identical snapshots.
//!
//! Records that cannot be joined degrade instead of failing: edges with an
//! unknown endpoint are dropped, invalid influence values become absent, and
//! unresolvable lab names produce no affiliation.

use crate::graph::{
    EdgeKind, GraphEdge, GraphNode, GraphSnapshot, LabNode, LabRegistry, PaperSummary, ResearcherNode,
};
use crate::records::{
    parse_influence, AdvisingEdge, Annotation, AuthorshipEdge, LibraryEntry, PublicationRecord,
    ResearcherRecord,
};
use crate::resolve::LabResolver;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, info, warn};

/// Everything one assembly run reads
#[derive(Debug, Clone, Default)]
pub struct AssemblyInputs {
    pub researchers: Vec<ResearcherRecord>,
    pub authorship: Vec<AuthorshipEdge>,
    pub advising: Vec<AdvisingEdge>,
    pub library: Vec<LibraryEntry>,
    /// Publications keyed by document id
    pub publications: BTreeMap<String, PublicationRecord>,
    /// Biography and influence keyed by researcher id
    pub annotations: BTreeMap<String, Annotation>,
}

/// What assembly kept, dropped and degraded
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssemblyReport {
    pub researchers: usize,
    pub labs: usize,
    pub duplicate_researchers: usize,
    /// Researchers dropped because their id is a lab id
    pub lab_id_collisions: usize,
    /// Library entries whose document was not found
    pub missing_publications: usize,
    pub invalid_influence: usize,
    /// Edges dropped for a missing endpoint
    pub dropped_edges: usize,
    pub duplicate_edges: usize,
    pub affiliations: usize,
    pub unresolved_lab_names: usize,
}

/// Builds snapshots from fetched records
#[derive(Debug, Clone, Default)]
pub struct GraphAssembler {
    registry: LabRegistry,
    resolver: LabResolver,
}

impl GraphAssembler {
    pub fn new(registry: LabRegistry, resolver: LabResolver) -> Self {
        Self { registry, resolver }
    }

    pub fn registry(&self) -> &LabRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &LabResolver {
        &self.resolver
    }

    pub fn assemble(&self, inputs: &AssemblyInputs) -> GraphSnapshot {
        self.assemble_with_report(inputs).0
    }

    pub fn assemble_with_report(&self, inputs: &AssemblyInputs) -> (GraphSnapshot, AssemblyReport) {
        let mut report = AssemblyReport::default();

        // Index researchers, first occurrence wins
        let mut index: IndexMap<&str, &ResearcherRecord> = IndexMap::new();
        for record in &inputs.researchers {
            let id = record.researcher_id.as_str();
            if self.registry.contains(id) {
                warn!("Dropping researcher {}: id collides with a lab id", id);
                report.lab_id_collisions += 1;
            } else if index.contains_key(id) {
                debug!("Duplicate researcher record {}, keeping the first", id);
                report.duplicate_researchers += 1;
            } else {
                index.insert(id, record);
            }
        }

        let documents = documents_by_researcher(&inputs.library);

        let mut nodes: Vec<GraphNode> = Vec::with_capacity(index.len() + self.registry.len());
        let mut researchers: Vec<ResearcherNode> = Vec::with_capacity(index.len());
        for (&id, record) in &index {
            let doc_ids = documents.get(id).map(Vec::as_slice).unwrap_or_default();
            let node = self.researcher_node(record, doc_ids, inputs, &mut report);
            researchers.push(node);
        }

        let mut edges = EdgeSet::default();

        for edge in &inputs.authorship {
            let (a, b) = (edge.researcher_one_id.as_str(), edge.researcher_two_id.as_str());
            if index.contains_key(a) && index.contains_key(b) {
                edges.push(GraphEdge::paper(a, b), &mut report);
            } else {
                debug!("Dropping paper edge {} - {}: unknown researcher", a, b);
                report.dropped_edges += 1;
            }
        }

        for edge in &inputs.advising {
            let (advisee, advisor) = (edge.advisee_id.as_str(), edge.advisor_id.as_str());
            if index.contains_key(advisee) && index.contains_key(advisor) {
                edges.push(GraphEdge::advisor(advisee, advisor), &mut report);
            } else {
                debug!("Dropping advisor edge {} -> {}: unknown researcher", advisee, advisor);
                report.dropped_edges += 1;
            }
        }

        // Affiliations are inferred only for researchers without an advisor
        for node in researchers.iter().filter(|n| !n.has_advisor()) {
            for lab_name in &node.labs {
                match self.resolver.resolve(lab_name, self.registry.labs()) {
                    Some(found) => {
                        debug!(
                            "Resolved lab '{}' of {} to {} ({} {:.2})",
                            lab_name,
                            node.id,
                            found.lab.id,
                            found.kind.as_str(),
                            found.score
                        );
                        if edges.push(GraphEdge::affiliation(&node.id, &found.lab.id), &mut report) {
                            report.affiliations += 1;
                        }
                    }
                    None => {
                        debug!("Unresolved lab name '{}' for {}", lab_name, node.id);
                        report.unresolved_lab_names += 1;
                    }
                }
            }
        }

        report.researchers = researchers.len();
        report.labs = self.registry.len();
        nodes.extend(researchers.into_iter().map(GraphNode::from));
        nodes.extend(
            self.registry
                .labs()
                .iter()
                .map(|lab| GraphNode::from(LabNode::new(lab.id.clone(), lab.name.clone()))),
        );

        let snapshot = GraphSnapshot::new(nodes, edges.into_edges());
        info!(
            "Assembled {} nodes ({} researchers, {} labs) and {} links; dropped {} edges, {} invalid influence values, {} unresolved lab names",
            snapshot.node_count(),
            report.researchers,
            report.labs,
            snapshot.edge_count(),
            report.dropped_edges,
            report.invalid_influence,
            report.unresolved_lab_names
        );
        (snapshot, report)
    }

    fn researcher_node(
        &self,
        record: &ResearcherRecord,
        doc_ids: &[&str],
        inputs: &AssemblyInputs,
        report: &mut AssemblyReport,
    ) -> ResearcherNode {
        let mut node = ResearcherNode::new(record.researcher_id.clone(), record.name.clone());
        node.advisor = record.advisor.clone();
        node.contact_info = record.contact_info.clone();
        node.labs = record.labs.clone();
        node.standing = record.standing.clone();

        let mut tags: BTreeSet<&str> = BTreeSet::new();
        for &doc_id in doc_ids {
            match inputs.publications.get(doc_id) {
                Some(publication) => {
                    tags.extend(publication.tags.iter().map(String::as_str));
                    node.papers.push(PaperSummary {
                        title: publication.title.clone(),
                        year: publication.year,
                        document_id: publication.document_id.clone(),
                        tags: publication.tags.clone(),
                    });
                }
                None => {
                    debug!("Document {} of {} not found", doc_id, record.researcher_id);
                    report.missing_publications += 1;
                }
            }
        }
        node.tags = tags.into_iter().map(str::to_string).collect();

        if let Some(annotation) = inputs.annotations.get(&record.researcher_id) {
            node.about = annotation.about.clone();
            node.influence = match &annotation.influence {
                None | Some(Value::Null) => None,
                Some(raw) => match parse_influence(raw) {
                    Ok(score) => Some(score),
                    Err(value) => {
                        warn!("Ignoring invalid influence {} for {}", value, record.researcher_id);
                        report.invalid_influence += 1;
                        None
                    }
                },
            };
        }

        node
    }
}

/// Library entries grouped per researcher, in table order without repeats
fn documents_by_researcher(library: &[LibraryEntry]) -> HashMap<&str, Vec<&str>> {
    let mut grouped: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    for entry in library {
        let pair = (entry.researcher_id.as_str(), entry.document_id.as_str());
        if seen.insert(pair) {
            grouped.entry(pair.0).or_default().push(pair.1);
        }
    }
    grouped
}

/// Ordered edge list that drops repeats of the same relation
///
/// `paper` edges are unordered, so reversed authorship records (A-B and
/// B-A) collapse into one link. `advisor` and `researcher_lab` edges are
/// directed and only exact repeats are dropped. The first occurrence keeps
/// its position.
#[derive(Default)]
struct EdgeSet {
    edges: Vec<GraphEdge>,
    seen: HashSet<(EdgeKind, String, String)>,
}

impl EdgeSet {
    /// Returns false when the relation was already present
    fn push(&mut self, edge: GraphEdge, report: &mut AssemblyReport) -> bool {
        let (kind, a, b) = edge.key();
        if !self.seen.insert((kind, a.to_string(), b.to_string())) {
            report.duplicate_edges += 1;
            return false;
        }
        self.edges.push(edge);
        true
    }

    fn into_edges(self) -> Vec<GraphEdge> {
        self.edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeKind;
    use serde_json::json;

    fn researcher(id: &str) -> ResearcherRecord {
        ResearcherRecord {
            researcher_id: id.to_string(),
            name: format!("Researcher {}", id),
            advisor: None,
            contact_info: Vec::new(),
            labs: Vec::new(),
            standing: None,
        }
    }

    fn publication(id: &str, tags: &[&str]) -> PublicationRecord {
        PublicationRecord {
            document_id: id.to_string(),
            title: Some(format!("Title {}", id)),
            year: Some(2024),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            lab_id: None,
        }
    }

    fn authorship(a: &str, b: &str) -> AuthorshipEdge {
        AuthorshipEdge {
            researcher_one_id: a.to_string(),
            researcher_two_id: b.to_string(),
        }
    }

    fn library(researcher_id: &str, document_id: &str) -> LibraryEntry {
        LibraryEntry {
            researcher_id: researcher_id.to_string(),
            document_id: document_id.to_string(),
        }
    }

    fn assemble(inputs: &AssemblyInputs) -> GraphSnapshot {
        GraphAssembler::default().assemble(inputs)
    }

    fn researcher_node<'a>(snapshot: &'a GraphSnapshot, id: &str) -> &'a ResearcherNode {
        snapshot.node(id).and_then(GraphNode::as_researcher).unwrap()
    }

    #[test]
    fn test_one_paper_edge_between_present_researchers() {
        let inputs = AssemblyInputs {
            researchers: vec![researcher("r1"), researcher("r2")],
            authorship: vec![authorship("r1", "r2")],
            ..Default::default()
        };

        let snapshot = assemble(&inputs);

        let papers: Vec<_> = snapshot.edges_of_kind(EdgeKind::Paper).collect();
        assert_eq!(papers.len(), 1);
        assert_eq!((papers[0].source.as_str(), papers[0].target.as_str()), ("r1", "r2"));
    }

    #[test]
    fn test_edge_to_absent_researcher_is_dropped() {
        let inputs = AssemblyInputs {
            researchers: vec![researcher("r1"), researcher("r2")],
            authorship: vec![authorship("r1", "ghost")],
            advising: vec![AdvisingEdge {
                advisee_id: "ghost".to_string(),
                advisor_id: "r2".to_string(),
            }],
            ..Default::default()
        };

        let (snapshot, report) = GraphAssembler::default().assemble_with_report(&inputs);

        assert_eq!(snapshot.edge_count(), 0);
        assert_eq!(snapshot.node_count(), 2 + LabRegistry::canonical().len());
        assert_eq!(report.dropped_edges, 2);
        assert!(snapshot.validate().is_ok());
    }

    #[test]
    fn test_advisor_less_researcher_gets_affiliation() {
        let mut r1 = researcher("r1");
        r1.labs = vec!["AIMS".to_string()];
        let inputs = AssemblyInputs {
            researchers: vec![r1],
            ..Default::default()
        };

        let snapshot = assemble(&inputs);

        let affiliations: Vec<_> = snapshot.edges_of_kind(EdgeKind::ResearcherLab).collect();
        assert_eq!(affiliations.len(), 1);
        assert_eq!(affiliations[0].source, "r1");
        assert_eq!(affiliations[0].target, "aims_lab");
    }

    #[test]
    fn test_researcher_with_advisor_gets_no_affiliation() {
        let mut r1 = researcher("r1");
        r1.labs = vec!["AIMS".to_string()];
        r1.advisor = Some("Professor X".to_string());
        let inputs = AssemblyInputs {
            researchers: vec![r1],
            ..Default::default()
        };

        let snapshot = assemble(&inputs);

        assert_eq!(snapshot.edges_of_kind(EdgeKind::ResearcherLab).count(), 0);
    }

    #[test]
    fn test_tags_are_case_sensitive_and_sorted() {
        let inputs = AssemblyInputs {
            researchers: vec![researcher("r1")],
            library: vec![library("r1", "d1"), library("r1", "d2")],
            publications: BTreeMap::from([
                ("d1".to_string(), publication("d1", &["nlp", "NLP"])),
                ("d2".to_string(), publication("d2", &["vision", "nlp"])),
            ]),
            ..Default::default()
        };

        let snapshot = assemble(&inputs);
        let node = researcher_node(&snapshot, "r1");

        assert_eq!(node.tags, vec!["NLP", "nlp", "vision"]);
        assert_eq!(node.papers.len(), 2);
        assert_eq!(node.papers[0].document_id, "d1");
        assert_eq!(node.papers[1].tags, vec!["vision", "nlp"]);
    }

    #[test]
    fn test_duplicate_edges_emitted_once() {
        let mut r1 = researcher("r1");
        r1.labs = vec!["AIMS".to_string(), "aims lab".to_string()];
        let inputs = AssemblyInputs {
            researchers: vec![r1, researcher("r2")],
            authorship: vec![authorship("r1", "r2"), authorship("r2", "r1"), authorship("r1", "r2")],
            advising: vec![
                AdvisingEdge {
                    advisee_id: "r2".to_string(),
                    advisor_id: "r1".to_string(),
                },
                AdvisingEdge {
                    advisee_id: "r2".to_string(),
                    advisor_id: "r1".to_string(),
                },
            ],
            ..Default::default()
        };

        let (snapshot, report) = GraphAssembler::default().assemble_with_report(&inputs);

        assert_eq!(snapshot.edges_of_kind(EdgeKind::Paper).count(), 1);
        assert_eq!(snapshot.edges_of_kind(EdgeKind::Advisor).count(), 1);
        assert_eq!(snapshot.edges_of_kind(EdgeKind::ResearcherLab).count(), 1);
        assert_eq!(report.duplicate_edges, 4);
        assert_eq!(report.affiliations, 1);
    }

    #[test]
    fn test_annotations_and_invalid_influence() {
        let inputs = AssemblyInputs {
            researchers: vec![researcher("r1"), researcher("r2"), researcher("r3"), researcher("r4")],
            annotations: BTreeMap::from([
                (
                    "r1".to_string(),
                    Annotation {
                        about: Some("Works on compilers".to_string()),
                        influence: Some(json!(55)),
                    },
                ),
                (
                    "r2".to_string(),
                    Annotation {
                        about: None,
                        influence: Some(json!("250")),
                    },
                ),
                (
                    "r3".to_string(),
                    Annotation {
                        about: None,
                        influence: Some(json!("n/a")),
                    },
                ),
            ]),
            ..Default::default()
        };

        let (snapshot, report) = GraphAssembler::default().assemble_with_report(&inputs);

        let r1 = researcher_node(&snapshot, "r1");
        assert_eq!(r1.about.as_deref(), Some("Works on compilers"));
        assert_eq!(r1.influence, Some(55.0));
        assert_eq!(researcher_node(&snapshot, "r2").influence, None);
        assert_eq!(researcher_node(&snapshot, "r3").influence, None);
        assert_eq!(researcher_node(&snapshot, "r4").about, None);
        assert_eq!(report.invalid_influence, 2);
    }

    #[test]
    fn test_duplicate_and_colliding_researchers() {
        let mut second = researcher("r1");
        second.name = "Shadow".to_string();
        let inputs = AssemblyInputs {
            researchers: vec![researcher("r1"), second, researcher("wildlab")],
            ..Default::default()
        };

        let (snapshot, report) = GraphAssembler::default().assemble_with_report(&inputs);

        assert_eq!(researcher_node(&snapshot, "r1").name, "Researcher r1");
        assert_eq!(snapshot.node("wildlab").map(GraphNode::kind), Some(NodeKind::Lab));
        assert_eq!(report.duplicate_researchers, 1);
        assert_eq!(report.lab_id_collisions, 1);
        assert!(snapshot.validate().is_ok());
    }

    #[test]
    fn test_missing_publications_are_skipped() {
        let inputs = AssemblyInputs {
            researchers: vec![researcher("r1")],
            library: vec![library("r1", "d1"), library("r1", "gone"), library("r1", "d1")],
            publications: BTreeMap::from([("d1".to_string(), publication("d1", &["graphs"]))]),
            ..Default::default()
        };

        let (snapshot, report) = GraphAssembler::default().assemble_with_report(&inputs);

        assert_eq!(researcher_node(&snapshot, "r1").papers.len(), 1);
        assert_eq!(report.missing_publications, 1);
    }

    #[test]
    fn test_labs_follow_researchers_with_weight_two() {
        let inputs = AssemblyInputs {
            researchers: vec![researcher("r2"), researcher("r1")],
            ..Default::default()
        };

        let snapshot = assemble(&inputs);

        assert_eq!(snapshot.nodes[0].id(), "r2");
        assert_eq!(snapshot.nodes[1].id(), "r1");
        assert_eq!(snapshot.nodes[2].id(), "aims_lab");
        assert!(snapshot.nodes[2..].iter().all(|n| n.weight() == 2));
        assert!(snapshot.nodes[..2].iter().all(|n| n.weight() == 1));
    }

    #[test]
    fn test_assembly_is_deterministic() {
        let mut r1 = researcher("r1");
        r1.labs = vec!["Robot Learning".to_string(), "ubicomp".to_string()];
        let inputs = AssemblyInputs {
            researchers: vec![r1, researcher("r2"), researcher("r3")],
            authorship: vec![authorship("r3", "r1"), authorship("r1", "r2")],
            library: vec![library("r1", "d1"), library("r2", "d1")],
            publications: BTreeMap::from([("d1".to_string(), publication("d1", &["b", "a"]))]),
            ..Default::default()
        };

        let first = assemble(&inputs);
        for _ in 0..3 {
            assert_eq!(assemble(&inputs), first);
        }
        assert!(first.validate().is_ok());
    }

    #[test]
    fn test_empty_inputs_yield_lab_only_graph() {
        let snapshot = assemble(&AssemblyInputs::default());
        assert_eq!(snapshot.node_count(), LabRegistry::canonical().len());
        assert_eq!(snapshot.edge_count(), 0);
    }
}
