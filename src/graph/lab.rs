//! Canonical lab registry
//!
//! The registry is the fixed, curated set of labs used as fuzzy-match
//! targets. Its iteration order is stable and breaks resolver ties.

use serde::{Deserialize, Serialize};

/// A canonical lab: stable id plus display name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabRecord {
    pub id: String,
    pub name: String,
}

impl LabRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

const CANONICAL_LABS: &[(&str, &str)] = &[
    ("aims_lab", "AIMS Lab"),
    ("behavioral_data_science_group", "Behavioral Data Science Group"),
    ("bespoke_silicon_group", "Bespoke Silicon Group"),
    ("database_group", "Database Group"),
    ("h2_lab", "H2 Lab"),
    ("human_centered_robotics_lab", "Human-Centered Robotics Lab"),
    ("ictd_lab", "ICTD Lab"),
    ("interactive_data_lab", "Interactive Data Lab"),
    ("make4all_group", "Make4all Group"),
    ("makeability_lab", "Makeability Lab"),
    ("molecular_information_systems_lab", "MISL"),
    ("mostafavi_lab", "Mostafavi Lab"),
    ("personal_robotics_lab", "Personal Robotics Lab"),
    ("raivn_lab", "RAIVN Lab"),
    ("robot_learning_lab", "Robot Learning Lab"),
    ("sampl", "SAMPL"),
    ("social_futures_lab", "Social Futures Lab"),
    ("social_rl_lab", "Social RL Lab"),
    ("snail_lab", "SNAIL"),
    ("theory_of_computation_group", "Theory of Computation Group"),
    ("tsvetshop", "Tsvetshop"),
    ("ubicomp_lab", "UbiComp Lab"),
    ("uw_reality_lab", "UW Reality Lab"),
    ("weird_lab", "WEIRD Lab"),
    ("wildlab", "Wildlab"),
];

/// Ordered set of canonical labs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabRegistry {
    labs: Vec<LabRecord>,
}

impl LabRegistry {
    /// Build a registry from explicit records, keeping the first of any duplicated id
    pub fn new(labs: Vec<LabRecord>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let labs = labs
            .into_iter()
            .filter(|lab| seen.insert(lab.id.clone()))
            .collect();
        Self { labs }
    }

    /// The curated registry shipped with the service
    pub fn canonical() -> Self {
        Self::new(
            CANONICAL_LABS
                .iter()
                .map(|(id, name)| LabRecord::new(*id, *name))
                .collect(),
        )
    }

    pub fn labs(&self) -> &[LabRecord] {
        &self.labs
    }

    pub fn get(&self, id: &str) -> Option<&LabRecord> {
        self.labs.iter().find(|lab| lab.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.labs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labs.is_empty()
    }
}

impl Default for LabRegistry {
    fn default() -> Self {
        Self::canonical()
    }
}
