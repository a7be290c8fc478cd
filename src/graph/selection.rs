use std::collections::{BTreeSet, HashSet};

/// One hidden relation offered in the expansion dialog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpansionCandidate {
    pub id: String,
    pub class: String,
    pub label: String,
}

/// Which relations of a heavily connected node the user wants to reveal.
/// Everything starts included.
#[derive(Clone, Debug)]
pub struct ExpansionSelection {
    node_id: String,
    candidates: Vec<ExpansionCandidate>,
    exclusions: BTreeSet<String>,
}

impl ExpansionSelection {
    pub fn new(node_id: impl Into<String>, candidates: Vec<ExpansionCandidate>) -> Self {
        Self {
            node_id: node_id.into(),
            candidates,
            exclusions: BTreeSet::new(),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn candidates(&self) -> &[ExpansionCandidate] {
        &self.candidates
    }

    pub fn is_included(&self, id: &str) -> bool {
        !self.exclusions.contains(id)
    }

    pub fn toggle(&mut self, id: &str) {
        if !self.candidates.iter().any(|candidate| candidate.id == id) {
            return;
        }
        if !self.exclusions.remove(id) {
            self.exclusions.insert(id.to_owned());
        }
    }

    /// Distinct relation classes, sorted.
    pub fn classes(&self) -> Vec<&str> {
        self.candidates
            .iter()
            .map(|candidate| candidate.class.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn is_class_included(&self, class: &str) -> bool {
        self.candidates
            .iter()
            .filter(|candidate| candidate.class == class)
            .all(|candidate| self.is_included(&candidate.id))
    }

    /// Includes the whole class unless it is already fully included, in
    /// which case the whole class is excluded.
    pub fn toggle_class(&mut self, class: &str) {
        let exclude = self.is_class_included(class);
        for candidate in self.candidates.iter().filter(|candidate| candidate.class == class) {
            if exclude {
                self.exclusions.insert(candidate.id.clone());
            } else {
                self.exclusions.remove(&candidate.id);
            }
        }
    }

    pub fn include_all(&mut self) {
        self.exclusions.clear();
    }

    pub fn exclude_all(&mut self) {
        self.exclusions = self
            .candidates
            .iter()
            .map(|candidate| candidate.id.clone())
            .collect();
    }

    pub fn included_count(&self) -> usize {
        self.candidates
            .iter()
            .filter(|candidate| self.is_included(&candidate.id))
            .count()
    }

    pub fn exclusions(&self) -> HashSet<String> {
        self.exclusions.iter().cloned().collect()
    }
}
