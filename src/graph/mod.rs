//! Materialized graph state: nodes, links and the indices kept beside them.
//!
//! Nodes and links live in two arenas. `objects` maps every id to its slot
//! and is rebuilt whenever a slot moves, so the two can never disagree.

mod expand;
mod relations;
mod selection;
mod tree;

use std::collections::{BTreeMap, HashMap, HashSet};

use eframe::egui::{Vec2, vec2};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::kb::{Record, record_class, record_id};

pub use expand::{Expansion, expand, materialize};
pub use relations::{
    Endpoint, LINK_FIELDS, Relation, relations_of, synthetic_link_id, unshown_relations,
};
pub use selection::{ExpansionCandidate, ExpansionSelection};
pub use tree::{TREE_RELATION, tree_depths};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub data: Record,
    pub x: f32,
    pub y: f32,
    #[serde(skip)]
    pub vx: f32,
    #[serde(skip)]
    pub vy: f32,
    #[serde(skip)]
    pub fx: Option<f32>,
    #[serde(skip)]
    pub fy: Option<f32>,
}

impl GraphNode {
    /// Wraps a record. Returns `None` when the record has no `@rid`.
    pub fn new(data: Record, position: Vec2) -> Option<Self> {
        let id = record_id(&data)?.to_owned();
        Some(Self {
            id,
            data,
            x: position.x,
            y: position.y,
            vx: 0.0,
            vy: 0.0,
            fx: None,
            fy: None,
        })
    }

    pub fn position(&self) -> Vec2 {
        vec2(self.x, self.y)
    }

    pub fn class(&self) -> Option<&str> {
        record_class(&self.data)
    }

    pub fn is_pinned(&self) -> bool {
        self.fx.is_some() || self.fy.is_some()
    }
}

/// Link between two nodes. `source` is the edge's `out` side, `target` its `in` side.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphLink {
    pub id: String,
    pub data: Record,
    pub source: String,
    pub target: String,
}

impl GraphLink {
    pub fn new(id: String, data: Record, source: String, target: String) -> Self {
        Self {
            id,
            data,
            source,
            target,
        }
    }

    pub fn class(&self) -> Option<&str> {
        record_class(&self.data)
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectRef {
    Node(usize),
    Link(usize),
}

/// Additions produced by one expansion, ready to merge.
#[derive(Clone, Debug, Default)]
pub struct GraphDelta {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
    pub expandable: BTreeMap<String, bool>,
}

impl GraphDelta {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.links.is_empty() && self.expandable.is_empty()
    }
}

/// Position-only access for the simulation.
pub struct LayoutView<'a> {
    pub nodes: &'a mut [GraphNode],
    pub links: &'a [GraphLink],
    objects: &'a HashMap<String, ObjectRef>,
}

impl LayoutView<'_> {
    pub fn node_index(&self, id: &str) -> Option<usize> {
        match self.objects.get(id) {
            Some(ObjectRef::Node(index)) => Some(*index),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct GraphState {
    nodes: Vec<GraphNode>,
    links: Vec<GraphLink>,
    objects: HashMap<String, ObjectRef>,
    expandable: HashMap<String, bool>,
}

impl GraphState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a state from stored parts. Duplicate ids keep their first
    /// occurrence and links whose endpoints are missing are dropped.
    /// Expandable flags start empty; callers recompute them.
    pub fn from_parts(nodes: Vec<GraphNode>, links: Vec<GraphLink>) -> Self {
        let mut state = Self::default();
        for node in nodes {
            if state.objects.contains_key(&node.id) {
                warn!(id = %node.id, "dropping duplicate node");
                continue;
            }
            state
                .objects
                .insert(node.id.clone(), ObjectRef::Node(state.nodes.len()));
            state.nodes.push(node);
        }
        for link in links {
            let dangling = !state.has_node(&link.source) || !state.has_node(&link.target);
            if dangling || state.objects.contains_key(&link.id) {
                warn!(id = %link.id, "dropping unusable link");
                continue;
            }
            state
                .objects
                .insert(link.id.clone(), ObjectRef::Link(state.links.len()));
            state.links.push(link);
        }
        state
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn links(&self) -> &[GraphLink] {
        &self.links
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.objects.contains_key(id)
    }

    pub fn has_node(&self, id: &str) -> bool {
        matches!(self.objects.get(id), Some(ObjectRef::Node(_)))
    }

    pub fn object(&self, id: &str) -> Option<ObjectRef> {
        self.objects.get(id).copied()
    }

    /// Ids of every materialized node and link.
    pub fn object_ids(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        match self.objects.get(id)? {
            ObjectRef::Node(index) => self.nodes.get(*index),
            ObjectRef::Link(_) => None,
        }
    }

    pub fn node_index(&self, id: &str) -> Option<usize> {
        match self.objects.get(id)? {
            ObjectRef::Node(index) => Some(*index),
            ObjectRef::Link(_) => None,
        }
    }

    pub fn link(&self, id: &str) -> Option<&GraphLink> {
        match self.objects.get(id)? {
            ObjectRef::Link(index) => self.links.get(*index),
            ObjectRef::Node(_) => None,
        }
    }

    /// Underlying record of a node or link.
    pub fn raw(&self, id: &str) -> Option<&Record> {
        match self.objects.get(id)? {
            ObjectRef::Node(index) => self.nodes.get(*index).map(|node| &node.data),
            ObjectRef::Link(index) => self.links.get(*index).map(|link| &link.data),
        }
    }

    pub fn link_endpoints(&self, link: &GraphLink) -> Option<(&GraphNode, &GraphNode)> {
        Some((self.node(&link.source)?, self.node(&link.target)?))
    }

    pub fn incident_links<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a GraphLink> {
        self.links.iter().filter(move |link| link.touches(node_id))
    }

    pub fn is_expandable(&self, id: &str) -> bool {
        self.expandable.get(id).copied().unwrap_or(false)
    }

    pub fn expandable(&self) -> &HashMap<String, bool> {
        &self.expandable
    }

    pub fn layout_view(&mut self) -> LayoutView<'_> {
        LayoutView {
            nodes: &mut self.nodes,
            links: &self.links,
            objects: &self.objects,
        }
    }

    /// Applies an expansion delta. Objects already present are skipped, so
    /// merging the same delta twice is harmless.
    pub fn merge(&mut self, delta: GraphDelta) -> (usize, usize) {
        let mut added_nodes = 0;
        let mut added_links = 0;

        for node in delta.nodes {
            if self.objects.contains_key(&node.id) {
                continue;
            }
            self.objects
                .insert(node.id.clone(), ObjectRef::Node(self.nodes.len()));
            self.nodes.push(node);
            added_nodes += 1;
        }

        for link in delta.links {
            if self.objects.contains_key(&link.id)
                || !self.has_node(&link.source)
                || !self.has_node(&link.target)
            {
                continue;
            }
            self.objects
                .insert(link.id.clone(), ObjectRef::Link(self.links.len()));
            self.links.push(link);
            added_links += 1;
        }

        for (id, flag) in delta.expandable {
            if self.has_node(&id) {
                self.expandable.insert(id, flag);
            }
        }

        (added_nodes, added_links)
    }

    /// Removes a node and every link touching it. Returns the node, the
    /// removed links and the ids of the surviving neighbours.
    pub fn remove_node(&mut self, id: &str) -> Option<(GraphNode, Vec<GraphLink>, Vec<String>)> {
        let index = self.node_index(id)?;
        let node = self.nodes.remove(index);
        self.expandable.remove(id);

        let mut removed_links = Vec::new();
        let mut neighbours = HashSet::new();
        self.links.retain(|link| {
            if !link.touches(id) {
                return true;
            }
            if link.source != id {
                neighbours.insert(link.source.clone());
            }
            if link.target != id {
                neighbours.insert(link.target.clone());
            }
            removed_links.push(link.clone());
            false
        });

        self.reindex();
        let mut neighbours = neighbours.into_iter().collect::<Vec<_>>();
        neighbours.sort();
        Some((node, removed_links, neighbours))
    }

    pub fn remove_link(&mut self, id: &str) -> Option<GraphLink> {
        let index = match self.objects.get(id)? {
            ObjectRef::Link(index) => *index,
            ObjectRef::Node(_) => return None,
        };
        let link = self.links.remove(index);
        self.reindex();
        Some(link)
    }

    /// Swaps in a fresher copy of a node's record, keeping its position.
    pub fn replace_node_data(&mut self, id: &str, data: Record) -> bool {
        let Some(index) = self.node_index(id) else {
            return false;
        };
        if record_id(&data) != Some(id) {
            return false;
        }
        self.nodes[index].data = data;
        true
    }

    /// Recomputes the expandable flag of each listed node from its raw record.
    pub fn refresh_expandable<I, S>(&mut self, ids: I, edge_fields: &[String])
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for id in ids {
            let id = id.as_ref();
            let Some(node) = self.node(id) else {
                continue;
            };
            let flag = !unshown_relations(&node.data, edge_fields, |relation| {
                self.contains(relation)
            })
            .is_empty();
            self.expandable.insert(id.to_owned(), flag);
        }
    }

    pub fn refresh_all_expandable(&mut self, edge_fields: &[String]) {
        let ids = self
            .nodes
            .iter()
            .map(|node| node.id.clone())
            .collect::<Vec<_>>();
        self.refresh_expandable(ids, edge_fields);
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.links.clear();
        self.objects.clear();
        self.expandable.clear();
    }

    fn reindex(&mut self) {
        self.objects.clear();
        for (index, node) in self.nodes.iter().enumerate() {
            self.objects.insert(node.id.clone(), ObjectRef::Node(index));
        }
        for (index, link) in self.links.iter().enumerate() {
            self.objects.insert(link.id.clone(), ObjectRef::Link(index));
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn node(id: &str) -> GraphNode {
        let data = json!({"@rid": id}).as_object().cloned().unwrap_or_default();
        GraphNode::new(data, Vec2::ZERO).unwrap()
    }

    fn link(id: &str, source: &str, target: &str) -> GraphLink {
        GraphLink::new(id.to_owned(), Record::new(), source.to_owned(), target.to_owned())
    }

    fn assert_index_consistent(state: &GraphState) {
        let ids = state.object_ids().collect::<HashSet<_>>();
        assert_eq!(ids.len(), state.nodes().len() + state.links().len());
        for node in state.nodes() {
            assert!(state.node(&node.id).is_some());
        }
        for link in state.links() {
            assert!(state.link(&link.id).is_some());
        }
    }

    #[test]
    fn from_parts_drops_duplicates_and_dangling_links() {
        let state = GraphState::from_parts(
            vec![node("a"), node("b"), node("a")],
            vec![link("ab", "a", "b"), link("ac", "a", "c"), link("ab", "b", "a")],
        );

        assert_eq!(state.nodes().len(), 2);
        assert_eq!(state.links().len(), 1);
        assert_index_consistent(&state);
    }

    #[test]
    fn remove_node_takes_incident_links_and_reports_neighbours() {
        let mut state = GraphState::from_parts(
            vec![node("a"), node("b"), node("c")],
            vec![link("ab", "a", "b"), link("bc", "b", "c")],
        );

        let (removed, links, neighbours) = state.remove_node("b").unwrap();
        assert_eq!(removed.id, "b");
        assert_eq!(links.len(), 2);
        assert_eq!(neighbours, vec!["a".to_owned(), "c".to_owned()]);
        assert!(state.links().is_empty());
        assert!(!state.contains("ab"));
        assert_eq!(state.node_index("c"), Some(1));
        assert_index_consistent(&state);
    }

    #[test]
    fn merge_skips_known_objects() {
        let mut state = GraphState::new();
        let delta = GraphDelta {
            nodes: vec![node("a"), node("b")],
            links: vec![link("ab", "a", "b")],
            expandable: BTreeMap::from([("a".to_owned(), true)]),
        };

        assert_eq!(state.merge(delta.clone()), (2, 1));
        assert_eq!(state.merge(delta), (0, 0));
        assert!(state.is_expandable("a"));
        assert_index_consistent(&state);
    }

    #[test]
    fn remove_link_refuses_node_ids() {
        let mut state =
            GraphState::from_parts(vec![node("a"), node("b")], vec![link("ab", "a", "b")]);
        assert!(state.remove_link("a").is_none());
        assert!(state.remove_link("ab").is_some());
        assert!(state.link("ab").is_none());
        assert_index_consistent(&state);
    }
}
