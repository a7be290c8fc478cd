use std::collections::{HashSet, VecDeque};

use eframe::egui::Vec2;
use tracing::debug;

use crate::kb::{Record, RecordLookup, record_id};
use crate::util::{CHILD_ORBIT, orbit_position, seed_position};

use super::relations::{relations_of, unshown_relations};
use super::{GraphDelta, GraphLink, GraphNode, GraphState};

struct Visit {
    id: String,
    record: Record,
    position: Vec2,
    depth: i32,
}

/// Breadth-first materialization over an immutable [`GraphState`].
///
/// A relation is materialized only when both endpoints resolve and either
/// the visit still has depth budget or the far endpoint is already shown.
/// The resulting [`GraphDelta`] carries fresh expandable flags for every node
/// whose neighbourhood it touched.
pub struct Expansion<'a> {
    state: &'a GraphState,
    lookup: &'a dyn RecordLookup,
    edge_fields: &'a [String],
    exclusions: &'a HashSet<String>,
    added: HashSet<String>,
    touched: Vec<String>,
    touched_set: HashSet<String>,
    queue: VecDeque<Visit>,
    delta: GraphDelta,
}

impl<'a> Expansion<'a> {
    pub fn new(
        state: &'a GraphState,
        lookup: &'a dyn RecordLookup,
        edge_fields: &'a [String],
        exclusions: &'a HashSet<String>,
    ) -> Self {
        Self {
            state,
            lookup,
            edge_fields,
            exclusions,
            added: HashSet::new(),
            touched: Vec::new(),
            touched_set: HashSet::new(),
            queue: VecDeque::new(),
            delta: GraphDelta::default(),
        }
    }

    /// Queues a record for traversal, creating its node if it is not shown yet.
    pub fn seed(&mut self, record: Record, position: Vec2, depth: i32) {
        let Some(id) = record_id(&record).map(str::to_owned) else {
            debug!("ignoring seed without @rid");
            return;
        };
        if !self.is_present(&id) {
            self.add_node(record.clone(), position);
        }
        self.queue.push_back(Visit {
            id,
            record,
            position,
            depth,
        });
    }

    pub fn run(mut self) -> GraphDelta {
        while let Some(visit) = self.queue.pop_front() {
            self.visit(visit);
        }
        self.finish()
    }

    fn is_present(&self, id: &str) -> bool {
        self.state.contains(id) || self.added.contains(id)
    }

    fn add_node(&mut self, record: Record, position: Vec2) {
        if let Some(node) = GraphNode::new(record, position) {
            self.added.insert(node.id.clone());
            self.touch(&node.id);
            self.delta.nodes.push(node);
        }
    }

    fn touch(&mut self, id: &str) {
        if self.touched_set.insert(id.to_owned()) {
            self.touched.push(id.to_owned());
        }
    }

    fn visit(&mut self, visit: Visit) {
        self.touch(&visit.id);

        for relation in relations_of(&visit.record, self.edge_fields) {
            if self.is_present(&relation.id) || self.exclusions.contains(&relation.id) {
                continue;
            }
            let Some((out, into)) = relation.endpoints() else {
                continue;
            };
            if out.id != visit.id && into.id != visit.id {
                continue;
            }

            let other = if into.id == visit.id { out } else { into };
            let other_present = self.is_present(other.id);
            if visit.depth <= 0 && !other_present {
                continue;
            }

            if !other_present {
                let Some(record) = self
                    .lookup
                    .peek(other.id)
                    .or_else(|| other.record.cloned())
                else {
                    debug!(id = other.id, "endpoint not resolvable, leaving relation hidden");
                    continue;
                };
                let position =
                    orbit_position(visit.position, relation.slot, relation.slots, CHILD_ORBIT);
                self.add_node(record.clone(), position);
                self.queue.push_back(Visit {
                    id: other.id.to_owned(),
                    record,
                    position,
                    depth: visit.depth - 1,
                });
            }

            self.added.insert(relation.id.clone());
            self.delta.links.push(GraphLink::new(
                relation.id.clone(),
                relation.link_data(),
                out.id.to_owned(),
                into.id.to_owned(),
            ));
            self.touch(out.id);
            self.touch(into.id);
        }
    }

    fn finish(mut self) -> GraphDelta {
        for id in &self.touched {
            let record = self
                .delta
                .nodes
                .iter()
                .find(|node| &node.id == id)
                .or_else(|| self.state.node(id))
                .map(|node| &node.data);
            let Some(record) = record else {
                continue;
            };
            let pending = unshown_relations(record, self.edge_fields, |relation| {
                self.state.contains(relation) || self.added.contains(relation)
            });
            self.delta.expandable.insert(id.clone(), !pending.is_empty());
        }

        debug!(
            nodes = self.delta.nodes.len(),
            links = self.delta.links.len(),
            "expansion finished"
        );
        self.delta
    }
}

/// Places `seeds` around `center` and materializes them without depth budget:
/// only relations between seeds and already shown nodes appear.
pub fn materialize(
    state: &GraphState,
    seeds: &[Record],
    edge_fields: &[String],
    lookup: &dyn RecordLookup,
    center: Vec2,
) -> GraphDelta {
    let exclusions = HashSet::new();
    let mut expansion = Expansion::new(state, lookup, edge_fields, &exclusions);
    let count = seeds.len();
    for (index, record) in seeds.iter().enumerate() {
        let id = record_id(record).unwrap_or_default();
        let position = state
            .node(id)
            .map(GraphNode::position)
            .unwrap_or_else(|| seed_position(center, id, index, count));
        expansion.seed(record.clone(), position, 0);
    }
    expansion.run()
}

/// Expands a shown node by `depth` hops, skipping excluded relation ids.
pub fn expand(
    state: &GraphState,
    node_id: &str,
    depth: i32,
    exclusions: &HashSet<String>,
    edge_fields: &[String],
    lookup: &dyn RecordLookup,
) -> GraphDelta {
    let Some(node) = state.node(node_id) else {
        return GraphDelta::default();
    };
    let mut expansion = Expansion::new(state, lookup, edge_fields, exclusions);
    expansion.seed(node.data.clone(), node.position(), depth);
    expansion.run()
}
