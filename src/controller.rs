//! Single owner of the graph, its indices, the options and the layout.
//!
//! Every gesture the viewer forwards lands here as one method call. Each
//! call leaves the node/link arenas, the expandable flags, the property
//! index, the colour tables and the stored session consistent with each
//! other before it returns.

use std::collections::{HashMap, HashSet};
use std::mem;
use std::sync::Arc;

use eframe::egui::Vec2;
use tracing::{debug, info, warn};

use crate::error::{KbError, StoreError};
use crate::graph::{
    self, ExpansionCandidate, ExpansionSelection, GraphDelta, GraphState, Relation,
    unshown_relations,
};
use crate::kb::{
    Record, RecordCache, RecordLookup, Schema, lookup_path, record_id, scalar_text,
};
use crate::options::{ColorUpdate, GraphOptions, ObjectKind};
use crate::props::PropsMap;
use crate::session::{self, SessionSnapshot};
use crate::sim::{RunHandle, Simulation, SimulationDriver, Viewport};
use crate::store::KeyValueStore;

pub const EMPTY_GRAPH_MESSAGE: &str = "Select a record to visualize";

/// Depth of a user-triggered expansion.
const EXPAND_DEPTH: i32 = 1;
const AUTO_RADIUS_PER_CHAR: f32 = 2.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// User-facing message queued by the controller for the viewer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitOutcome {
    Restored { nodes: usize, links: usize },
    Seeded { nodes: usize, links: usize },
    Empty,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpandSummary {
    pub node_id: String,
    pub nodes_added: usize,
    pub links_added: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExpandRequest {
    NotExpandable,
    Expanded(ExpandSummary),
    /// Too many hidden relations; see [`GraphController::selection`].
    NeedsSelection { candidates: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HideOutcome {
    Hidden { links_removed: usize },
    /// The last node stays; an empty canvas has nothing left to expand from.
    LastNode,
    NotFound,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolutionOutcome {
    Applied,
    Unchanged,
    /// The node was hidden while the record was being fetched.
    Discarded,
    Failed,
}

pub struct GraphController {
    schema: Box<dyn Schema>,
    cache: Arc<RecordCache>,
    store: Box<dyn KeyValueStore>,
    edge_fields: Vec<String>,
    session_id: String,
    state: GraphState,
    props: PropsMap,
    options: GraphOptions,
    driver: SimulationDriver,
    selection: Option<ExpansionSelection>,
    notifications: Vec<Notification>,
    revision: u64,
}

impl GraphController {
    pub fn new(
        schema: Box<dyn Schema>,
        cache: Arc<RecordCache>,
        store: Box<dyn KeyValueStore>,
        session_id: impl Into<String>,
        viewport: Viewport,
    ) -> Self {
        let options = GraphOptions::retrieve(store.as_ref());
        let edge_fields = schema.edge_fields();
        Self {
            schema,
            cache,
            store,
            edge_fields,
            session_id: session_id.into(),
            state: GraphState::new(),
            props: PropsMap::new(options.prop_limits()),
            options,
            driver: SimulationDriver::new(Simulation::new(viewport)),
            selection: None,
            notifications: Vec::new(),
            revision: 0,
        }
    }

    /// Restores the stored session if there is one, otherwise materializes
    /// `seeds`. With neither, the graph stays empty and the viewer is asked
    /// to prompt for a record.
    pub fn initialize(&mut self, seeds: &[Record]) -> InitOutcome {
        self.state.clear();
        self.props = PropsMap::new(self.options.prop_limits());
        self.selection = None;

        if let Some(snapshot) = session::load_session(self.store.as_ref(), &self.session_id)
            && !snapshot.is_empty()
        {
            self.install_snapshot(snapshot);
            info!(
                session_id = %self.session_id,
                nodes = self.state.nodes().len(),
                links = self.state.links().len(),
                "restored graph session"
            );
            return InitOutcome::Restored {
                nodes: self.state.nodes().len(),
                links: self.state.links().len(),
            };
        }

        if seeds.is_empty() {
            self.notify(NotificationLevel::Info, EMPTY_GRAPH_MESSAGE);
            self.after_structure_change();
            return InitOutcome::Empty;
        }

        let delta = graph::materialize(
            &self.state,
            seeds,
            &self.edge_fields,
            self.cache.as_ref(),
            self.center(),
        );
        let (nodes, links) = self.apply_delta(delta);
        info!(nodes, links, "seeded graph");
        InitOutcome::Seeded { nodes, links }
    }

    /// Adds one more record to the canvas, connecting it to anything shown.
    pub fn add_seed(&mut self, record: Record) -> usize {
        let delta = graph::materialize(
            &self.state,
            std::slice::from_ref(&record),
            &self.edge_fields,
            self.cache.as_ref(),
            self.center(),
        );
        self.apply_delta(delta).0
    }

    /// Expands immediately, or stages a selection when the node would fan out
    /// past the configured threshold.
    pub fn request_expand(&mut self, node_id: &str) -> ExpandRequest {
        if !self.state.is_expandable(node_id) {
            return ExpandRequest::NotExpandable;
        }
        let Some(node) = self.state.node(node_id) else {
            return ExpandRequest::NotExpandable;
        };

        let pending = unshown_relations(&node.data, &self.edge_fields, |id| {
            self.state.contains(id)
        });
        if pending.len() > self.options.fan_out_threshold {
            let candidates = pending
                .iter()
                .map(|relation| self.candidate(node_id, relation))
                .collect::<Vec<_>>();
            debug!(
                node_id,
                candidates = candidates.len(),
                "expansion needs a selection"
            );
            let count = candidates.len();
            self.selection = Some(ExpansionSelection::new(node_id, candidates));
            return ExpandRequest::NeedsSelection { candidates: count };
        }

        ExpandRequest::Expanded(self.expand(node_id, &HashSet::new()))
    }

    /// Reveals the hidden neighbours of a node one hop out.
    pub fn expand(&mut self, node_id: &str, exclusions: &HashSet<String>) -> ExpandSummary {
        let delta = graph::expand(
            &self.state,
            node_id,
            EXPAND_DEPTH,
            exclusions,
            &self.edge_fields,
            self.cache.as_ref(),
        );
        let (nodes_added, links_added) = self.apply_delta(delta);
        debug!(node_id, nodes_added, links_added, "expanded node");
        ExpandSummary {
            node_id: node_id.to_owned(),
            nodes_added,
            links_added,
        }
    }

    pub fn selection(&self) -> Option<&ExpansionSelection> {
        self.selection.as_ref()
    }

    pub fn selection_mut(&mut self) -> Option<&mut ExpansionSelection> {
        self.selection.as_mut()
    }

    /// Expands the staged node without the relations the user deselected.
    /// Relations that became pending after the dialog opened were never
    /// offered and stay hidden.
    pub fn commit_selection(&mut self) -> Option<ExpandSummary> {
        let selection = self.selection.take()?;
        let node = self.state.node(selection.node_id())?;
        let offered = selection
            .candidates()
            .iter()
            .map(|candidate| candidate.id.as_str())
            .collect::<HashSet<_>>();
        let mut exclusions = selection.exclusions();
        for relation in unshown_relations(&node.data, &self.edge_fields, |id| {
            self.state.contains(id)
        }) {
            if !offered.contains(relation.id.as_str()) {
                exclusions.insert(relation.id);
            }
        }
        Some(self.expand(selection.node_id(), &exclusions))
    }

    pub fn cancel_selection(&mut self) {
        self.selection = None;
    }

    pub fn hide_node(&mut self, node_id: &str) -> HideOutcome {
        if !self.state.has_node(node_id) {
            return HideOutcome::NotFound;
        }
        if self.state.nodes().len() == 1 {
            self.notify(NotificationLevel::Warning, "Cannot hide the last node in the graph");
            return HideOutcome::LastNode;
        }

        let Some((node, removed_links, neighbours)) = self.state.remove_node(node_id) else {
            return HideOutcome::NotFound;
        };
        if self
            .selection
            .as_ref()
            .is_some_and(|selection| selection.node_id() == node_id)
        {
            self.selection = None;
        }

        self.state.refresh_expandable(&neighbours, &self.edge_fields);
        self.props.remove_node(
            &node.data,
            self.state.nodes().iter().map(|node| &node.data),
            self.schema.node_properties(),
        );
        if let Some(first) = removed_links.first() {
            self.props.remove_link(
                &first.data,
                self.state.links().iter().map(|link| &link.data),
                self.schema.link_properties(),
            );
        }

        debug!(node_id, links = removed_links.len(), "hid node");
        self.after_structure_change();
        HideOutcome::Hidden {
            links_removed: removed_links.len(),
        }
    }

    pub fn hide_link(&mut self, link_id: &str) -> bool {
        let Some(link) = self.state.remove_link(link_id) else {
            return false;
        };

        self.state
            .refresh_expandable([&link.source, &link.target], &self.edge_fields);
        self.props.remove_link(
            &link.data,
            self.state.links().iter().map(|link| &link.data),
            self.schema.link_properties(),
        );

        debug!(link_id, "hid link");
        self.after_structure_change();
        true
    }

    /// Removes everything and forgets the stored session.
    pub fn clear(&mut self) {
        self.state.clear();
        self.props.clear();
        self.selection = None;
        if let Err(error) = session::clear_session(self.store.as_ref(), &self.session_id) {
            warn!(%error, "could not clear graph session");
        }
        self.after_structure_change();
    }

    /// Applies a record fetched in the background for `node_id`.
    pub fn apply_resolution(
        &mut self,
        node_id: &str,
        result: Result<Record, KbError>,
    ) -> ResolutionOutcome {
        if !self.state.has_node(node_id) {
            debug!(node_id, "discarding resolution for hidden node");
            return ResolutionOutcome::Discarded;
        }

        let record = match result {
            Ok(record) => record,
            Err(error) => {
                warn!(node_id, %error, "record resolution failed");
                self.notify(
                    NotificationLevel::Error,
                    format!("Could not load {node_id}: {error}"),
                );
                return ResolutionOutcome::Failed;
            }
        };

        self.cache.insert(record.clone());
        if self.state.raw(node_id) == Some(&record) {
            return ResolutionOutcome::Unchanged;
        }
        if !self.state.replace_node_data(node_id, record) {
            return ResolutionOutcome::Discarded;
        }

        self.state.refresh_expandable([node_id], &self.edge_fields);
        self.rebuild_node_props();
        self.after_structure_change();
        ResolutionOutcome::Applied
    }

    /// Edits options, then recolours, relayouts and persists them.
    pub fn update_options<F>(&mut self, edit: F)
    where
        F: FnOnce(&mut GraphOptions),
    {
        let before = self.options.clone();
        edit(&mut self.options);
        if self.options == before {
            return;
        }

        if self.options.prop_limits() != before.prop_limits() {
            self.props = PropsMap::new(self.options.prop_limits());
            self.rebuild_node_props();
            self.rebuild_link_props();
        }
        self.update_colors(ObjectKind::Nodes);
        self.update_colors(ObjectKind::Links);
        self.persist_options();
        self.reconfigure_simulation();
        self.revision += 1;
    }

    /// Reassigns palette colours for one kind from what is currently shown.
    pub fn update_colors(&mut self, kind: ObjectKind) -> ColorUpdate {
        let update = match kind {
            ObjectKind::Nodes => self.options.update_colors(
                kind,
                self.state.nodes().iter().map(|node| &node.data),
                &self.props,
            ),
            ObjectKind::Links => self.options.update_colors(
                kind,
                self.state.links().iter().map(|link| &link.data),
                &self.props,
            ),
        };

        if let ColorUpdate::Overflow { property, distinct } = &update {
            self.notify(
                NotificationLevel::Warning,
                format!(
                    "Too many distinct values of {property} ({distinct}) to colour {} by",
                    kind.label()
                ),
            );
            self.persist_options();
        }
        update
    }

    pub fn start_simulation(&mut self) -> RunHandle {
        self.reconfigure_simulation();
        self.driver.start()
    }

    pub fn stop_simulation(&mut self) {
        self.driver.stop();
    }

    pub fn tick(&mut self) -> bool {
        self.driver.tick(&mut self.state.layout_view())
    }

    pub fn resize(&mut self, viewport: Viewport) -> bool {
        if !self.driver.resize(viewport) {
            return false;
        }
        self.reconfigure_simulation();
        true
    }

    pub fn drag_start(&mut self, node_id: &str) -> bool {
        self.driver
            .simulation_mut()
            .drag_start(&mut self.state.layout_view(), node_id)
    }

    pub fn drag_to(&mut self, node_id: &str, position: Vec2) -> bool {
        self.driver
            .simulation_mut()
            .drag_to(&mut self.state.layout_view(), node_id, position)
    }

    pub fn drag_end(&mut self, node_id: &str) -> bool {
        let released = self
            .driver
            .simulation_mut()
            .drag_end(&mut self.state.layout_view(), node_id);
        if released {
            self.persist_session();
        }
        released
    }

    pub fn save_session(&self) -> Result<(), StoreError> {
        session::save_session(self.store.as_ref(), &self.session_id, &self.state)
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        mem::take(&mut self.notifications)
    }

    pub fn node_label(&self, node_id: &str) -> String {
        let Some(node) = self.state.node(node_id) else {
            return node_id.to_owned();
        };
        let property = &self.options.node_label_prop;
        if !property.is_empty()
            && let Some(text) = lookup_path(&node.data, property).and_then(scalar_text)
        {
            return text;
        }
        self.schema.preview(&node.data)
    }

    /// Link caption, only when a link label property is selected.
    pub fn link_label(&self, link_id: &str) -> Option<String> {
        let property = &self.options.link_label_prop;
        if property.is_empty() {
            return None;
        }
        let link = self.state.link(link_id)?;
        lookup_path(&link.data, property).and_then(scalar_text)
    }

    pub fn node_color(&self, node_id: &str) -> &str {
        self.state
            .node(node_id)
            .and_then(|node| self.options.get_color(&node.data, ObjectKind::Nodes))
            .unwrap_or(self.options.default_color.as_str())
    }

    pub fn link_color(&self, link_id: &str) -> &str {
        self.state
            .link(link_id)
            .and_then(|link| self.options.get_color(&link.data, ObjectKind::Links))
            .unwrap_or(self.options.default_color.as_str())
    }

    /// Value and colour pairs for the legend of `kind`, in value order.
    pub fn legend(&self, kind: ObjectKind) -> Vec<(String, String)> {
        if !self.options.legend_visible(kind) || self.options.color_prop(kind).is_empty() {
            return Vec::new();
        }
        self.options
            .colors(kind)
            .iter()
            .map(|(value, color)| (value.clone(), color.clone()))
            .collect()
    }

    /// Edge records stored on a node whose links are not shown.
    pub fn hidden_edge_count(&self, node_id: &str) -> usize {
        let Some(node) = self.state.node(node_id) else {
            return 0;
        };
        self.schema
            .edges_of(&node.data)
            .into_iter()
            .filter_map(record_id)
            .filter(|id| !self.state.contains(id))
            .count()
    }

    pub fn preview(&self, record: &Record) -> String {
        self.schema.preview(record)
    }

    pub fn schema(&self) -> &dyn Schema {
        self.schema.as_ref()
    }

    pub fn cache(&self) -> &Arc<RecordCache> {
        &self.cache
    }

    pub fn state(&self) -> &GraphState {
        &self.state
    }

    pub fn props(&self) -> &PropsMap {
        &self.props
    }

    pub fn options(&self) -> &GraphOptions {
        &self.options
    }

    pub fn simulation(&self) -> &Simulation {
        self.driver.simulation()
    }

    pub fn listener_count(&self) -> usize {
        self.driver.listener_count()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Bumped on every structural or option change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn center(&self) -> Vec2 {
        self.driver.simulation().viewport().center()
    }

    fn candidate(&self, node_id: &str, relation: &Relation<'_>) -> ExpansionCandidate {
        let other = relation.other_end(node_id);
        let incoming = relation
            .into
            .is_some_and(|endpoint| endpoint.id == node_id)
            && !relation.is_synthetic();

        let name = self
            .schema
            .class_info(&relation.class)
            .and_then(|info| if incoming { info.reverse_name } else { Some(info.name) })
            .unwrap_or_else(|| relation.class.clone());
        let target = match other {
            Some(endpoint) => endpoint
                .record
                .cloned()
                .or_else(|| self.cache.peek(endpoint.id))
                .map(|record| self.schema.preview(&record))
                .unwrap_or_else(|| endpoint.id.to_owned()),
            None => "?".to_owned(),
        };

        ExpansionCandidate {
            id: relation.id.clone(),
            class: relation.class.clone(),
            label: format!("{name} {target}"),
        }
    }

    fn apply_delta(&mut self, delta: GraphDelta) -> (usize, usize) {
        if delta.is_empty() {
            return (0, 0);
        }

        let new_nodes = delta
            .nodes
            .iter()
            .filter(|node| !self.state.contains(&node.id))
            .map(|node| node.data.clone())
            .collect::<Vec<_>>();
        let new_links = delta
            .links
            .iter()
            .filter(|link| !self.state.contains(&link.id))
            .map(|link| link.data.clone())
            .collect::<Vec<_>>();

        let added = self.state.merge(delta);
        for record in &new_nodes {
            self.props.load_node(record, self.schema.node_properties());
        }
        for record in &new_links {
            self.props.load_link(record, self.schema.link_properties());
        }

        self.after_structure_change();
        added
    }

    fn install_snapshot(&mut self, snapshot: SessionSnapshot) {
        self.state = snapshot.restore();
        self.props = PropsMap::new(self.options.prop_limits());
        self.state.refresh_all_expandable(&self.edge_fields);
        self.rebuild_node_props();
        self.rebuild_link_props();
        self.after_structure_change();
    }

    fn rebuild_node_props(&mut self) {
        self.props.rebuild(
            ObjectKind::Nodes,
            self.state.nodes().iter().map(|node| &node.data),
            self.schema.node_properties(),
        );
    }

    fn rebuild_link_props(&mut self) {
        self.props.rebuild(
            ObjectKind::Links,
            self.state.links().iter().map(|link| &link.data),
            self.schema.link_properties(),
        );
    }

    fn after_structure_change(&mut self) {
        self.update_colors(ObjectKind::Nodes);
        self.update_colors(ObjectKind::Links);
        self.reconfigure_simulation();
        self.persist_session();
        self.revision += 1;
    }

    fn reconfigure_simulation(&mut self) {
        let radii = if self.options.auto_collision_radius {
            self.state
                .nodes()
                .iter()
                .map(|node| {
                    let chars = self.node_label(&node.id).chars().count() as f32;
                    let radius = (chars * AUTO_RADIUS_PER_CHAR).max(self.options.collision_radius);
                    (node.id.clone(), radius)
                })
                .collect()
        } else {
            HashMap::new()
        };
        let simulation = self.driver.simulation_mut();
        simulation.configure(&self.options, &self.state, radii);
    }

    fn persist_session(&mut self) {
        if let Err(error) = self.save_session() {
            warn!(%error, "could not save graph session");
            self.notify(NotificationLevel::Warning, format!("Session not saved: {error}"));
        }
    }

    fn persist_options(&mut self) {
        if let Err(error) = self.options.persist(self.store.as_ref()) {
            warn!(%error, "could not save graph options");
            self.notify(NotificationLevel::Warning, format!("Options not saved: {error}"));
        }
    }

    fn notify(&mut self, level: NotificationLevel, message: impl Into<String>) {
        self.notifications.push(Notification {
            level,
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use serde_json::{Value, json};

    use super::*;
    use crate::kb::{KnowledgeBase, parse_knowledgebase};
    use crate::options::OPTIONS_KEY;
    use crate::store::MemoryStore;

    fn vertex(id: &str, name: &str) -> Value {
        json!({"@rid": id, "@class": "Disease", "name": name})
    }

    fn edge(id: &str, class: &str, out: &str, into: &str) -> Value {
        json!({"@rid": id, "@class": class, "out": out, "in": into})
    }

    fn knowledgebase(records: Vec<Value>) -> Arc<KnowledgeBase> {
        let raw = json!({ "records": records }).to_string();
        Arc::new(parse_knowledgebase(&raw).unwrap())
    }

    fn disease_kb() -> Arc<KnowledgeBase> {
        knowledgebase(vec![
            vertex("#1:0", "cancer"),
            vertex("#1:1", "carcinoma"),
            vertex("#1:2", "adenocarcinoma"),
            vertex("#1:3", "tumour"),
            vertex("#2:0", "kras"),
            vertex("#2:1", "kras2"),
            edge("#9:0", "SubClassOf", "#1:1", "#1:0"),
            edge("#9:1", "SubClassOf", "#1:2", "#1:1"),
            edge("#9:2", "AliasOf", "#1:0", "#1:3"),
            edge("#9:5", "AliasOf", "#2:0", "#2:1"),
        ])
    }

    fn controller(kb: &Arc<KnowledgeBase>, store: &Rc<MemoryStore>) -> GraphController {
        let cache = Arc::new(RecordCache::new(kb.clone()));
        cache.preload(kb.records().cloned());
        GraphController::new(
            Box::new(kb.schema().clone()),
            cache,
            Box::new(Rc::clone(store)),
            "test",
            Viewport::default(),
        )
    }

    fn seeds(kb: &KnowledgeBase, ids: &[&str]) -> Vec<Record> {
        ids.iter()
            .filter_map(|id| kb.record(id).cloned())
            .collect()
    }

    fn assert_unique_ids(state: &GraphState) {
        let mut ids = HashSet::new();
        for id in state
            .nodes()
            .iter()
            .map(|node| &node.id)
            .chain(state.links().iter().map(|link| &link.id))
        {
            assert!(ids.insert(id.clone()), "duplicate id {id}");
        }
    }

    #[test]
    fn nothing_to_show_asks_for_a_record() {
        let kb = disease_kb();
        let store = Rc::new(MemoryStore::default());
        let mut graph = controller(&kb, &store);

        assert_eq!(graph.initialize(&[]), InitOutcome::Empty);
        let notifications = graph.take_notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].message, EMPTY_GRAPH_MESSAGE);
        assert!(graph.state().is_empty());
    }

    #[test]
    fn disjoint_seeds_add_nodes_only() {
        let kb = disease_kb();
        let store = Rc::new(MemoryStore::default());
        let mut graph = controller(&kb, &store);

        let outcome = graph.initialize(&seeds(&kb, &["#1:0", "#1:2", "#2:0"]));
        assert_eq!(outcome, InitOutcome::Seeded { nodes: 3, links: 0 });
        assert!(graph.state().is_expandable("#1:0"));
        assert!(graph.state().is_expandable("#2:0"));
    }

    #[test]
    fn repeated_expansion_adds_nothing_new() {
        let kb = disease_kb();
        let store = Rc::new(MemoryStore::default());
        let mut graph = controller(&kb, &store);
        graph.initialize(&seeds(&kb, &["#1:0"]));

        let first = graph.expand("#1:0", &HashSet::new());
        assert_eq!((first.nodes_added, first.links_added), (2, 2));
        let second = graph.expand("#1:0", &HashSet::new());
        assert_eq!((second.nodes_added, second.links_added), (0, 0));
        assert_eq!(graph.add_seed(seeds(&kb, &["#1:0"]).remove(0)), 0);
        assert_unique_ids(graph.state());
    }

    #[test]
    fn expanding_between_shown_nodes_adds_one_link() {
        let kb = disease_kb();
        let store = Rc::new(MemoryStore::default());
        let mut graph = controller(&kb, &store);
        graph.initialize(&seeds(&kb, &["#2:0", "#2:1"]));
        assert!(graph.state().link("#9:5").is_some());

        assert!(graph.hide_link("#9:5"));
        assert!(graph.state().is_expandable("#2:0"));
        assert!(graph.state().is_expandable("#2:1"));

        let summary = graph.expand("#2:0", &HashSet::new());
        assert_eq!(summary.nodes_added, 0);
        assert_eq!(summary.links_added, 1);
        assert!(!graph.state().is_expandable("#2:1"));
        assert!(!graph.state().is_expandable("#2:0"));
    }

    #[test]
    fn expandable_flags_match_hidden_relations() {
        let kb = disease_kb();
        let store = Rc::new(MemoryStore::default());
        let mut graph = controller(&kb, &store);
        graph.initialize(&seeds(&kb, &["#1:1"]));
        graph.expand("#1:1", &HashSet::new());

        let fields = kb.schema().edge_fields();
        for node in graph.state().nodes() {
            let hidden = unshown_relations(&node.data, &fields, |id| graph.state().contains(id));
            assert_eq!(graph.state().is_expandable(&node.id), !hidden.is_empty(), "{}", node.id);
        }
        assert!(graph.state().is_expandable("#1:0"));
        assert!(!graph.state().is_expandable("#1:2"));
    }

    #[test]
    fn wide_nodes_route_through_the_selection() {
        let mut records = vec![vertex("#3:0", "hub")];
        for index in 1..=11 {
            records.push(vertex(&format!("#3:{index}"), &format!("leaf {index}")));
            records.push(edge(&format!("#8:{index}"), "AliasOf", "#3:0", &format!("#3:{index}")));
        }
        let kb = knowledgebase(records);
        let store = Rc::new(MemoryStore::default());
        let mut graph = controller(&kb, &store);
        graph.initialize(&seeds(&kb, &["#3:0"]));

        assert_eq!(
            graph.request_expand("#3:0"),
            ExpandRequest::NeedsSelection { candidates: 11 }
        );
        assert_eq!(graph.state().nodes().len(), 1);

        let selection = graph.selection_mut().unwrap();
        assert_eq!(selection.candidates().len(), 11);
        assert!(selection.candidates()[0].label.starts_with("AliasOf leaf"));
        selection.toggle("#8:4");

        let summary = graph.commit_selection().unwrap();
        assert_eq!((summary.nodes_added, summary.links_added), (10, 10));
        assert!(graph.selection().is_none());
        assert!(graph.state().link("#8:4").is_none());
        assert!(graph.state().is_expandable("#3:0"));

        match graph.request_expand("#3:0") {
            ExpandRequest::Expanded(summary) => assert_eq!(summary.links_added, 1),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(graph.request_expand("#3:0"), ExpandRequest::NotExpandable);
    }

    #[test]
    fn relations_hidden_after_staging_stay_hidden() {
        let mut records = vec![vertex("#3:0", "hub")];
        for index in 1..=12 {
            records.push(vertex(&format!("#3:{index}"), &format!("leaf {index}")));
            records.push(edge(&format!("#8:{index}"), "AliasOf", "#3:0", &format!("#3:{index}")));
        }
        let kb = knowledgebase(records);
        let store = Rc::new(MemoryStore::default());
        let mut graph = controller(&kb, &store);
        graph.initialize(&seeds(&kb, &["#3:0", "#3:12"]));
        assert!(graph.state().link("#8:12").is_some());

        assert_eq!(
            graph.request_expand("#3:0"),
            ExpandRequest::NeedsSelection { candidates: 11 }
        );
        assert!(graph.hide_link("#8:12"));
        graph.selection_mut().unwrap().exclude_all();

        let summary = graph.commit_selection().unwrap();
        assert_eq!((summary.nodes_added, summary.links_added), (0, 0));
        assert!(graph.state().link("#8:12").is_none());
        assert_eq!(graph.state().nodes().len(), 2);
    }

    #[test]
    fn hiding_a_node_drops_its_links_and_reindexes() {
        let kb = disease_kb();
        let store = Rc::new(MemoryStore::default());
        let mut graph = controller(&kb, &store);
        graph.initialize(&seeds(&kb, &["#1:0", "#1:1", "#1:2"]));
        assert_eq!(graph.state().links().len(), 2);
        assert!(!graph.state().is_expandable("#1:2"));

        assert_eq!(graph.hide_node("#1:1"), HideOutcome::Hidden { links_removed: 2 });
        assert!(graph.state().links().is_empty());
        assert!(graph.state().is_expandable("#1:2"));
        assert!(!graph.state().contains("#9:0"));

        let names = match graph.props().node_props().get("name") {
            Some(crate::props::PropValues::Values(values)) => values.clone(),
            _ => panic!("name should stay enumerable"),
        };
        assert!(!names.contains("carcinoma"));

        assert_eq!(graph.hide_node("#1:1"), HideOutcome::NotFound);
        assert_eq!(graph.hide_node("#1:0"), HideOutcome::Hidden { links_removed: 0 });
        assert_eq!(graph.hide_node("#1:2"), HideOutcome::LastNode);
        assert_eq!(graph.state().nodes().len(), 1);
    }

    #[test]
    fn resolutions_for_hidden_nodes_are_discarded() {
        let kb = disease_kb();
        let store = Rc::new(MemoryStore::default());
        let mut graph = controller(&kb, &store);
        graph.initialize(&seeds(&kb, &["#1:0", "#1:3"]));
        graph.take_notifications();

        let mut richer = kb.record("#1:0").cloned().unwrap();
        richer.insert("name".to_owned(), json!("malignant neoplasm"));
        assert_eq!(
            graph.apply_resolution("#1:0", Ok(richer.clone())),
            ResolutionOutcome::Applied
        );
        assert_eq!(graph.node_label("#1:0"), "malignant neoplasm");
        assert_eq!(
            graph.apply_resolution("#1:0", Ok(richer)),
            ResolutionOutcome::Unchanged
        );

        graph.hide_node("#1:3");
        let late = kb.record("#1:3").cloned().unwrap();
        assert_eq!(
            graph.apply_resolution("#1:3", Ok(late)),
            ResolutionOutcome::Discarded
        );

        let failed = graph.apply_resolution(
            "#1:0",
            Err(KbError::RecordNotFound("#1:0".to_owned())),
        );
        assert_eq!(failed, ResolutionOutcome::Failed);
        let notifications = graph.take_notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].level, NotificationLevel::Error);
        assert_eq!(graph.node_label("#1:0"), "malignant neoplasm");
    }

    #[test]
    fn sessions_restore_before_seeds() {
        let kb = disease_kb();
        let store = Rc::new(MemoryStore::default());
        let mut first = controller(&kb, &store);
        first.initialize(&seeds(&kb, &["#1:0"]));
        first.expand("#1:0", &HashSet::new());
        let position = first.state().node("#1:3").unwrap().position();

        let mut second = controller(&kb, &store);
        let outcome = second.initialize(&seeds(&kb, &["#2:0"]));
        assert_eq!(outcome, InitOutcome::Restored { nodes: 3, links: 2 });
        assert!(!second.state().has_node("#2:0"));
        assert_eq!(second.state().node("#1:3").unwrap().position(), position);
        assert!(second.state().is_expandable("#1:1"));
        assert!(!second.state().is_expandable("#1:3"));
    }

    #[test]
    fn hidden_edges_track_what_is_shown() {
        let kb = disease_kb();
        let store = Rc::new(MemoryStore::default());
        let mut graph = controller(&kb, &store);
        graph.initialize(&seeds(&kb, &["#1:0"]));
        assert_eq!(graph.hidden_edge_count("#1:0"), 2);

        graph.expand("#1:0", &HashSet::new());
        assert_eq!(graph.hidden_edge_count("#1:0"), 0);
        assert!(!graph.state().is_expandable("#1:0"));
        assert_eq!(graph.hidden_edge_count("#1:1"), 1);
        assert!(graph.state().is_expandable("#1:1"));
        assert_eq!(graph.hidden_edge_count("missing"), 0);
    }

    #[test]
    fn colouring_by_a_wide_property_is_abandoned_once() {
        let records = (0..21)
            .map(|index| vertex(&format!("#4:{index}"), &format!("disease {index}")))
            .collect::<Vec<_>>();
        let kb = knowledgebase(records);
        let store = Rc::new(MemoryStore::default());
        let mut graph = controller(&kb, &store);
        let all = kb.records().cloned().collect::<Vec<_>>();
        graph.initialize(&all);
        graph.take_notifications();

        graph.update_options(|options| options.nodes_color = "name".to_owned());
        assert!(graph.options().nodes_color.is_empty());
        assert!(graph.legend(ObjectKind::Nodes).is_empty());
        let notifications = graph.take_notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].level, NotificationLevel::Warning);
        assert_eq!(graph.node_color("#4:0"), graph.options().default_color);

        let stored = GraphOptions::retrieve(store.as_ref());
        assert!(stored.nodes_color.is_empty());
        assert!(store.get(OPTIONS_KEY).unwrap().is_some());
    }

    #[test]
    fn class_colours_and_legend_follow_the_graph() {
        let kb = disease_kb();
        let store = Rc::new(MemoryStore::default());
        let mut graph = controller(&kb, &store);
        graph.initialize(&seeds(&kb, &["#1:0", "#1:1"]));

        let legend = graph.legend(ObjectKind::Nodes);
        assert_eq!(legend.len(), 1);
        assert_eq!(legend[0].0, "Disease");
        assert_eq!(graph.node_color("#1:0"), legend[0].1);
        assert_eq!(graph.link_color("#9:0"), graph.options().default_color);
        assert_eq!(graph.link_label("#9:0"), None);

        graph.update_options(|options| {
            options.links_color = "@class".to_owned();
            options.link_label_prop = "@class".to_owned();
        });
        assert_ne!(graph.link_color("#9:0"), graph.options().default_color);
        assert_eq!(graph.link_label("#9:0").as_deref(), Some("SubClassOf"));
    }

    #[test]
    fn simulation_runs_are_scoped() {
        let kb = disease_kb();
        let store = Rc::new(MemoryStore::default());
        let mut graph = controller(&kb, &store);
        graph.initialize(&seeds(&kb, &["#1:0", "#1:1", "#1:2"]));

        assert!(!graph.tick());
        let first = graph.start_simulation();
        let second = graph.start_simulation();
        assert!(!first.is_attached());
        assert_eq!(graph.listener_count(), 2);
        assert!(graph.tick());

        assert!(graph.drag_start("#1:1"));
        assert!(graph.drag_to("#1:1", eframe::egui::vec2(5.0, 5.0)));
        graph.tick();
        assert_eq!(graph.state().node("#1:1").unwrap().position(), eframe::egui::vec2(5.0, 5.0));
        assert!(graph.drag_end("#1:1"));

        assert!(graph.resize(Viewport::new(400.0, 300.0)));
        assert!(!graph.resize(Viewport::new(400.0, 300.0)));

        assert!(second.dispose());
        assert_eq!(graph.listener_count(), 0);
        assert!(!graph.tick());
    }

    #[test]
    fn stopped_layout_still_follows_drags_and_resizes() {
        let kb = disease_kb();
        let store = Rc::new(MemoryStore::default());
        let mut graph = controller(&kb, &store);
        graph.initialize(&seeds(&kb, &["#1:0", "#1:1"]));
        let _run = graph.start_simulation();
        graph.stop_simulation();
        assert_eq!(graph.listener_count(), 0);

        assert!(graph.drag_start("#1:0"));
        assert!(graph.drag_to("#1:0", eframe::egui::vec2(5.0, 5.0)));
        assert!(!graph.tick());
        assert_eq!(graph.state().node("#1:0").unwrap().position(), eframe::egui::vec2(5.0, 5.0));
        assert!(graph.drag_end("#1:0"));

        assert!(graph.resize(Viewport::new(400.0, 300.0)));
        assert_eq!(graph.simulation().viewport(), Viewport::new(400.0, 300.0));
        assert_eq!(graph.listener_count(), 0);

        let record = kb.record("#2:0").cloned().unwrap();
        assert_eq!(graph.add_seed(record), 1);
        assert_eq!(
            graph.state().node("#2:0").unwrap().position(),
            eframe::egui::vec2(200.0, 150.0)
        );
    }

    #[test]
    fn tree_layout_uses_is_a_depths() {
        let kb = disease_kb();
        let store = Rc::new(MemoryStore::default());
        let mut graph = controller(&kb, &store);
        graph.initialize(&seeds(&kb, &["#1:0", "#1:1", "#1:2", "#1:3"]));
        graph.update_options(|options| options.is_tree_layout = true);

        let simulation = graph.simulation();
        assert_eq!(simulation.depth_of("#1:2"), Some(0));
        assert_eq!(simulation.depth_of("#1:1"), Some(1));
        assert_eq!(simulation.depth_of("#1:0"), Some(2));
        assert_eq!(simulation.depth_of("#1:3"), None);
        assert!(GraphOptions::retrieve(store.as_ref()).is_tree_layout);
    }
}
