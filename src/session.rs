//! Snapshots of the materialized graph keyed by a session id.
//!
//! Links are stored with plain endpoint ids; restoring goes back through
//! [`GraphState::from_parts`], which resolves them against the stored nodes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::graph::{GraphLink, GraphNode, GraphState};
use crate::store::KeyValueStore;

pub const SESSION_PREFIX: &str = "graph-session:";

pub fn session_key(session_id: &str) -> String {
    format!("{SESSION_PREFIX}{session_id}")
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
    /// Raw record of every node and link, by id.
    pub graph_objects: BTreeMap<String, Value>,
}

impl SessionSnapshot {
    pub fn capture(state: &GraphState) -> Self {
        let mut graph_objects = BTreeMap::new();
        for node in state.nodes() {
            graph_objects.insert(node.id.clone(), Value::Object(node.data.clone()));
        }
        for link in state.links() {
            graph_objects.insert(link.id.clone(), Value::Object(link.data.clone()));
        }
        Self {
            nodes: state.nodes().to_vec(),
            links: state.links().to_vec(),
            graph_objects,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Rehydrates a graph. Expandable flags are left for the caller.
    pub fn restore(self) -> GraphState {
        let Self {
            mut nodes,
            mut links,
            graph_objects,
        } = self;

        // The index may carry a fresher record than the node itself.
        for node in &mut nodes {
            if let Some(Value::Object(data)) = graph_objects.get(&node.id) {
                node.data = data.clone();
            }
        }
        for link in &mut links {
            if let Some(Value::Object(data)) = graph_objects.get(&link.id) {
                link.data = data.clone();
            }
        }
        GraphState::from_parts(nodes, links)
    }
}

pub fn save_session(
    store: &dyn KeyValueStore,
    session_id: &str,
    state: &GraphState,
) -> Result<(), StoreError> {
    let snapshot = SessionSnapshot::capture(state);
    store.set(&session_key(session_id), &serde_json::to_string(&snapshot)?)?;
    debug!(
        session_id,
        nodes = snapshot.nodes.len(),
        links = snapshot.links.len(),
        "saved graph session"
    );
    Ok(())
}

/// Loads a stored snapshot. Missing, unreadable and corrupt documents all
/// read as no snapshot.
pub fn load_session(store: &dyn KeyValueStore, session_id: &str) -> Option<SessionSnapshot> {
    let raw = match store.get(&session_key(session_id)) {
        Ok(raw) => raw?,
        Err(error) => {
            warn!(session_id, %error, "could not read graph session");
            return None;
        }
    };

    match serde_json::from_str::<SessionSnapshot>(&raw) {
        Ok(snapshot) => Some(snapshot),
        Err(error) => {
            warn!(session_id, %error, "discarding corrupt graph session");
            None
        }
    }
}

pub fn clear_session(store: &dyn KeyValueStore, session_id: &str) -> Result<(), StoreError> {
    store.remove(&session_key(session_id))
}

#[cfg(test)]
mod tests {
    use eframe::egui::vec2;
    use serde_json::json;

    use super::*;
    use crate::graph::GraphDelta;
    use crate::kb::Record;
    use crate::store::MemoryStore;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap_or_default()
    }

    fn sample_state() -> GraphState {
        let mut state = GraphState::new();
        let a = GraphNode::new(record(json!({"@rid": "#1:0", "name": "a"})), vec2(10.0, 20.0)).unwrap();
        let b = GraphNode::new(record(json!({"@rid": "#1:1", "name": "b"})), vec2(-5.0, 3.5)).unwrap();
        let link = GraphLink::new(
            "#9:0".to_owned(),
            record(json!({"@rid": "#9:0", "@class": "SubClassOf"})),
            "#1:0".to_owned(),
            "#1:1".to_owned(),
        );
        state.merge(GraphDelta {
            nodes: vec![a, b],
            links: vec![link],
            ..GraphDelta::default()
        });
        state
    }

    #[test]
    fn round_trip_resolves_link_endpoints_to_nodes() {
        let store = MemoryStore::default();
        let state = sample_state();
        save_session(&store, "abc", &state).unwrap();

        let restored = load_session(&store, "abc").unwrap().restore();
        assert_eq!(restored.nodes().len(), 2);
        let link = restored.link("#9:0").unwrap();
        let (source, target) = restored.link_endpoints(link).unwrap();
        assert_eq!(source.id, "#1:0");
        assert_eq!(target.id, "#1:1");
        assert_eq!(source.position(), vec2(10.0, 20.0));
        assert_eq!(target.data.get("name"), Some(&json!("b")));
    }

    #[test]
    fn stored_links_use_plain_ids() {
        let snapshot = SessionSnapshot::capture(&sample_state());
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["links"][0]["source"], json!("#1:0"));
        assert_eq!(value["links"][0]["target"], json!("#1:1"));
        assert!(value["graphObjects"].get("#9:0").is_some());
        assert!(value["nodes"][0].get("vx").is_none());
    }

    #[test]
    fn corrupt_or_missing_sessions_read_as_absent() {
        let store = MemoryStore::default();
        assert!(load_session(&store, "nope").is_none());

        store.set(&session_key("bad"), "{\"nodes\": 4").unwrap();
        assert!(load_session(&store, "bad").is_none());
    }

    #[test]
    fn sessions_are_keyed_independently() {
        let store = MemoryStore::default();
        save_session(&store, "one", &sample_state()).unwrap();
        save_session(&store, "two", &GraphState::new()).unwrap();

        assert_eq!(load_session(&store, "one").unwrap().nodes.len(), 2);
        assert!(load_session(&store, "two").unwrap().is_empty());

        clear_session(&store, "one").unwrap();
        assert!(load_session(&store, "one").is_none());
    }
}
