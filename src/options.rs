//! User-adjustable view configuration and colour assignment.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::StoreError;
use crate::kb::{Record, lookup_path, scalar_text};
use crate::props::{NULL_VALUE, PropLimits, PropsMap};
use crate::store::KeyValueStore;

/// Store key of the options document.
pub const OPTIONS_KEY: &str = "graphOptions";

const NODE_PALETTE: [&str; 20] = [
    "#1F265B", "#3B4BA6", "#5D73E0", "#8FA2F5", "#0F5E4A", "#1E9C7A", "#4CC9A4", "#A3E4D0",
    "#7A1F3D", "#B5365E", "#E0648B", "#F2A7BF", "#6B4A00", "#A87700", "#E0A82E", "#F5D488",
    "#3F2A6B", "#6A49B0", "#9C7BE0", "#CDB8F5",
];

const LINK_PALETTE: [&str; 20] = [
    "#D32F2F", "#F57C00", "#FBC02D", "#689F38", "#0097A7", "#1976D2", "#7B1FA2", "#C2185B",
    "#5D4037", "#455A64", "#E57373", "#FFB74D", "#FFF176", "#AED581", "#4DD0E1", "#64B5F6",
    "#BA68C8", "#F06292", "#A1887F", "#90A4AE",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Nodes,
    Links,
}

impl ObjectKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Nodes => "nodes",
            Self::Links => "links",
        }
    }
}

/// Result of recolouring one kind of object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColorUpdate {
    /// No colour property selected; the table was cleared.
    Cleared,
    Applied { distinct: usize },
    /// Too many distinct values; the selection was reset.
    Overflow { property: String, distinct: usize },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GraphOptions {
    pub default_color: String,
    pub link_strength: f32,
    pub charge_strength: f32,
    pub charge_max: f32,
    pub collision_radius: f32,
    pub auto_collision_radius: bool,
    pub link_highlighting: bool,
    pub node_label_prop: String,
    pub link_label_prop: String,
    pub nodes_color: String,
    pub links_color: String,
    pub nodes_colors: BTreeMap<String, String>,
    pub links_colors: BTreeMap<String, String>,
    pub nodes_legend: bool,
    pub links_legend: bool,
    pub is_tree_layout: bool,
    pub fan_out_threshold: usize,
    pub palette_size: usize,
    pub max_prop_value_len: usize,
    pub max_prop_cardinality: usize,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            default_color: "#26328C".to_owned(),
            link_strength: 0.05,
            charge_strength: 100.0,
            charge_max: 500.0,
            collision_radius: 4.0,
            auto_collision_radius: false,
            link_highlighting: true,
            node_label_prop: "name".to_owned(),
            link_label_prop: String::new(),
            nodes_color: "@class".to_owned(),
            links_color: String::new(),
            nodes_colors: BTreeMap::new(),
            links_colors: BTreeMap::new(),
            nodes_legend: true,
            links_legend: true,
            is_tree_layout: false,
            fan_out_threshold: 10,
            palette_size: NODE_PALETTE.len(),
            max_prop_value_len: 50,
            max_prop_cardinality: 1000,
        }
    }
}

impl GraphOptions {
    /// Reads the stored options document. Missing or unreadable documents
    /// yield defaults; missing fields take their individual defaults.
    pub fn retrieve(store: &dyn KeyValueStore) -> Self {
        let raw = match store.get(OPTIONS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Self::default(),
            Err(error) => {
                warn!(%error, "could not read stored graph options, using defaults");
                return Self::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(options) => options,
            Err(error) => {
                warn!(%error, "stored graph options are corrupt, using defaults");
                Self::default()
            }
        }
    }

    pub fn persist(&self, store: &dyn KeyValueStore) -> Result<(), StoreError> {
        store.set(OPTIONS_KEY, &serde_json::to_string(self)?)?;
        info!("saved graph options");
        Ok(())
    }

    pub fn color_prop(&self, kind: ObjectKind) -> &str {
        match kind {
            ObjectKind::Nodes => &self.nodes_color,
            ObjectKind::Links => &self.links_color,
        }
    }

    pub fn label_prop(&self, kind: ObjectKind) -> &str {
        match kind {
            ObjectKind::Nodes => &self.node_label_prop,
            ObjectKind::Links => &self.link_label_prop,
        }
    }

    pub fn colors(&self, kind: ObjectKind) -> &BTreeMap<String, String> {
        match kind {
            ObjectKind::Nodes => &self.nodes_colors,
            ObjectKind::Links => &self.links_colors,
        }
    }

    pub fn legend_visible(&self, kind: ObjectKind) -> bool {
        match kind {
            ObjectKind::Nodes => self.nodes_legend,
            ObjectKind::Links => self.links_legend,
        }
    }

    pub fn prop_limits(&self) -> PropLimits {
        PropLimits {
            max_value_len: self.max_prop_value_len,
            max_cardinality: self.max_prop_cardinality,
        }
    }

    /// Colour assigned to the record's value of the active colour property,
    /// if any. Callers fall back to [`GraphOptions::default_color`].
    pub fn get_color(&self, record: &Record, kind: ObjectKind) -> Option<&str> {
        let property = self.color_prop(kind);
        if property.is_empty() {
            return None;
        }
        self.colors(kind)
            .get(&color_key(record, property))
            .map(String::as_str)
    }

    /// Assigns palette slots to the distinct values of the active colour
    /// property across `records`, in first-seen order.
    ///
    /// When there are more distinct values than palette slots and the
    /// property is not the only one indexed for this kind, colouring by it
    /// is abandoned and the selection cleared.
    pub fn update_colors<'a, I>(&mut self, kind: ObjectKind, records: I, props: &PropsMap) -> ColorUpdate
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let property = self.color_prop(kind).to_owned();
        if property.is_empty() {
            self.colors_mut(kind).clear();
            return ColorUpdate::Cleared;
        }

        let mut seen = BTreeSet::new();
        let mut keys = Vec::new();
        for record in records {
            let key = color_key(record, &property);
            if seen.insert(key.clone()) {
                keys.push(key);
            }
        }

        if keys.len() > self.palette_size && props.indexed_count(kind) != 1 {
            warn!(
                kind = kind.label(),
                %property,
                distinct = keys.len(),
                "too many distinct values to colour by"
            );
            match kind {
                ObjectKind::Nodes => self.nodes_color.clear(),
                ObjectKind::Links => self.links_color.clear(),
            }
            self.colors_mut(kind).clear();
            return ColorUpdate::Overflow {
                property,
                distinct: keys.len(),
            };
        }

        let colors = palette(kind, keys.len());
        let table = self.colors_mut(kind);
        table.clear();
        for (key, color) in keys.iter().zip(colors) {
            table.insert(key.clone(), color);
        }
        ColorUpdate::Applied {
            distinct: keys.len(),
        }
    }

    fn colors_mut(&mut self, kind: ObjectKind) -> &mut BTreeMap<String, String> {
        match kind {
            ObjectKind::Nodes => &mut self.nodes_colors,
            ObjectKind::Links => &mut self.links_colors,
        }
    }
}

/// Text used to key colour tables and legends.
pub fn color_key(record: &Record, property: &str) -> String {
    lookup_path(record, property)
        .and_then(scalar_text)
        .unwrap_or_else(|| NULL_VALUE.to_owned())
}

/// `count` colours: the fixed palette first, then generated hues.
pub fn palette(kind: ObjectKind, count: usize) -> Vec<String> {
    let base = match kind {
        ObjectKind::Nodes => &NODE_PALETTE,
        ObjectKind::Links => &LINK_PALETTE,
    };
    let mut colors = base
        .iter()
        .take(count)
        .map(|color| (*color).to_owned())
        .collect::<Vec<_>>();
    for index in colors.len()..count {
        let hue = (index as f32 * 137.508) % 360.0;
        colors.push(hsl_hex(hue, 0.55, 0.5));
    }
    colors
}

fn hsl_hex(hue: f32, saturation: f32, lightness: f32) -> String {
    let chroma = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let sector = hue / 60.0;
    let second = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
    let (r, g, b) = match sector as u32 {
        0 => (chroma, second, 0.0),
        1 => (second, chroma, 0.0),
        2 => (0.0, chroma, second),
        3 => (0.0, second, chroma),
        4 => (second, 0.0, chroma),
        _ => (chroma, 0.0, second),
    };
    let offset = lightness - chroma / 2.0;
    let channel = |value: f32| ((value + offset) * 255.0).round().clamp(0.0, 255.0) as u8;
    format!("#{:02X}{:02X}{:02X}", channel(r), channel(g), channel(b))
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::store::MemoryStore;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap_or_default()
    }

    fn props_with(names: &[&str], records: &[Record]) -> PropsMap {
        let allowed = names.iter().map(|name| (*name).to_owned()).collect::<Vec<_>>();
        let mut props = PropsMap::default();
        for record in records {
            props.load_node(record, &allowed);
        }
        props
    }

    #[test]
    fn partial_documents_fill_in_defaults() {
        let store = MemoryStore::default();
        store
            .set(OPTIONS_KEY, r#"{"chargeStrength": 250, "isTreeLayout": true}"#)
            .unwrap();

        let options = GraphOptions::retrieve(&store);
        assert_eq!(options.charge_strength, 250.0);
        assert!(options.is_tree_layout);
        assert_eq!(options.node_label_prop, "name");
        assert_eq!(options.nodes_color, "@class");
        assert_eq!(options.fan_out_threshold, 10);
    }

    #[test]
    fn corrupt_documents_degrade_to_defaults() {
        let store = MemoryStore::default();
        store.set(OPTIONS_KEY, "{not json").unwrap();
        assert_eq!(GraphOptions::retrieve(&store), GraphOptions::default());
        assert_eq!(
            GraphOptions::retrieve(&MemoryStore::default()),
            GraphOptions::default()
        );
    }

    #[test]
    fn persist_then_retrieve_keeps_changes() {
        let store = MemoryStore::default();
        let options = GraphOptions {
            links_color: "@class".to_owned(),
            collision_radius: 12.0,
            ..GraphOptions::default()
        };
        options.persist(&store).unwrap();
        assert_eq!(GraphOptions::retrieve(&store), options);
    }

    #[test]
    fn colors_follow_first_seen_order() {
        let records = vec![
            record(json!({"@class": "Disease"})),
            record(json!({"@class": "Feature"})),
            record(json!({"@class": "Disease"})),
            record(json!({})),
        ];
        let props = props_with(&["@class", "name"], &records);
        let mut options = GraphOptions::default();

        let update = options.update_colors(ObjectKind::Nodes, &records, &props);
        assert_eq!(update, ColorUpdate::Applied { distinct: 3 });
        assert_eq!(options.get_color(&records[0], ObjectKind::Nodes), Some(NODE_PALETTE[0]));
        assert_eq!(options.get_color(&records[1], ObjectKind::Nodes), Some(NODE_PALETTE[1]));
        assert_eq!(options.get_color(&records[3], ObjectKind::Nodes), Some(NODE_PALETTE[2]));
        assert_eq!(options.get_color(&records[0], ObjectKind::Links), None);
    }

    #[test]
    fn too_many_values_clear_the_selection() {
        let records = (0..21)
            .map(|index| record(json!({"name": format!("n{index}"), "@class": "Disease"})))
            .collect::<Vec<_>>();
        let props = props_with(&["@class", "name"], &records);
        let mut options = GraphOptions {
            nodes_color: "name".to_owned(),
            ..GraphOptions::default()
        };

        let update = options.update_colors(ObjectKind::Nodes, &records, &props);
        assert_eq!(
            update,
            ColorUpdate::Overflow {
                property: "name".to_owned(),
                distinct: 21,
            }
        );
        assert!(options.nodes_color.is_empty());
        assert!(options.nodes_colors.is_empty());
        assert_eq!(options.get_color(&records[0], ObjectKind::Nodes), None);
    }

    #[test]
    fn a_single_indexed_property_may_exceed_the_palette() {
        let records = (0..25)
            .map(|index| record(json!({"name": format!("n{index}")})))
            .collect::<Vec<_>>();
        let props = props_with(&["name"], &records);
        let mut options = GraphOptions {
            nodes_color: "name".to_owned(),
            ..GraphOptions::default()
        };

        let update = options.update_colors(ObjectKind::Nodes, &records, &props);
        assert_eq!(update, ColorUpdate::Applied { distinct: 25 });
        let distinct = options.nodes_colors.values().collect::<BTreeSet<_>>();
        assert_eq!(distinct.len(), 25);
    }

    #[test]
    fn dotted_color_properties_resolve_nested_values() {
        let data = record(json!({"source": {"name": "doid"}}));
        let mut options = GraphOptions {
            nodes_color: "source.name".to_owned(),
            ..GraphOptions::default()
        };
        let props = props_with(&["source.name", "name"], std::slice::from_ref(&data));
        options.update_colors(ObjectKind::Nodes, [&data], &props);
        assert!(options.get_color(&data, ObjectKind::Nodes).is_some());
        assert_eq!(color_key(&data, "source.name"), "doid");
    }
}
