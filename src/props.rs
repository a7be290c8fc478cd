//! Index of the distinct property values visible in the graph, used to fill
//! the label-by and colour-by menus and the legends.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use tracing::debug;

use crate::kb::{Record, lookup_path, record_id, scalar_text};
use crate::options::ObjectKind;

/// Stand-in value for objects that lack a property.
pub const NULL_VALUE: &str = "null";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PropValues {
    Values(BTreeSet<String>),
    /// Too many, too long or collection-valued. Never reverts.
    NonEnumerable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PropLimits {
    pub max_value_len: usize,
    pub max_cardinality: usize,
}

impl Default for PropLimits {
    fn default() -> Self {
        Self {
            max_value_len: 50,
            max_cardinality: 1000,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PropsMap {
    node_props: BTreeMap<String, PropValues>,
    link_props: BTreeMap<String, PropValues>,
    limits: PropLimits,
}

impl PropsMap {
    pub fn new(limits: PropLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    pub fn load_node(&mut self, record: &Record, allowed: &[String]) {
        load(&mut self.node_props, record, allowed, self.limits);
    }

    pub fn load_link(&mut self, record: &Record, allowed: &[String]) {
        load(&mut self.link_props, record, allowed, self.limits);
    }

    /// Rebuilds node values from the nodes that remain after `removed` left.
    pub fn remove_node<'a, I>(&mut self, removed: &Record, surviving: I, allowed: &[String])
    where
        I: IntoIterator<Item = &'a Record>,
    {
        debug!(id = record_id(removed), "rebuilding node properties");
        rebuild(&mut self.node_props, surviving, allowed, self.limits);
    }

    /// Rebuilds link values from the links that remain after `removed` left.
    pub fn remove_link<'a, I>(&mut self, removed: &Record, surviving: I, allowed: &[String])
    where
        I: IntoIterator<Item = &'a Record>,
    {
        debug!(id = record_id(removed), "rebuilding link properties");
        rebuild(&mut self.link_props, surviving, allowed, self.limits);
    }

    /// Replays `records` over the sticky markings of one kind.
    pub fn rebuild<'a, I>(&mut self, kind: ObjectKind, records: I, allowed: &[String])
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let props = match kind {
            ObjectKind::Nodes => &mut self.node_props,
            ObjectKind::Links => &mut self.link_props,
        };
        rebuild(props, records, allowed, self.limits);
    }

    pub fn limits(&self) -> PropLimits {
        self.limits
    }

    pub fn node_props(&self) -> &BTreeMap<String, PropValues> {
        &self.node_props
    }

    pub fn link_props(&self) -> &BTreeMap<String, PropValues> {
        &self.link_props
    }

    pub fn props(&self, kind: ObjectKind) -> &BTreeMap<String, PropValues> {
        match kind {
            ObjectKind::Nodes => &self.node_props,
            ObjectKind::Links => &self.link_props,
        }
    }

    /// Properties that can still drive a colour or label menu.
    pub fn enumerable(&self, kind: ObjectKind) -> Vec<&str> {
        self.props(kind)
            .iter()
            .filter(|(_, values)| matches!(values, PropValues::Values(_)))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn indexed_count(&self, kind: ObjectKind) -> usize {
        self.props(kind).len()
    }

    pub fn clear(&mut self) {
        self.node_props.clear();
        self.link_props.clear();
    }
}

fn load(
    props: &mut BTreeMap<String, PropValues>,
    record: &Record,
    allowed: &[String],
    limits: PropLimits,
) {
    for prop in allowed {
        let entry = props
            .entry(prop.clone())
            .or_insert_with(|| PropValues::Values(BTreeSet::new()));
        let PropValues::Values(values) = entry else {
            continue;
        };

        let text = match lookup_path(record, prop) {
            None => Some(NULL_VALUE.to_owned()),
            Some(Value::Array(_) | Value::Object(_)) => None,
            Some(value) => scalar_text(value)
                .filter(|text| prop == "name" || text.chars().count() <= limits.max_value_len),
        };

        match text {
            Some(text) => {
                values.insert(text);
                if values.len() > limits.max_cardinality {
                    *entry = PropValues::NonEnumerable;
                }
            }
            None => *entry = PropValues::NonEnumerable,
        }
    }
}

fn rebuild<'a, I>(
    props: &mut BTreeMap<String, PropValues>,
    surviving: I,
    allowed: &[String],
    limits: PropLimits,
) where
    I: IntoIterator<Item = &'a Record>,
{
    props.retain(|_, values| matches!(values, PropValues::NonEnumerable));
    for record in surviving {
        load(props, record, allowed, limits);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap_or_default()
    }

    fn allowed() -> Vec<String> {
        ["@class", "name", "source.name", "sourceId"]
            .into_iter()
            .map(str::to_owned)
            .collect()
    }

    fn values(map: &PropsMap, prop: &str) -> Vec<String> {
        match map.node_props().get(prop) {
            Some(PropValues::Values(values)) => values.iter().cloned().collect(),
            _ => Vec::new(),
        }
    }

    #[test]
    fn absent_properties_record_the_null_sentinel() {
        let mut map = PropsMap::default();
        map.load_node(
            &record(json!({"@class": "Disease", "source": {"name": "doid"}})),
            &allowed(),
        );

        assert_eq!(values(&map, "@class"), vec!["Disease"]);
        assert_eq!(values(&map, "name"), vec![NULL_VALUE]);
        assert_eq!(values(&map, "source.name"), vec!["doid"]);
    }

    #[test]
    fn long_or_collection_values_are_sticky_non_enumerable() {
        let mut map = PropsMap::default();
        let long = "x".repeat(60);
        map.load_node(
            &record(json!({"@class": ["a"], "sourceId": long, "name": long})),
            &allowed(),
        );
        map.load_node(&record(json!({"@class": "Disease", "sourceId": "s"})), &allowed());

        assert_eq!(
            map.node_props().get("@class"),
            Some(&PropValues::NonEnumerable)
        );
        assert_eq!(
            map.node_props().get("sourceId"),
            Some(&PropValues::NonEnumerable)
        );
        assert_eq!(values(&map, "name").len(), 2);

        map.remove_node(&record(json!({})), std::iter::empty(), &allowed());
        assert_eq!(
            map.node_props().get("@class"),
            Some(&PropValues::NonEnumerable)
        );
    }

    #[test]
    fn cardinality_cap_marks_non_enumerable() {
        let mut map = PropsMap::new(PropLimits {
            max_value_len: 50,
            max_cardinality: 2,
        });
        for name in ["a", "b", "c"] {
            map.load_node(&record(json!({"name": name})), &["name".to_owned()]);
        }
        assert_eq!(map.node_props().get("name"), Some(&PropValues::NonEnumerable));
    }

    #[test]
    fn removal_matches_loading_the_survivors() {
        let a = record(json!({"@class": "Disease", "name": "a", "source": {"name": "doid"}}));
        let b = record(json!({"@class": "Feature", "name": "b", "sourceId": "hgnc:1"}));
        let c = record(json!({"@class": "Disease", "name": "c"}));

        let mut removed = PropsMap::default();
        for node in [&a, &b, &c] {
            removed.load_node(node, &allowed());
        }
        removed.remove_node(&b, [&a, &c], &allowed());

        let mut direct = PropsMap::default();
        for node in [&a, &c] {
            direct.load_node(node, &allowed());
        }

        assert_eq!(removed, direct);
    }
}
