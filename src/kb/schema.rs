use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use super::record::{Record, record_class, record_id, reference_id};

const PREVIEW_FIELDS: [&str; 3] = ["displayName", "name", "sourceId"];

/// Human-facing metadata for a record class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassInfo {
    pub name: String,
    pub reverse_name: Option<String>,
    pub is_edge: bool,
}

/// Schema lookups the graph core needs from the model layer.
pub trait Schema {
    /// Edge classes whose `in_*`/`out_*` fields can be traversed.
    fn edge_classes(&self) -> &[String];

    fn class_info(&self, name: &str) -> Option<ClassInfo>;

    /// Properties indexed for node colouring and labelling.
    fn node_properties(&self) -> &[String];

    /// Properties indexed for link colouring and labelling.
    fn link_properties(&self) -> &[String];

    /// All `out_<Edge>` and `in_<Edge>` field names.
    fn edge_fields(&self) -> Vec<String> {
        self.edge_classes()
            .iter()
            .flat_map(|class| [format!("out_{class}"), format!("in_{class}")])
            .collect()
    }

    fn is_edge_field(&self, field: &str) -> bool {
        field
            .strip_prefix("out_")
            .or_else(|| field.strip_prefix("in_"))
            .is_some_and(|class| self.edge_classes().iter().any(|edge| edge == class))
    }

    /// Flattened edge payloads stored on a record under any edge field.
    fn edges_of<'a>(&self, record: &'a Record) -> Vec<&'a Record> {
        record
            .iter()
            .filter(|(field, _)| self.is_edge_field(field))
            .filter_map(|(_, value)| value.as_array())
            .flatten()
            .filter_map(Value::as_object)
            .collect()
    }

    fn class_of(&self, record: &Record) -> Option<ClassInfo> {
        self.class_info(record_class(record)?)
    }

    /// Short label for any record.
    fn preview(&self, record: &Record) -> String {
        for field in PREVIEW_FIELDS {
            if let Some(text) = record.get(field).and_then(Value::as_str)
                && !text.trim().is_empty()
            {
                return text.to_owned();
            }
        }

        if let (Some(relevance), Some(applies_to)) =
            (record.get("relevance"), record.get("appliesTo"))
        {
            return format!(
                "{} to {}",
                self.reference_preview(relevance),
                self.reference_preview(applies_to)
            );
        }

        if let Some(info) = self.class_of(record)
            && info.is_edge
        {
            return info.name;
        }

        record_id(record)
            .or_else(|| record_class(record))
            .unwrap_or("(unnamed)")
            .to_owned()
    }

    fn reference_preview(&self, value: &Value) -> String {
        match value {
            Value::Object(record) => self.preview(record),
            other => reference_id(other).unwrap_or("?").to_owned(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClassDefinition {
    #[serde(default)]
    reverse_name: Option<String>,
}

/// Schema read from the `schema` section of a knowledgebase dump.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KbSchema {
    #[serde(default = "default_edges")]
    edges: Vec<String>,
    #[serde(default)]
    classes: BTreeMap<String, ClassDefinition>,
    #[serde(default = "default_node_properties")]
    node_properties: Vec<String>,
    #[serde(default = "default_link_properties")]
    link_properties: Vec<String>,
}

impl Default for KbSchema {
    fn default() -> Self {
        Self {
            edges: default_edges(),
            classes: BTreeMap::new(),
            node_properties: default_node_properties(),
            link_properties: default_link_properties(),
        }
    }
}

impl KbSchema {
    pub fn with_edges<I, S>(edges: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            edges: edges.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

impl Schema for KbSchema {
    fn edge_classes(&self) -> &[String] {
        &self.edges
    }

    fn class_info(&self, name: &str) -> Option<ClassInfo> {
        if name.is_empty() {
            return None;
        }

        let reverse_name = self
            .classes
            .get(name)
            .and_then(|definition| definition.reverse_name.clone())
            .or_else(|| builtin_reverse_name(name).map(str::to_owned));

        Some(ClassInfo {
            name: name.to_owned(),
            reverse_name,
            is_edge: self.edges.iter().any(|edge| edge == name),
        })
    }

    fn node_properties(&self) -> &[String] {
        &self.node_properties
    }

    fn link_properties(&self) -> &[String] {
        &self.link_properties
    }
}

fn builtin_reverse_name(name: &str) -> Option<&'static str> {
    match name {
        "AliasOf" => Some("HasAlias"),
        "CrossReferenceOf" => Some("HasCrossReference"),
        "DeprecatedBy" => Some("Deprecates"),
        "ElementOf" => Some("HasElement"),
        "GeneralizationOf" => Some("GeneralizedFrom"),
        "Infers" => Some("InferredBy"),
        "OppositeOf" => Some("OppositeOf"),
        "SubClassOf" => Some("SuperClassOf"),
        "TargetOf" => Some("HasTarget"),
        _ => None,
    }
}

fn default_edges() -> Vec<String> {
    [
        "AliasOf",
        "CrossReferenceOf",
        "DeprecatedBy",
        "ElementOf",
        "GeneralizationOf",
        "Infers",
        "OppositeOf",
        "SubClassOf",
        "TargetOf",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}

fn default_node_properties() -> Vec<String> {
    ["@rid", "@class", "name", "sourceId", "source.name", "displayName"]
        .into_iter()
        .map(str::to_owned)
        .collect()
}

fn default_link_properties() -> Vec<String> {
    ["@rid", "@class", "source.name"]
        .into_iter()
        .map(str::to_owned)
        .collect()
}
