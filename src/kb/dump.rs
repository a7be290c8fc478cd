use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::KbError;

use super::cache::RecordSource;
use super::record::{Record, record_class, record_id, reference_id};
use super::schema::{KbSchema, Schema};

#[derive(Debug, Deserialize)]
struct RawDump {
    #[serde(default)]
    schema: Option<KbSchema>,
    #[serde(default)]
    records: Vec<Value>,
}

/// In-memory knowledgebase read from a JSON dump.
#[derive(Clone, Debug, Default)]
pub struct KnowledgeBase {
    schema: KbSchema,
    records: HashMap<String, Record>,
    order: Vec<String>,
}

impl KnowledgeBase {
    pub fn schema(&self) -> &KbSchema {
        &self.schema
    }

    pub fn record(&self, id: &str) -> Option<&Record> {
        self.records.get(id)
    }

    /// Vertex records in dump order.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.order.iter().filter_map(|id| self.records.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl RecordSource for KnowledgeBase {
    fn fetch(&self, id: &str) -> Result<Record, KbError> {
        self.records
            .get(id)
            .cloned()
            .ok_or_else(|| KbError::RecordNotFound(id.to_owned()))
    }
}

pub fn load_knowledgebase(path: &Path) -> Result<KnowledgeBase, KbError> {
    let raw = fs::read_to_string(path).map_err(|source| KbError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let knowledgebase = parse_knowledgebase(&raw)?;
    info!(
        path = %path.display(),
        records = knowledgebase.len(),
        "loaded knowledgebase dump"
    );
    Ok(knowledgebase)
}

/// Parses either `{"schema": .., "records": [..]}` or a bare array of records.
///
/// Edge records listed at the top level are attached to the `out_*`/`in_*`
/// fields of their endpoints instead of becoming vertices.
pub fn parse_knowledgebase(raw: &str) -> Result<KnowledgeBase, KbError> {
    let parsed: Value = serde_json::from_str(raw)?;
    let dump = match parsed {
        Value::Array(records) => RawDump {
            schema: None,
            records,
        },
        Value::Object(_) => RawDump::deserialize(parsed)?,
        _ => {
            return Err(KbError::InvalidDump(
                "expected an object or an array of records".to_owned(),
            ));
        }
    };

    let schema = dump.schema.unwrap_or_default();
    let mut records = HashMap::with_capacity(dump.records.len());
    let mut order = Vec::with_capacity(dump.records.len());
    let mut loose_edges = Vec::new();

    for value in dump.records {
        let Value::Object(record) = value else {
            warn!("skipping non-object entry in knowledgebase dump");
            continue;
        };
        let Some(id) = record_id(&record).map(str::to_owned) else {
            warn!("skipping record without @rid");
            continue;
        };

        let is_edge = record_class(&record)
            .is_some_and(|class| schema.edge_classes().iter().any(|edge| edge == class));
        if is_edge && record.contains_key("in") && record.contains_key("out") {
            loose_edges.push(record);
            continue;
        }

        if records.insert(id.clone(), record).is_none() {
            order.push(id);
        }
    }

    for edge in loose_edges {
        attach_edge(&mut records, edge);
    }

    if records.is_empty() {
        return Err(KbError::InvalidDump(
            "no vertex records found in dump".to_owned(),
        ));
    }

    Ok(KnowledgeBase {
        schema,
        records,
        order,
    })
}

fn attach_edge(records: &mut HashMap<String, Record>, edge: Record) {
    let (Some(edge_id), Some(class)) = (record_id(&edge), record_class(&edge)) else {
        return;
    };
    let out_id = edge.get("out").and_then(reference_id).map(str::to_owned);
    let in_id = edge.get("in").and_then(reference_id).map(str::to_owned);

    let mut stored = edge.clone();
    if let Some(out_id) = &out_id {
        stored.insert("out".to_owned(), Value::String(out_id.clone()));
    }
    if let Some(in_id) = &in_id {
        stored.insert("in".to_owned(), Value::String(in_id.clone()));
    }

    for (endpoint, prefix) in [(out_id, "out"), (in_id, "in")] {
        let Some(record) = endpoint.and_then(|id| records.get_mut(&id)) else {
            continue;
        };
        let field = record
            .entry(format!("{prefix}_{class}"))
            .or_insert_with(|| Value::Array(Vec::new()));
        let Some(entries) = field.as_array_mut() else {
            continue;
        };
        let already_present = entries
            .iter()
            .any(|entry| reference_id(entry) == Some(edge_id));
        if !already_present {
            entries.push(Value::Object(stored.clone()));
        }
    }
}
