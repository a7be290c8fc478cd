use serde_json::{Value, json};

use crate::kb::{Record, record_class, record_id, reference_id};

/// Statement fields that behave like edges without being stored as edges.
pub const LINK_FIELDS: [&str; 4] = ["impliedBy", "supportedBy", "relevance", "appliesTo"];

/// One side of a relation: its id and, when embedded, the full record.
#[derive(Clone, Copy, Debug)]
pub struct Endpoint<'a> {
    pub id: &'a str,
    pub record: Option<&'a Record>,
}

impl<'a> Endpoint<'a> {
    fn from_value(value: &'a Value) -> Option<Self> {
        Some(Self {
            id: reference_id(value)?,
            record: value.as_object(),
        })
    }
}

/// A stored edge or a link-like statement field found on a record.
#[derive(Clone, Debug)]
pub struct Relation<'a> {
    pub id: String,
    pub class: String,
    pub out: Option<Endpoint<'a>>,
    pub into: Option<Endpoint<'a>>,
    /// Stored edge payload; `None` for link-like fields.
    pub edge: Option<&'a Record>,
    /// Position among the relations of the same field, used for placement.
    pub slot: usize,
    pub slots: usize,
}

impl<'a> Relation<'a> {
    pub fn is_synthetic(&self) -> bool {
        self.edge.is_none()
    }

    /// Both endpoints, if the relation names both.
    pub fn endpoints(&self) -> Option<(Endpoint<'a>, Endpoint<'a>)> {
        Some((self.out?, self.into?))
    }

    /// The endpoint opposite `id`. A self-loop returns itself.
    pub fn other_end(&self, id: &str) -> Option<Endpoint<'a>> {
        let (out, into) = self.endpoints()?;
        if into.id == id { Some(out) } else { Some(into) }
    }

    /// Payload stored on the materialized link.
    pub fn link_data(&self) -> Record {
        if let Some(edge) = self.edge {
            return edge.clone();
        }

        let out = self.out.map(|endpoint| endpoint.id).unwrap_or_default();
        let into = self.into.map(|endpoint| endpoint.id).unwrap_or_default();
        json!({
            "@rid": self.id,
            "@class": self.class,
            "out": out,
            "in": into,
        })
        .as_object()
        .cloned()
        .unwrap_or_default()
    }
}

/// Composite id for a link-like relation. Independent of traversal order.
pub fn synthetic_link_id(relation: &str, a: &str, b: &str) -> String {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    format!("{relation}({low},{high})")
}

/// Every relation carried by `record`: stored edges under `edge_fields`
/// first, then link-like statement fields.
pub fn relations_of<'a>(record: &'a Record, edge_fields: &[String]) -> Vec<Relation<'a>> {
    let mut relations = Vec::new();

    for field in edge_fields {
        let Some(entries) = record.get(field).and_then(Value::as_array) else {
            continue;
        };
        let fallback_class = field
            .strip_prefix("out_")
            .or_else(|| field.strip_prefix("in_"))
            .unwrap_or(field);
        let slots = entries.len();

        for (slot, entry) in entries.iter().enumerate() {
            let Some(edge) = entry.as_object() else {
                continue;
            };
            let Some(id) = record_id(edge) else {
                continue;
            };
            relations.push(Relation {
                id: id.to_owned(),
                class: record_class(edge).unwrap_or(fallback_class).to_owned(),
                out: edge.get("out").and_then(Endpoint::from_value),
                into: edge.get("in").and_then(Endpoint::from_value),
                edge: Some(edge),
                slot,
                slots,
            });
        }
    }

    let Some(own_id) = record_id(record) else {
        return relations;
    };
    let own = Endpoint {
        id: own_id,
        record: Some(record),
    };

    for field in LINK_FIELDS {
        let targets = match record.get(field) {
            Some(Value::Array(values)) => values.iter().collect::<Vec<_>>(),
            Some(value) if !value.is_null() => vec![value],
            _ => continue,
        };
        let slots = targets.len();

        for (slot, value) in targets.into_iter().enumerate() {
            let Some(target) = Endpoint::from_value(value) else {
                continue;
            };
            relations.push(Relation {
                id: synthetic_link_id(field, own_id, target.id),
                class: field.to_owned(),
                out: Some(own),
                into: Some(target),
                edge: None,
                slot,
                slots,
            });
        }
    }

    relations
}

/// Relations of `record` not accepted by `is_shown`.
pub fn unshown_relations<'a, F>(
    record: &'a Record,
    edge_fields: &[String],
    is_shown: F,
) -> Vec<Relation<'a>>
where
    F: Fn(&str) -> bool,
{
    relations_of(record, edge_fields)
        .into_iter()
        .filter(|relation| !is_shown(&relation.id))
        .collect()
}
