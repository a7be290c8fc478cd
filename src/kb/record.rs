use serde_json::{Map, Value};

/// Raw knowledgebase record as delivered by the API or a dump file.
pub type Record = Map<String, Value>;

pub const ID_FIELD: &str = "@rid";
pub const CLASS_FIELD: &str = "@class";

pub fn record_id(record: &Record) -> Option<&str> {
    record
        .get(ID_FIELD)
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}

pub fn record_class(record: &Record) -> Option<&str> {
    record.get(CLASS_FIELD).and_then(Value::as_str)
}

/// Id of a record reference, which is either an embedded record or a bare id.
pub fn reference_id(value: &Value) -> Option<&str> {
    match value {
        Value::String(id) if !id.is_empty() => Some(id.as_str()),
        Value::Object(record) => record_id(record),
        _ => None,
    }
}

/// Resolves `key` or `key.nested` against a record. Only one level of nesting
/// is followed; a bare-id reference has no nested fields.
pub fn lookup_path<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    match path.split_once('.') {
        Some((key, nested)) => record.get(key)?.as_object()?.get(nested),
        None => record.get(path),
    }
    .filter(|value| !value.is_null())
}

/// Text form of a scalar value. Collections and nulls have none.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn reference_id_accepts_embedded_and_bare_ids() {
        assert_eq!(reference_id(&json!("#1:0")), Some("#1:0"));
        assert_eq!(reference_id(&json!({"@rid": "#1:1"})), Some("#1:1"));
        assert_eq!(reference_id(&json!({"name": "x"})), None);
        assert_eq!(reference_id(&json!("")), None);
        assert_eq!(reference_id(&json!(3)), None);
    }

    #[test]
    fn lookup_path_follows_one_nested_level() {
        let data = record(json!({
            "name": "kras",
            "source": {"@rid": "#9:0", "name": "hgnc"},
            "bare": "#9:1",
            "missing": null,
        }));

        assert_eq!(lookup_path(&data, "name"), Some(&json!("kras")));
        assert_eq!(lookup_path(&data, "source.name"), Some(&json!("hgnc")));
        assert_eq!(lookup_path(&data, "bare.name"), None);
        assert_eq!(lookup_path(&data, "missing"), None);
        assert_eq!(lookup_path(&data, "absent"), None);
    }

    #[test]
    fn scalar_text_rejects_collections() {
        assert_eq!(scalar_text(&json!(12)), Some("12".to_owned()));
        assert_eq!(scalar_text(&json!(true)), Some("true".to_owned()));
        assert_eq!(scalar_text(&json!(["a"])), None);
        assert_eq!(scalar_text(&json!({"a": 1})), None);
    }
}
