use serde_json::Value;

/// Scalar fields shared by every page-shaped response object.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeFields {
    pub id: String,
    pub path: String,
    pub title: String,
    pub order: i64,
    pub storage_path: String,
}

impl NodeFields {
    pub fn from_raw(raw: &Value) -> Self {
        let path = string_field(raw, "path");
        Self {
            id: id_field(raw, "id"),
            title: title_from_path(&path).to_string(),
            order: order_field(raw),
            storage_path: string_field(raw, "gitItemPath"),
            path,
        }
    }
}

/// Last non-empty `/` segment of `path`, or `""`.
pub fn title_from_path(path: &str) -> &str {
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("")
}

/// Stringified identifier: numbers and strings pass through, anything else is `""`.
pub fn id_field(raw: &Value, key: &str) -> String {
    match raw.get(key) {
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::String(value)) => value.clone(),
        _ => String::new(),
    }
}

pub fn string_field(raw: &Value, key: &str) -> String {
    raw.get(key)
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .unwrap_or_default()
}

pub fn bool_field(raw: &Value, key: &str) -> bool {
    raw.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn order_field(raw: &Value) -> i64 {
    match raw.get("order") {
        Some(value) => value
            .as_i64()
            .or_else(|| value.as_f64().map(|float| float as i64))
            .unwrap_or(0),
        None => 0,
    }
}
