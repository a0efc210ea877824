//! Built-in translators registered under `"csv"` and `"json"`.

use dayrunner_core::{Row, Value};

/// Comma-joins column values in key order (the `BTreeMap` iteration
/// order of [`Row`]), quoting any value containing a comma, quote, or
/// newline per RFC 4180.
#[must_use]
pub fn csv_line(row: &Row) -> String {
    row.values()
        .map(|value| quote_if_needed(&value.to_string()))
        .collect::<Vec<_>>()
        .join(",")
}

fn quote_if_needed(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Renders the row as a single-line JSON object, with scalar (not
/// tagged-enum) values -- `Value`'s derived `Serialize` is for the
/// wire formats in `dayrunner-core`, not for this output shape.
#[must_use]
pub fn json_line(row: &Row) -> String {
    let object: serde_json::Map<String, serde_json::Value> = row
        .iter()
        .map(|(key, value)| (key.clone(), to_json_scalar(value)))
        .collect();
    serde_json::to_string(&object).unwrap_or_default()
}

fn to_json_scalar(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Text(s) => serde_json::Value::String(s.clone()),
    }
}
