use serde_json::{Map, Value};
use tillbase_types::prelude::payload_hash;

/// Keys that belong to the transport, never to the document payload.
pub const INTERNAL_KEYS: [&str; 5] = [
    "client_request_id",
    "clientRequestId",
    "request_id",
    "requestId",
    "payload",
];

/// First non-empty value among alias spellings of the same field.
pub fn value_from_aliases<'a>(body: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let object = body.as_object()?;
    for key in keys {
        match object.get(*key) {
            None | Some(Value::Null) => continue,
            Some(Value::String(s)) if s.trim().is_empty() => continue,
            Some(value) => return Some(value),
        }
    }
    None
}

/// Map-level variant for child rows already split off the payload.
pub fn map_value_aliases<'a>(row: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    for key in keys {
        match row.get(*key) {
            None | Some(Value::Null) => continue,
            Some(Value::String(s)) if s.trim().is_empty() => continue,
            Some(value) => return Some(value),
        }
    }
    None
}

pub fn map_str_aliases(row: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    map_value_aliases(row, keys)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn str_from_aliases(body: &Value, keys: &[&str]) -> Option<String> {
    value_from_aliases(body, keys)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn coerce_f64(value: Option<&Value>, default: f64) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

pub fn coerce_bool(value: Option<&Value>, default: bool) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(default),
        Some(Value::String(s)) => {
            matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "y" | "on")
        }
        _ => default,
    }
}

pub fn coerce_i64(value: Option<&Value>, default: i64) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

/// Document payload: everything the client sent minus transport keys.
pub fn doc_payload(body: &Value) -> Map<String, Value> {
    let mut map = body.as_object().cloned().unwrap_or_default();
    for key in INTERNAL_KEYS {
        map.remove(key);
    }
    map.remove("doctype");
    map.remove("docstatus");
    map
}

/// Client-chosen request id from the payload, any alias spelling.
pub fn request_id_from_body(body: &Value) -> Option<String> {
    str_from_aliases(
        body,
        &["client_request_id", "clientRequestId", "request_id", "requestId"],
    )
}

/// Fallback correlation id when the client supplied nothing explicit: the
/// canonical payload hash, so retries still correlate.
pub fn correlation_id(body: &Value) -> String {
    request_id_from_body(body).unwrap_or_else(|| payload_hash(body))
}
