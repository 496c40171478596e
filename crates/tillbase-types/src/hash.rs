use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Rebuild a JSON value with object keys sorted so that semantically equal
/// payloads serialize to identical bytes regardless of key order.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for key in keys {
                out.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

pub fn canonical_json(value: &Value) -> String {
    // serde_json emits compact separators by default.
    serde_json::to_string(&canonicalize(value)).unwrap_or_else(|_| "null".to_string())
}

/// Stable SHA-256 hex digest of the canonical payload encoding.
pub fn payload_hash(value: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(value).as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_change_hash() {
        let a: Value = serde_json::from_str(r#"{"b": 1, "a": {"y": 2, "x": 3}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a": {"x": 3, "y": 2}, "b": 1}"#).unwrap();
        assert_eq!(payload_hash(&a), payload_hash(&b));
    }

    #[test]
    fn different_values_change_hash() {
        assert_ne!(
            payload_hash(&json!({"qty": 1})),
            payload_hash(&json!({"qty": 2}))
        );
    }

    #[test]
    fn arrays_keep_order() {
        assert_ne!(
            payload_hash(&json!({"items": [1, 2]})),
            payload_hash(&json!({"items": [2, 1]}))
        );
    }

    #[test]
    fn canonical_json_is_compact() {
        let value = json!({"b": 1, "a": "x"});
        assert_eq!(canonical_json(&value), r#"{"a":"x","b":1}"#);
    }
}
