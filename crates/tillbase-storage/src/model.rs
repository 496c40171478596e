use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tillbase_types::prelude::Timestamp;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum DocStatus {
    Draft,
    Submitted,
    Cancelled,
}

impl From<DocStatus> for u8 {
    fn from(status: DocStatus) -> u8 {
        match status {
            DocStatus::Draft => 0,
            DocStatus::Submitted => 1,
            DocStatus::Cancelled => 2,
        }
    }
}

impl TryFrom<u8> for DocStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DocStatus::Draft),
            1 => Ok(DocStatus::Submitted),
            2 => Ok(DocStatus::Cancelled),
            other => Err(format!("invalid docstatus {other}")),
        }
    }
}

/// The storage SPI's unit of exchange. Entity families deserialize typed
/// rows out of `fields`; the meta columns live alongside.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub doctype: String,
    pub name: String,
    pub docstatus: DocStatus,
    pub owner: String,
    pub creation: Timestamp,
    pub modified: Timestamp,
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(doctype: &str, fields: Map<String, Value>) -> Self {
        let now = Timestamp::now();
        Document {
            doctype: doctype.to_string(),
            name: String::new(),
            docstatus: DocStatus::Draft,
            owner: String::new(),
            creation: now,
            modified: now,
            fields,
        }
    }

    pub fn is_submitted(&self) -> bool {
        self.docstatus == DocStatus::Submitted
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn field_f64(&self, key: &str) -> f64 {
        self.fields.get(key).and_then(Value::as_f64).unwrap_or(0.0)
    }

    pub fn field_bool(&self, key: &str) -> bool {
        match self.fields.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_i64().unwrap_or(0) != 0,
            Some(Value::String(s)) => {
                matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "y" | "on")
            }
            _ => false,
        }
    }

    pub fn set_field(&mut self, key: &str, value: Value) {
        self.fields.insert(key.to_string(), value);
    }

    /// Flatten meta columns and payload fields into one JSON object, the
    /// shape typed rows deserialize from.
    pub fn to_row_value(&self) -> Value {
        let mut map = self.fields.clone();
        map.insert("name".into(), Value::String(self.name.clone()));
        map.insert("doctype".into(), Value::String(self.doctype.clone()));
        map.insert(
            "docstatus".into(),
            Value::Number(u8::from(self.docstatus).into()),
        );
        map.insert("owner".into(), Value::String(self.owner.clone()));
        map.insert("modified".into(), Value::Number(self.modified.0.into()));
        map.insert("creation".into(), Value::Number(self.creation.0.into()));
        Value::Object(map)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocRef {
    pub doctype: String,
    pub name: String,
}

impl DocRef {
    pub fn new(doctype: &str, name: &str) -> Self {
        DocRef {
            doctype: doctype.to_string(),
            name: name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn docstatus_round_trips_as_int() {
        let wire = serde_json::to_value(DocStatus::Submitted).unwrap();
        assert_eq!(wire, json!(1));
        let back: DocStatus = serde_json::from_value(json!(2)).unwrap();
        assert_eq!(back, DocStatus::Cancelled);
    }

    #[test]
    fn field_bool_accepts_int_and_string_flags() {
        let mut doc = Document::new("Item", Map::new());
        doc.set_field("is_stock_item", json!(1));
        doc.set_field("disabled", json!("false"));
        assert!(doc.field_bool("is_stock_item"));
        assert!(!doc.field_bool("disabled"));
    }

    #[test]
    fn row_value_merges_meta_columns() {
        let mut doc = Document::new("Customer", Map::new());
        doc.name = "CUST-0001".into();
        doc.set_field("customer_name", json!("Ada"));
        let row = doc.to_row_value();
        assert_eq!(row["name"], "CUST-0001");
        assert_eq!(row["customer_name"], "Ada");
        assert_eq!(row["docstatus"], 0);
    }
}
