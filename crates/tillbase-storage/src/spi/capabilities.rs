use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Which tables and optional columns the connected store actually has.
/// Resolved once at startup so partially migrated installations degrade
/// predictably instead of being probed on every call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaCapabilities {
    pub tables: BTreeMap<String, BTreeSet<String>>,
}

impl SchemaCapabilities {
    pub fn has_table(&self, doctype: &str) -> bool {
        self.tables.contains_key(doctype)
    }

    pub fn has_field(&self, doctype: &str, field: &str) -> bool {
        self.tables
            .get(doctype)
            .map(|fields| fields.contains(field))
            .unwrap_or(false)
    }

    pub fn with_table(mut self, doctype: &str, fields: &[&str]) -> Self {
        self.tables.insert(
            doctype.to_string(),
            fields.iter().map(|f| f.to_string()).collect(),
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_table_reports_no_fields() {
        let caps = SchemaCapabilities::default().with_table("Customer", &["route", "territory"]);
        assert!(caps.has_table("Customer"));
        assert!(caps.has_field("Customer", "route"));
        assert!(!caps.has_field("Customer", "segment"));
        assert!(!caps.has_table("Supplier"));
    }
}
