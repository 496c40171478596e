use crate::errors::StorageError;
use crate::model::{DocStatus, Document};
use crate::query::{Listing, QueryParams};
use crate::spi::capabilities::SchemaCapabilities;
use crate::spi::store::DocumentStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tillbase_types::prelude::Timestamp;

const META_KEYS: [&str; 6] = ["name", "doctype", "docstatus", "owner", "modified", "creation"];

/// The schema the in-memory store implements in full. Capability
/// resolution unions this catalog with whatever custom fields the stored
/// documents actually carry.
const KNOWN_TABLES: &[(&str, &[&str])] = &[
    (
        "Item",
        &["item_code", "item_name", "item_group", "description", "brand", "image", "stock_uom", "standard_rate", "is_stock_item", "is_sales_item", "variant_of", "disabled"],
    ),
    (
        "Bin",
        &["item_code", "warehouse", "actual_qty", "reserved_qty", "projected_qty", "stock_uom", "valuation_rate"],
    ),
    (
        "Item Price",
        &["item_code", "price_list", "price_list_rate", "currency", "selling"],
    ),
    (
        "Item Reorder",
        &["parent", "parenttype", "warehouse", "warehouse_reorder_level", "warehouse_reorder_qty"],
    ),
    ("Item Barcode", &["parent", "parenttype", "barcode", "idx"]),
    (
        "Item Variant Attribute",
        &["parent", "parenttype", "attribute", "attribute_value", "idx"],
    ),
    ("Item Group", &["item_group_name", "is_group"]),
    ("Warehouse", &["warehouse_name", "is_group", "company"]),
    (
        "Customer",
        &["customer_name", "route", "territory", "mobile_no", "primary_address", "email_id", "image", "customer_type", "disabled"],
    ),
    (
        "Customer Credit Limit",
        &["parent", "parenttype", "company", "credit_limit", "bypass_credit_limit_check"],
    ),
    ("Supplier", &["supplier_name", "supplier_group", "country", "disabled"]),
    ("Supplier Account", &["parent", "parenttype", "company", "account"]),
    (
        "Sales Invoice",
        &["customer", "customer_name", "company", "posting_date", "due_date", "status", "currency", "conversion_rate", "net_total", "total", "total_taxes_and_charges", "grand_total", "rounded_total", "rounding_adjustment", "discount_amount", "paid_amount", "change_amount", "write_off_amount", "outstanding_amount", "is_pos", "update_stock", "disable_rounded_total", "is_return", "return_against", "pos_profile", "pos_opening_entry", "payment_terms", "party_account_currency", "contact_display", "contact_mobile", "set_warehouse", "selling_price_list"],
    ),
    (
        "Sales Invoice Item",
        &["parent", "parenttype", "item_code", "item_name", "description", "qty", "rate", "amount", "discount_percentage", "warehouse", "income_account", "cost_center", "idx"],
    ),
    (
        "Sales Invoice Payment",
        &["parent", "parenttype", "mode_of_payment", "amount", "account", "payment_reference", "type", "idx"],
    ),
    (
        "Payment Schedule",
        &["parent", "parenttype", "payment_term", "invoice_portion", "due_date", "mode_of_payment", "idx"],
    ),
    (
        "Payment Entry",
        &["posting_date", "party", "party_type", "payment_type", "mode_of_payment", "paid_amount", "received_amount", "paid_from", "paid_to", "paid_from_account_currency", "paid_to_account_currency", "source_exchange_rate", "target_exchange_rate", "reference_no", "reference_date", "company"],
    ),
    (
        "Payment Entry Reference",
        &["parent", "parenttype", "reference_doctype", "reference_name", "outstanding_amount", "allocated_amount", "total_amount", "idx"],
    ),
    (
        "POS Profile",
        &["company", "currency", "warehouse", "route", "territory", "country", "branch", "apply_discount_on", "cost_center", "selling_price_list", "disabled"],
    ),
    ("POS Profile User", &["parent", "parenttype", "user", "default", "idx"]),
    (
        "POS Payment Method",
        &["parent", "parenttype", "mode_of_payment", "default", "allow_in_returns", "idx"],
    ),
    (
        "POS Opening Entry",
        &["status", "pos_profile", "company", "user", "posting_date", "period_start_date", "period_end_date", "pos_closing_entry"],
    ),
    (
        "POS Opening Entry Detail",
        &["parent", "parenttype", "mode_of_payment", "opening_amount", "idx"],
    ),
    (
        "POS Closing Entry",
        &["pos_opening_entry", "pos_profile", "company", "user", "posting_date", "period_end_date"],
    ),
    ("Company", &["company", "default_currency", "country", "tax_id", "default_payable_account"]),
    ("Currency", &["currency_name", "symbol", "number_format", "enabled"]),
    (
        "Currency Exchange",
        &["from_currency", "to_currency", "date", "exchange_rate"],
    ),
    (
        "Payment Term",
        &["payment_term_name", "invoice_portion", "mode_of_payment", "due_date_based_on", "credit_days", "credit_months", "discount_type", "discount", "description"],
    ),
    ("Territory", &["territory_name", "is_group", "parent_territory"]),
    ("Customer Group", &["customer_group_name", "is_group", "parent_customer_group"]),
    ("Stock Settings", &["allow_negative_stock"]),
    (
        "Activity Log",
        &["subject", "content", "event_type", "reference_doctype", "reference_name", "user", "full_name", "occurred_at"],
    ),
];

/// In-memory document store: the default runtime profile and the test
/// double for the real transactional backend.
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    tables: Arc<RwLock<BTreeMap<String, BTreeMap<String, Document>>>>,
    naming_seq: Arc<AtomicU64>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn series_prefix(doctype: &str) -> String {
        let initials: String = doctype
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .collect::<String>()
            .to_ascii_uppercase();
        if initials.is_empty() {
            "DOC".to_string()
        } else {
            initials
        }
    }

    fn next_name(&self, doctype: &str) -> String {
        let seq = self.naming_seq.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}-{seq:05}", Self::series_prefix(doctype))
    }

    fn strip_meta(fields: &mut Map<String, Value>) {
        for key in META_KEYS {
            fields.remove(key);
        }
    }

    /// Test/bootstrap helper: place a document directly, meta included.
    pub fn seed(&self, doc: Document) {
        let mut tables = self.tables.write();
        tables
            .entry(doc.doctype.clone())
            .or_default()
            .insert(doc.name.clone(), doc);
    }

    /// Test helper: rewrite a document's modified watermark.
    pub fn touch(&self, doctype: &str, name: &str, modified: Timestamp) {
        let mut tables = self.tables.write();
        if let Some(doc) = tables.get_mut(doctype).and_then(|t| t.get_mut(name)) {
            doc.modified = modified;
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, doctype: &str, name: &str) -> Result<Document, StorageError> {
        let tables = self.tables.read();
        tables
            .get(doctype)
            .and_then(|table| table.get(name))
            .cloned()
            .ok_or_else(|| StorageError::not_found(&format!("{doctype} {name} not found")))
    }

    async fn list(&self, doctype: &str, params: QueryParams) -> Result<Listing, StorageError> {
        let tables = self.tables.read();
        let Some(table) = tables.get(doctype) else {
            return Ok(Listing {
                docs: Vec::new(),
                total: 0,
            });
        };

        let mut matched: Vec<Document> = table
            .values()
            .filter(|doc| params.matches(doc))
            .cloned()
            .collect();

        if let Some(order) = &params.order_by {
            matched.sort_by(|a, b| {
                let ra = a.to_row_value();
                let rb = b.to_row_value();
                let va = ra.get(&order.field).cloned().unwrap_or(Value::Null);
                let vb = rb.get(&order.field).cloned().unwrap_or(Value::Null);
                let ordering = compare_values(&va, &vb);
                if order.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        let total = matched.len() as u64;
        let start = (params.offset as usize).min(matched.len());
        let docs = match params.limit {
            Some(limit) => matched
                .into_iter()
                .skip(start)
                .take(limit as usize)
                .collect(),
            None => matched.into_iter().skip(start).collect(),
        };
        Ok(Listing { docs, total })
    }

    async fn insert(
        &self,
        doctype: &str,
        mut fields: Map<String, Value>,
        owner: &str,
    ) -> Result<Document, StorageError> {
        let requested_name = fields
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .filter(|name| !name.trim().is_empty());
        Self::strip_meta(&mut fields);

        let mut doc = Document::new(doctype, fields);
        doc.name = requested_name.unwrap_or_else(|| self.next_name(doctype));
        doc.owner = owner.to_string();

        let mut tables = self.tables.write();
        let table = tables.entry(doctype.to_string()).or_default();
        if table.contains_key(&doc.name) {
            return Err(StorageError::conflict(&format!(
                "{doctype} {} already exists",
                doc.name
            )));
        }
        table.insert(doc.name.clone(), doc.clone());
        Ok(doc)
    }

    async fn save(
        &self,
        doctype: &str,
        name: &str,
        mut patch: Map<String, Value>,
    ) -> Result<Document, StorageError> {
        Self::strip_meta(&mut patch);
        let mut tables = self.tables.write();
        let doc = tables
            .get_mut(doctype)
            .and_then(|table| table.get_mut(name))
            .ok_or_else(|| StorageError::not_found(&format!("{doctype} {name} not found")))?;
        if doc.docstatus == DocStatus::Cancelled {
            return Err(StorageError::validation("cannot modify a cancelled document"));
        }
        for (key, value) in patch {
            doc.fields.insert(key, value);
        }
        doc.modified = Timestamp::now();
        Ok(doc.clone())
    }

    async fn submit(&self, doctype: &str, name: &str) -> Result<Document, StorageError> {
        let mut tables = self.tables.write();
        let doc = tables
            .get_mut(doctype)
            .and_then(|table| table.get_mut(name))
            .ok_or_else(|| StorageError::not_found(&format!("{doctype} {name} not found")))?;
        if doc.docstatus != DocStatus::Draft {
            return Err(StorageError::validation(
                "only draft documents can be submitted",
            ));
        }
        doc.docstatus = DocStatus::Submitted;
        doc.modified = Timestamp::now();
        Ok(doc.clone())
    }

    async fn cancel(&self, doctype: &str, name: &str) -> Result<Document, StorageError> {
        let mut tables = self.tables.write();
        let doc = tables
            .get_mut(doctype)
            .and_then(|table| table.get_mut(name))
            .ok_or_else(|| StorageError::not_found(&format!("{doctype} {name} not found")))?;
        if doc.docstatus != DocStatus::Submitted {
            return Err(StorageError::validation(
                "only submitted documents can be cancelled",
            ));
        }
        doc.docstatus = DocStatus::Cancelled;
        doc.modified = Timestamp::now();
        Ok(doc.clone())
    }

    async fn capabilities(&self) -> Result<SchemaCapabilities, StorageError> {
        let mut caps = SchemaCapabilities::default();
        for (doctype, fields) in KNOWN_TABLES {
            caps = caps.with_table(doctype, fields);
        }
        // Stored documents may carry custom fields beyond the catalog.
        let tables = self.tables.read();
        for (doctype, table) in tables.iter() {
            let fields = caps.tables.entry(doctype.clone()).or_default();
            for doc in table.values() {
                fields.extend(doc.fields.keys().cloned());
            }
        }
        Ok(caps)
    }
}

fn compare_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal);
    }
    a.as_str()
        .unwrap_or_default()
        .cmp(b.as_str().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Filter, OrderBy};
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[tokio::test]
    async fn insert_assigns_series_name_and_draft_status() {
        let store = MemoryDocumentStore::new();
        let doc = store
            .insert("Sales Invoice", fields(json!({"customer": "CUST-1"})), "user@x")
            .await
            .unwrap();
        assert!(doc.name.starts_with("SI-"));
        assert_eq!(doc.docstatus, DocStatus::Draft);
        assert_eq!(doc.owner, "user@x");
    }

    #[tokio::test]
    async fn insert_with_explicit_name_detects_conflict() {
        let store = MemoryDocumentStore::new();
        store
            .insert("Item", fields(json!({"name": "SKU-1"})), "u")
            .await
            .unwrap();
        let err = store
            .insert("Item", fields(json!({"name": "SKU-1"})), "u")
            .await
            .expect_err("duplicate");
        assert_eq!(err.code(), "CONFLICT");
    }

    #[tokio::test]
    async fn submit_then_cancel_walks_docstatus() {
        let store = MemoryDocumentStore::new();
        let doc = store
            .insert("Sales Invoice", Map::new(), "u")
            .await
            .unwrap();
        let submitted = store.submit("Sales Invoice", &doc.name).await.unwrap();
        assert!(submitted.is_submitted());

        let again = store.submit("Sales Invoice", &doc.name).await;
        assert!(again.is_err());

        let cancelled = store.cancel("Sales Invoice", &doc.name).await.unwrap();
        assert_eq!(cancelled.docstatus, DocStatus::Cancelled);

        let err = store
            .save("Sales Invoice", &doc.name, fields(json!({"customer": "X"})))
            .await
            .expect_err("cancelled is frozen");
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn list_filters_orders_and_paginates() {
        let store = MemoryDocumentStore::new();
        for (code, qty) in [("B", 5.0), ("A", 1.0), ("C", 9.0)] {
            store
                .insert(
                    "Bin",
                    fields(json!({"name": code, "warehouse": "WH-1", "actual_qty": qty})),
                    "u",
                )
                .await
                .unwrap();
        }
        store
            .insert(
                "Bin",
                fields(json!({"name": "D", "warehouse": "WH-2", "actual_qty": 3.0})),
                "u",
            )
            .await
            .unwrap();

        let params = QueryParams::default()
            .filter("warehouse", Filter::Eq(json!("WH-1")))
            .order(OrderBy::asc("actual_qty"))
            .page(0, Some(2));
        let listing = store.list("Bin", params).await.unwrap();
        assert_eq!(listing.total, 3);
        assert_eq!(listing.docs.len(), 2);
        assert_eq!(listing.docs[0].name, "A");
        assert!(listing.has_more(0, Some(2)));
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let store = MemoryDocumentStore::new();
        let err = store.get("Customer", "missing").await.expect_err("gone");
        assert_eq!(err.code(), "NOT_FOUND");
        assert!(!store.exists("Customer", "missing").await.unwrap());
    }

    #[tokio::test]
    async fn capabilities_cover_catalog_plus_custom_fields() {
        let store = MemoryDocumentStore::new();
        store
            .insert(
                "Item Price",
                fields(json!({"item_code": "SKU-1", "custom_margin": 0.2})),
                "u",
            )
            .await
            .unwrap();
        let caps = store.capabilities().await.unwrap();
        // Catalog tables are always present, even before any rows exist.
        assert!(caps.has_table("POS Opening Entry"));
        assert!(caps.has_field("POS Opening Entry", "status"));
        // Stored custom fields extend the catalog.
        assert!(caps.has_field("Item Price", "custom_margin"));
        // Tables outside the catalog appear only once documents exist.
        assert!(!caps.has_table("Quality Inspection"));
    }
}
