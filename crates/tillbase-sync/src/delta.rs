use crate::bootstrap::SyncPlanner;
use crate::errors::SyncError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tillbase_config::Settings;
use tillbase_storage::prelude::*;
use tillbase_types::prelude::Actor;

const INVENTORY_ALIASES: [&str; 10] = [
    "inventory",
    "inventory_item",
    "inventory_items",
    "warehouseitem",
    "warehouse_item",
    "warehouse_items",
    "bin",
    "item",
    "item price",
    "item_price",
];
const CUSTOMER_ALIASES: [&str; 2] = ["customer", "customers"];
const SALES_INVOICE_ALIASES: [&str; 4] = [
    "sales invoice",
    "sales_invoice",
    "salesinvoices",
    "salesinvoicedto",
];
const PAYMENT_ENTRY_ALIASES: [&str; 4] = [
    "payment entry",
    "payment_entry",
    "paymententries",
    "paymententrydto",
];

/// Map the client's loose entity-type spelling onto the canonical family
/// name; unknown names pass through untouched.
pub fn canonical_entity_type(raw: &str) -> String {
    let key = raw.trim().to_lowercase();
    if INVENTORY_ALIASES.contains(&key.as_str()) {
        "Inventory".to_string()
    } else if CUSTOMER_ALIASES.contains(&key.as_str()) {
        "Customer".to_string()
    } else if SALES_INVOICE_ALIASES.contains(&key.as_str()) {
        "Sales Invoice".to_string()
    } else if PAYMENT_ENTRY_ALIASES.contains(&key.as_str()) {
        "Payment Entry".to_string()
    } else {
        raw.trim().to_string()
    }
}

fn default_doc_types() -> Vec<String> {
    vec![
        "Customer".to_string(),
        "Inventory".to_string(),
        "Sales Invoice".to_string(),
        "Payment Entry".to_string(),
    ]
}

#[derive(Clone, Debug, Deserialize)]
pub struct DeltaRequest {
    /// Epoch-ms lower bound; the protocol keeps no server-side cursor.
    #[serde(default, alias = "modifiedSince")]
    pub modified_since: i64,
    #[serde(default = "default_doc_types", alias = "doctypes", alias = "docTypes")]
    pub doc_types: Vec<String>,
    #[serde(default, alias = "profileName", alias = "pos_profile", alias = "posProfile")]
    pub profile_name: Option<String>,
    #[serde(default, alias = "warehouse_id", alias = "warehouseId")]
    pub warehouse: Option<String>,
    #[serde(default, alias = "priceList")]
    pub price_list: Option<String>,
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub territory: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct DeltaContext {
    pub warehouse: Option<String>,
    pub price_list: Option<String>,
    pub route: Option<String>,
    pub territory: Option<String>,
    pub profile_name: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct DeltaData {
    pub modified_since: i64,
    pub changes: BTreeMap<String, Value>,
    pub context: DeltaContext,
}

impl SyncPlanner {
    pub async fn pull_delta(
        &self,
        _actor: &Actor,
        request: &DeltaRequest,
        settings: &Settings,
    ) -> Result<DeltaData, SyncError> {
        if request.modified_since <= 0 {
            return Err(SyncError::validation("modified_since is required"));
        }

        let profile_name = request
            .profile_name
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        let detail = match &profile_name {
            Some(name) => self.profiles().profile_detail(name).await?,
            None => None,
        };

        let warehouse = non_empty(request.warehouse.as_deref())
            .or_else(|| detail.as_ref().map(|d| d.warehouse.clone()).filter(|w| !w.is_empty()));
        let price_list = non_empty(request.price_list.as_deref()).or_else(|| {
            detail
                .as_ref()
                .map(|d| d.selling_price_list.clone())
                .filter(|p| !p.is_empty())
        });
        let route = non_empty(request.route.as_deref())
            .or_else(|| detail.as_ref().map(|d| d.route.clone()).filter(|r| !r.is_empty()))
            .or_else(|| {
                detail
                    .as_ref()
                    .map(|d| d.territory.clone())
                    .filter(|t| !t.is_empty())
            });
        let territory = non_empty(request.territory.as_deref()).or_else(|| route.clone());

        let mut doc_types: Vec<String> = Vec::new();
        for raw in &request.doc_types {
            if raw.trim().is_empty() {
                continue;
            }
            let canonical = canonical_entity_type(raw);
            if !doc_types.contains(&canonical) {
                doc_types.push(canonical);
            }
        }

        let mut changes: BTreeMap<String, Value> = BTreeMap::new();
        for doctype in &doc_types {
            let rows = match doctype.as_str() {
                "Inventory" => {
                    self.inventory_delta(
                        settings,
                        warehouse.as_deref(),
                        price_list.as_deref().unwrap_or(""),
                        request.modified_since,
                    )
                    .await?
                }
                "Customer" => {
                    let customers = self
                        .customers()
                        .customers(
                            route.as_deref(),
                            territory.as_deref(),
                            Some(request.modified_since),
                            true,
                        )
                        .await?;
                    to_value(customers)?
                }
                "Sales Invoice" => {
                    let invoices = self
                        .invoices()
                        .delta(request.modified_since, profile_name.as_deref())
                        .await?;
                    to_value(invoices)?
                }
                "Payment Entry" => {
                    let entries = self.payments().delta(request.modified_since).await?;
                    to_value(entries)?
                }
                other => self.generic_delta(other, request.modified_since).await?,
            };
            changes.insert(doctype.clone(), rows);
        }

        Ok(DeltaData {
            modified_since: request.modified_since,
            changes,
            context: DeltaContext {
                warehouse,
                price_list,
                route,
                territory,
                profile_name,
            },
        })
    }

    /// Inventory delta: union the item codes touched by stock, master, and
    /// price changes, then rebuild full rows for exactly that set.
    async fn inventory_delta(
        &self,
        settings: &Settings,
        warehouse: Option<&str>,
        price_list: &str,
        modified_since: i64,
    ) -> Result<Value, SyncError> {
        let Some(warehouse) = warehouse.filter(|w| !w.is_empty()) else {
            return Ok(Value::Array(Vec::new()));
        };
        let codes = self
            .inventory()
            .delta_codes(warehouse, price_list, modified_since)
            .await?;
        if codes.is_empty() {
            return Ok(Value::Array(Vec::new()));
        }
        tracing::debug!(
            target: "tillbase::sync",
            warehouse,
            touched = codes.len(),
            "rebuilding inventory rows for delta"
        );
        let rows = self
            .inventory()
            .rows_for_codes(warehouse, price_list, &codes)
            .await?;
        let (visible, _alerts) = self
            .alerts_and_visible_rows(settings, warehouse, rows, false)
            .await?;
        to_value(visible)
    }

    async fn generic_delta(&self, doctype: &str, modified_since: i64) -> Result<Value, SyncError> {
        if !self.caps.has_table(doctype) {
            return Ok(Value::Array(Vec::new()));
        }
        let listing = self
            .store
            .list(
                doctype,
                QueryParams::default()
                    .filter("modified", Filter::Gte(Value::from(modified_since)))
                    .order(OrderBy::asc("modified")),
            )
            .await?;
        let rows: Vec<Value> = listing
            .docs
            .iter()
            .map(|doc| {
                json!({
                    "name": doc.name,
                    "modified": doc.modified.0,
                    "docstatus": u8::from(doc.docstatus),
                })
            })
            .collect();
        Ok(Value::Array(rows))
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn to_value<T: Serialize>(rows: T) -> Result<Value, SyncError> {
    serde_json::to_value(rows).map_err(|err| SyncError::internal(&format!("serialize delta: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_canonicalize_to_family_names() {
        for alias in ["bin", "Item Price", "warehouse_items", "ITEM"] {
            assert_eq!(canonical_entity_type(alias), "Inventory");
        }
        assert_eq!(canonical_entity_type("customers"), "Customer");
        assert_eq!(canonical_entity_type("salesinvoicedto"), "Sales Invoice");
        assert_eq!(canonical_entity_type("paymententries"), "Payment Entry");
        assert_eq!(canonical_entity_type("Delivery Note"), "Delivery Note");
    }

    #[test]
    fn default_doc_types_cover_the_four_families() {
        let defaults = default_doc_types();
        assert_eq!(
            defaults,
            vec!["Customer", "Inventory", "Sales Invoice", "Payment Entry"]
        );
    }
}
