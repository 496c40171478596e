use crate::mutations::{field_or_null, require};
use crate::payloads::{
    coerce_bool, coerce_f64, doc_payload, map_str_aliases, map_value_aliases, str_from_aliases,
    value_from_aliases,
};
use chrono::NaiveDate;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tillbase_storage::prelude::*;
use tillbase_tx::TxError;
use tillbase_types::prelude::Actor;

const ALIASED_FIELDS: [(&str, &[&str]); 18] = [
    ("customer", &["customer", "customer_id", "customerId"]),
    ("customer_name", &["customer_name", "customerName"]),
    ("company", &["company"]),
    ("posting_date", &["posting_date", "postingDate"]),
    ("due_date", &["due_date", "dueDate"]),
    ("territory", &["territory"]),
    ("is_pos", &["is_pos", "isPos"]),
    ("update_stock", &["update_stock", "updateStock"]),
    ("set_warehouse", &["set_warehouse", "setWarehouse"]),
    (
        "selling_price_list",
        &["selling_price_list", "sellingPriceList", "price_list", "priceList"],
    ),
    ("currency", &["currency"]),
    ("conversion_rate", &["conversion_rate", "conversionRate"]),
    ("grand_total", &["grand_total", "grandTotal"]),
    ("rounded_total", &["rounded_total", "roundedTotal"]),
    ("is_return", &["is_return", "isReturn"]),
    ("return_against", &["return_against", "returnAgainst"]),
    ("pos_profile", &["pos_profile", "posProfile"]),
    ("pos_opening_entry", &["pos_opening_entry", "posOpeningEntry"]),
];

fn normalize_items(body: &Value, default_warehouse: Option<&str>) -> Vec<Map<String, Value>> {
    let rows = value_from_aliases(body, &["items", "invoice_items", "invoiceItems"])
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let mut items = Vec::new();
    for raw in rows {
        let Value::Object(mut row) = raw else {
            continue;
        };
        let Some(item_code) = map_str_aliases(&row, &["item_code", "itemCode"]) else {
            continue;
        };
        let qty = coerce_f64(map_value_aliases(&row, &["qty", "quantity"]), 0.0);
        let rate = map_value_aliases(&row, &["rate", "price"]).map(|v| coerce_f64(Some(v), 0.0));
        let amount = row
            .get("amount")
            .map(|v| coerce_f64(Some(v), 0.0))
            .or(rate.map(|r| qty * r));

        row.insert("item_code".into(), json!(item_code));
        row.insert("qty".into(), json!(qty));
        if let Some(rate) = rate {
            row.insert("rate".into(), json!(rate));
        }
        if let Some(amount) = amount {
            row.insert("amount".into(), json!(amount));
        }
        let has_warehouse = row
            .get("warehouse")
            .and_then(Value::as_str)
            .map(|w| !w.trim().is_empty())
            .unwrap_or(false);
        if !has_warehouse {
            if let Some(warehouse) = default_warehouse {
                row.insert("warehouse".into(), json!(warehouse));
            }
        }
        items.push(row);
    }
    items
}

fn normalize_payments(body: &Value) -> Vec<Map<String, Value>> {
    let rows = value_from_aliases(body, &["payments"])
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let mut payments = Vec::new();
    for raw in rows {
        let Value::Object(mut row) = raw else {
            continue;
        };
        let Some(mode) = map_str_aliases(&row, &["mode_of_payment", "modeOfPayment"]) else {
            continue;
        };
        let amount = coerce_f64(row.get("amount"), 0.0);
        row.insert("mode_of_payment".into(), json!(mode));
        row.insert("amount".into(), json!(amount));
        if !row.contains_key("type") {
            row.insert("type".into(), json!("Receive"));
        }
        payments.push(row);
    }
    payments
}

pub fn normalize_create_payload(body: &Value, today: NaiveDate) -> Map<String, Value> {
    let mut payload = doc_payload(body);
    let default_warehouse = str_from_aliases(body, &["set_warehouse", "setWarehouse"]);

    for (field, aliases) in ALIASED_FIELDS {
        if let Some(value) = value_from_aliases(body, aliases) {
            payload.insert(field.to_string(), value.clone());
        }
    }
    payload
        .entry("posting_date".to_string())
        .or_insert_with(|| json!(today.to_string()));

    payload.insert(
        "items".into(),
        Value::Array(
            normalize_items(body, default_warehouse.as_deref())
                .into_iter()
                .map(Value::Object)
                .collect(),
        ),
    );
    payload.insert(
        "payments".into(),
        Value::Array(normalize_payments(body).into_iter().map(Value::Object).collect()),
    );
    payload
}

pub fn validate_create_payload(payload: &Map<String, Value>) -> Result<(), TxError> {
    let company = payload
        .get("company")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    let customer = payload
        .get("customer")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    let items = payload
        .get("items")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let is_return = coerce_bool(payload.get("is_return"), false);

    if company.is_empty() {
        return Err(TxError::validation("company is required"));
    }
    if customer.is_empty() {
        return Err(TxError::validation("customer is required"));
    }
    if items.is_empty() {
        return Err(TxError::validation("items are required"));
    }
    for (idx, item) in items.iter().enumerate() {
        let position = idx + 1;
        let qty = coerce_f64(item.get("qty"), 0.0);
        if item
            .get("item_code")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default()
            .is_empty()
        {
            return Err(TxError::validation(&format!(
                "items[{position}].item_code is required"
            )));
        }
        if qty == 0.0 {
            return Err(TxError::validation(&format!(
                "items[{position}].qty cannot be 0"
            )));
        }
        if qty < 0.0 && !is_return {
            return Err(TxError::validation(&format!(
                "items[{position}].qty cannot be negative on non-return invoice"
            )));
        }
    }
    Ok(())
}

/// Validate, insert, and submit a sales invoice as one logical unit,
/// materializing item/payment child rows for the sync readers.
pub async fn create_submit(
    store: &Arc<dyn DocumentStore>,
    checker: &dyn PermissionChecker,
    actor: &Actor,
    body: &Value,
    today: NaiveDate,
) -> Result<(Value, Option<DocRef>), TxError> {
    require(checker, actor, "Sales Invoice", &[Action::Create, Action::Submit])?;

    let mut payload = normalize_create_payload(body, today);
    validate_create_payload(&payload)?;

    let items = payload
        .remove("items")
        .and_then(|v| v.as_array().cloned())
        .unwrap_or_default();
    let payments = payload
        .remove("payments")
        .and_then(|v| v.as_array().cloned())
        .unwrap_or_default();
    let items_count = items.len();
    let payments_count = payments.len();

    let doc = store
        .insert("Sales Invoice", payload, &actor.user.0)
        .await?;
    for (idx, row) in items.iter().enumerate() {
        let mut fields = row.as_object().cloned().unwrap_or_default();
        fields.insert("parent".into(), json!(doc.name));
        fields.insert("parenttype".into(), json!("Sales Invoice"));
        fields.insert("idx".into(), json!(idx as u64 + 1));
        store
            .insert("Sales Invoice Item", fields, &actor.user.0)
            .await?;
    }
    for (idx, row) in payments.iter().enumerate() {
        let mut fields = row.as_object().cloned().unwrap_or_default();
        fields.insert("parent".into(), json!(doc.name));
        fields.insert("parenttype".into(), json!("Sales Invoice"));
        fields.insert("idx".into(), json!(idx as u64 + 1));
        store
            .insert("Sales Invoice Payment", fields, &actor.user.0)
            .await?;
    }
    let doc = store.submit("Sales Invoice", &doc.name).await?;

    let summary = json!({
        "name": doc.name,
        "docstatus": u8::from(doc.docstatus),
        "status": field_or_null(&doc, "status"),
        "company": field_or_null(&doc, "company"),
        "customer": field_or_null(&doc, "customer"),
        "customer_name": field_or_null(&doc, "customer_name"),
        "posting_date": field_or_null(&doc, "posting_date"),
        "grand_total": doc.field_f64("grand_total"),
        "outstanding_amount": doc.field_f64("outstanding_amount"),
        "modified": doc.modified.0,
        "items_count": items_count,
        "payments_count": payments_count,
    });
    let reference = DocRef::new("Sales Invoice", &doc.name);
    Ok((summary, Some(reference)))
}

/// Cancel by name; the permission check sees the loaded document.
pub async fn cancel(
    store: &Arc<dyn DocumentStore>,
    checker: &dyn PermissionChecker,
    actor: &Actor,
    body: &Value,
) -> Result<(Value, Option<DocRef>), TxError> {
    let name = str_from_aliases(body, &["name", "sales_invoice", "invoice_name", "invoiceName"])
        .ok_or_else(|| TxError::validation("name is required"))?;

    let doc = store.get("Sales Invoice", &name).await?;
    enforce_permission(checker, actor, "Sales Invoice", Action::Cancel, Some(&doc))?;
    let doc = store.cancel("Sales Invoice", &name).await?;

    let summary = json!({
        "name": doc.name,
        "docstatus": u8::from(doc.docstatus),
    });
    Ok((summary, Some(DocRef::new("Sales Invoice", &doc.name))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn normalization_fills_warehouse_and_amount() {
        let body = json!({
            "customerId": "CUST-1",
            "company": "Main Co",
            "setWarehouse": "WH-1",
            "items": [
                {"itemCode": "SKU-1", "qty": 2, "rate": 5},
                {"qty": 1},
            ],
            "payments": [{"modeOfPayment": "Cash", "amount": 10}],
        });
        let payload = normalize_create_payload(&body, date());
        assert_eq!(payload["customer"], "CUST-1");
        assert_eq!(payload["posting_date"], "2024-06-01");
        let items = payload["items"].as_array().unwrap();
        assert_eq!(items.len(), 1, "row without item_code dropped");
        assert_eq!(items[0]["amount"], 10.0);
        assert_eq!(items[0]["warehouse"], "WH-1");
        let payments = payload["payments"].as_array().unwrap();
        assert_eq!(payments[0]["type"], "Receive");
    }

    #[test]
    fn validation_rejects_zero_and_negative_quantities() {
        let mut payload = normalize_create_payload(
            &json!({
                "customer": "C",
                "company": "Co",
                "items": [{"item_code": "SKU-1", "qty": 0}],
            }),
            date(),
        );
        let err = validate_create_payload(&payload).expect_err("zero qty");
        assert!(err.0.message_user.contains("qty cannot be 0"));

        payload.insert("items".into(), json!([{"item_code": "SKU-1", "qty": -1.0}]));
        let err = validate_create_payload(&payload).expect_err("negative qty");
        assert!(err.0.message_user.contains("negative"));

        payload.insert("is_return".into(), json!(1));
        assert!(validate_create_payload(&payload).is_ok(), "returns may be negative");
    }

    #[test]
    fn validation_requires_header_fields() {
        let payload = normalize_create_payload(&json!({"items": []}), date());
        let err = validate_create_payload(&payload).expect_err("missing company");
        assert_eq!(err.0.message_user, "company is required");
    }
}
