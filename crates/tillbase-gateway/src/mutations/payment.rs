use crate::mutations::require;
use crate::payloads::{
    coerce_f64, doc_payload, map_str_aliases, map_value_aliases, value_from_aliases,
};
use chrono::NaiveDate;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tillbase_storage::prelude::*;
use tillbase_tx::TxError;
use tillbase_types::prelude::Actor;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentKind {
    /// Customer receipt.
    Receive,
    /// Supplier payment.
    Pay,
    /// Transfer between own accounts.
    InternalTransfer,
}

impl PaymentKind {
    fn payment_type(self) -> &'static str {
        match self {
            PaymentKind::Receive => "Receive",
            PaymentKind::Pay => "Pay",
            PaymentKind::InternalTransfer => "Internal Transfer",
        }
    }

    fn default_party_type(self) -> Option<&'static str> {
        match self {
            PaymentKind::Receive => Some("Customer"),
            PaymentKind::Pay => Some("Supplier"),
            PaymentKind::InternalTransfer => None,
        }
    }
}

const COMMON_ALIASES: [(&str, &[&str]); 11] = [
    ("company", &["company"]),
    ("party_type", &["party_type", "partyType"]),
    (
        "party",
        &["party", "party_id", "partyId", "customer", "customerId", "supplier", "supplierId"],
    ),
    ("mode_of_payment", &["mode_of_payment", "modeOfPayment"]),
    ("paid_from", &["paid_from", "paidFrom"]),
    ("paid_to", &["paid_to", "paidTo"]),
    (
        "paid_to_account_currency",
        &["paid_to_account_currency", "paidToAccountCurrency"],
    ),
    ("source_exchange_rate", &["source_exchange_rate", "sourceExchangeRate"]),
    ("target_exchange_rate", &["target_exchange_rate", "targetExchangeRate"]),
    ("reference_no", &["reference_no", "referenceNo"]),
    ("reference_date", &["reference_date", "referenceDate"]),
];

fn normalize_references(body: &Value, default_doctype: &str) -> Vec<Map<String, Value>> {
    let rows = value_from_aliases(body, &["references"])
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let mut references = Vec::new();
    for raw in rows {
        let Value::Object(mut row) = raw else {
            continue;
        };
        let Some(reference_name) = map_str_aliases(&row, &["reference_name", "referenceName"])
        else {
            continue;
        };
        let reference_doctype = map_str_aliases(&row, &["reference_doctype", "referenceDoctype"])
            .unwrap_or_else(|| default_doctype.to_string());
        row.insert("reference_doctype".into(), json!(reference_doctype));
        row.insert("reference_name".into(), json!(reference_name));
        for field in ["allocated_amount", "outstanding_amount", "total_amount"] {
            let camel = match field {
                "allocated_amount" => "allocatedAmount",
                "outstanding_amount" => "outstandingAmount",
                _ => "totalAmount",
            };
            if row.contains_key(field) || row.contains_key(camel) {
                let amount = coerce_f64(map_value_aliases(&row, &[field, camel]), 0.0);
                row.insert(field.to_string(), json!(amount));
            }
        }
        references.push(row);
    }
    references
}

pub fn normalize_create_payload(
    body: &Value,
    kind: PaymentKind,
    today: NaiveDate,
) -> Map<String, Value> {
    let mut payload = doc_payload(body);
    for (field, aliases) in COMMON_ALIASES {
        if let Some(value) = value_from_aliases(body, aliases) {
            payload.insert(field.to_string(), value.clone());
        }
    }
    payload.insert("payment_type".into(), json!(kind.payment_type()));
    if !payload.contains_key("party_type") {
        if let Some(party_type) = kind.default_party_type() {
            payload.insert("party_type".into(), json!(party_type));
        }
    }
    payload
        .entry("posting_date".to_string())
        .or_insert_with(|| json!(today.to_string()));
    payload.insert(
        "paid_amount".into(),
        json!(coerce_f64(
            value_from_aliases(body, &["paid_amount", "paidAmount"]),
            0.0
        )),
    );
    payload.insert(
        "received_amount".into(),
        json!(coerce_f64(
            value_from_aliases(body, &["received_amount", "receivedAmount"]),
            0.0
        )),
    );

    let default_ref_doctype = match kind {
        PaymentKind::Pay => "Purchase Invoice",
        _ => "Sales Invoice",
    };
    payload.insert(
        "references".into(),
        Value::Array(
            normalize_references(body, default_ref_doctype)
                .into_iter()
                .map(Value::Object)
                .collect(),
        ),
    );

    if kind == PaymentKind::InternalTransfer {
        let empty_party = payload
            .get("party")
            .and_then(Value::as_str)
            .map(|p| p.trim().is_empty())
            .unwrap_or(true);
        if empty_party {
            payload.remove("party");
            payload.remove("party_type");
        }
    }
    payload
}

pub fn validate_create_payload(
    payload: &Map<String, Value>,
    kind: PaymentKind,
) -> Result<(), TxError> {
    let text = |key: &str| {
        payload
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default()
            .to_string()
    };
    if text("company").is_empty() {
        return Err(TxError::validation("company is required"));
    }
    if kind != PaymentKind::InternalTransfer {
        if text("party").is_empty() {
            return Err(TxError::validation("party is required"));
        }
        if text("party_type").is_empty() {
            return Err(TxError::validation("party_type is required"));
        }
    }
    let paid = coerce_f64(payload.get("paid_amount"), 0.0);
    let received = coerce_f64(payload.get("received_amount"), 0.0);
    if paid <= 0.0 && received <= 0.0 {
        return Err(TxError::validation(
            "paid_amount or received_amount must be greater than 0",
        ));
    }
    if let Some(references) = payload.get("references").and_then(Value::as_array) {
        for (idx, reference) in references.iter().enumerate() {
            let position = idx + 1;
            if reference
                .get("reference_name")
                .and_then(Value::as_str)
                .map(str::trim)
                .unwrap_or_default()
                .is_empty()
            {
                return Err(TxError::validation(&format!(
                    "references[{position}].reference_name is required"
                )));
            }
            if coerce_f64(reference.get("allocated_amount"), 0.0) <= 0.0 {
                return Err(TxError::validation(&format!(
                    "references[{position}].allocated_amount must be greater than 0"
                )));
            }
        }
    }
    Ok(())
}

/// Supplier payments default `paid_to` from the supplier's configured
/// payable account, then the company default.
async fn resolve_payable_account(
    store: &Arc<dyn DocumentStore>,
    payload: &Map<String, Value>,
) -> Result<Option<String>, TxError> {
    let company = payload
        .get("company")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();
    let party = payload
        .get("party")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();

    if !company.is_empty() && !party.is_empty() {
        let listing = store
            .list(
                "Supplier Account",
                QueryParams::default()
                    .filter("parent", Filter::Eq(json!(party)))
                    .filter("company", Filter::Eq(json!(company)))
                    .page(0, Some(1)),
            )
            .await?;
        if let Some(doc) = listing.docs.first() {
            if let Some(account) = doc.field_str("account").filter(|a| !a.trim().is_empty()) {
                return Ok(Some(account.to_string()));
            }
        }
    }
    if !company.is_empty() {
        match store.get("Company", &company).await {
            Ok(doc) => {
                if let Some(account) = doc
                    .field_str("default_payable_account")
                    .filter(|a| !a.trim().is_empty())
                {
                    return Ok(Some(account.to_string()));
                }
            }
            Err(err) if err.code() == "NOT_FOUND" => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(None)
}

pub async fn create_submit(
    store: &Arc<dyn DocumentStore>,
    checker: &dyn PermissionChecker,
    actor: &Actor,
    body: &Value,
    kind: PaymentKind,
    today: NaiveDate,
) -> Result<(Value, Option<DocRef>), TxError> {
    require(checker, actor, "Payment Entry", &[Action::Create, Action::Submit])?;

    let mut payload = normalize_create_payload(body, kind, today);
    if kind == PaymentKind::Pay {
        let missing_paid_to = payload
            .get("paid_to")
            .and_then(Value::as_str)
            .map(|v| v.trim().is_empty())
            .unwrap_or(true);
        if missing_paid_to {
            if let Some(account) = resolve_payable_account(store, &payload).await? {
                payload.insert("paid_to".into(), json!(account));
            }
        }
    }
    validate_create_payload(&payload, kind)?;

    let references = payload
        .remove("references")
        .and_then(|v| v.as_array().cloned())
        .unwrap_or_default();
    let doc = store.insert("Payment Entry", payload, &actor.user.0).await?;
    for (idx, reference) in references.iter().enumerate() {
        let mut fields = reference.as_object().cloned().unwrap_or_default();
        fields.insert("parent".into(), json!(doc.name));
        fields.insert("parenttype".into(), json!("Payment Entry"));
        fields.insert("idx".into(), json!(idx as u64 + 1));
        store
            .insert("Payment Entry Reference", fields, &actor.user.0)
            .await?;
    }
    let doc = store.submit("Payment Entry", &doc.name).await?;

    let summary = json!({
        "name": doc.name,
        "docstatus": u8::from(doc.docstatus),
        "payment_type": doc.field_str("payment_type"),
        "party_type": doc.field_str("party_type"),
        "party": doc.field_str("party"),
        "paid_amount": doc.field_f64("paid_amount"),
        "received_amount": doc.field_f64("received_amount"),
        "posting_date": doc.field_str("posting_date"),
        "modified": doc.modified.0,
    });
    Ok((summary, Some(DocRef::new("Payment Entry", &doc.name))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn pay_defaults_party_type_and_reference_doctype() {
        let body = json!({
            "company": "Main Co",
            "supplierId": "SUPP-1",
            "paidAmount": 50,
            "references": [{"referenceName": "PINV-1", "allocatedAmount": 50}],
        });
        let payload = normalize_create_payload(&body, PaymentKind::Pay, date());
        assert_eq!(payload["payment_type"], "Pay");
        assert_eq!(payload["party_type"], "Supplier");
        assert_eq!(payload["party"], "SUPP-1");
        let references = payload["references"].as_array().unwrap();
        assert_eq!(references[0]["reference_doctype"], "Purchase Invoice");
        assert!(validate_create_payload(&payload, PaymentKind::Pay).is_ok());
    }

    #[test]
    fn internal_transfer_drops_empty_party() {
        let body = json!({"company": "Main Co", "paid_amount": 10, "party": "  "});
        let payload = normalize_create_payload(&body, PaymentKind::InternalTransfer, date());
        assert!(!payload.contains_key("party"));
        assert_eq!(payload["payment_type"], "Internal Transfer");
        assert!(validate_create_payload(&payload, PaymentKind::InternalTransfer).is_ok());
    }

    #[test]
    fn amounts_and_references_are_validated() {
        let body = json!({"company": "Main Co", "party": "C", "party_type": "Customer"});
        let payload = normalize_create_payload(&body, PaymentKind::Receive, date());
        let err = validate_create_payload(&payload, PaymentKind::Receive).expect_err("no amount");
        assert!(err.0.message_user.contains("greater than 0"));

        let body = json!({
            "company": "Main Co",
            "party": "C",
            "paid_amount": 10,
            "references": [{"reference_name": "SI-1", "allocated_amount": 0}],
        });
        let payload = normalize_create_payload(&body, PaymentKind::Receive, date());
        let err = validate_create_payload(&payload, PaymentKind::Receive).expect_err("allocation");
        assert!(err.0.message_user.contains("allocated_amount"));
    }
}
