use crate::mutations::require;
use crate::payloads::{coerce_f64, doc_payload, map_str_aliases, map_value_aliases, str_from_aliases, value_from_aliases};
use chrono::NaiveDate;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tillbase_storage::prelude::*;
use tillbase_sync::prelude::ProfileReader;
use tillbase_tx::TxError;
use tillbase_types::prelude::Actor;

/// Strip template placeholders like `{{profile}}` that unconfigured
/// clients send verbatim.
fn clean_scalar(value: Option<String>) -> Option<String> {
    let text = value?.trim().to_string();
    if text.is_empty() || (text.starts_with("{{") && text.ends_with("}}")) {
        return None;
    }
    Some(text)
}

async fn resolve_profile_for_opening(
    profiles: &ProfileReader,
    actor: &Actor,
    requested: Option<String>,
) -> Result<String, TxError> {
    let accessible = profiles
        .accessible_profiles(actor)
        .await
        .map_err(|err| TxError(Box::new(err.into_inner())))?;
    if accessible.is_empty() {
        return Err(TxError::validation("User does not have accessible POS Profile"));
    }
    if let Some(requested) = clean_scalar(requested) {
        if !accessible.iter().any(|p| p.name == requested) {
            return Err(TxError::validation(&format!(
                "User {} does not have access to POS Profile {requested}.",
                actor.user
            )));
        }
        return Ok(requested);
    }
    Ok(accessible
        .iter()
        .find(|p| p.is_default)
        .unwrap_or(&accessible[0])
        .name
        .clone())
}

/// Opening balance rows: explicit rows from the payload, else a single
/// mode from scalars, else one zero row per profile payment method.
async fn normalize_balance_details(
    profiles: &ProfileReader,
    profile: &str,
    body: &Value,
) -> Result<Vec<Value>, TxError> {
    if let Some(rows) = value_from_aliases(body, &["balance_details", "balanceDetails"])
        .and_then(Value::as_array)
    {
        let mut output = Vec::new();
        for raw in rows {
            let Some(row) = raw.as_object() else {
                continue;
            };
            let Some(mode) =
                clean_scalar(map_str_aliases(row, &["mode_of_payment", "modeOfPayment"]))
            else {
                continue;
            };
            let amount = coerce_f64(map_value_aliases(row, &["opening_amount", "openingAmount"]), 0.0);
            output.push(json!({"mode_of_payment": mode, "opening_amount": amount}));
        }
        if !output.is_empty() {
            return Ok(output);
        }
    }

    let opening_amount = coerce_f64(
        value_from_aliases(body, &["opening_amount", "openingAmount"]),
        0.0,
    );
    if let Some(mode) = clean_scalar(str_from_aliases(body, &["mode_of_payment", "modeOfPayment"])) {
        return Ok(vec![json!({"mode_of_payment": mode, "opening_amount": opening_amount})]);
    }

    let detail = profiles
        .profile_detail(profile)
        .await
        .map_err(|err| TxError(Box::new(err.into_inner())))?;
    let modes: Vec<String> = detail
        .map(|d| {
            d.payments
                .into_iter()
                .map(|p| p.mode_of_payment)
                .filter(|m| !m.is_empty())
                .collect()
        })
        .unwrap_or_default();
    if modes.is_empty() {
        return Err(TxError::validation(
            "No mode_of_payment found for POS Profile. Provide payload.mode_of_payment or configure POS Profile payments.",
        ));
    }
    Ok(modes
        .into_iter()
        .map(|mode| json!({"mode_of_payment": mode, "opening_amount": opening_amount}))
        .collect())
}

/// Open a register shift: reuse the caller's already-open entry for the
/// profile when one exists, otherwise insert + submit a new one.
pub async fn opening_create_submit(
    store: &Arc<dyn DocumentStore>,
    checker: &dyn PermissionChecker,
    profiles: &ProfileReader,
    actor: &Actor,
    body: &Value,
    today: NaiveDate,
) -> Result<(Value, Option<DocRef>), TxError> {
    require(checker, actor, "POS Opening Entry", &[Action::Create, Action::Submit])?;

    let requested = str_from_aliases(
        body,
        &["pos_profile", "posProfile", "profile_name", "profileName"],
    );
    let profile = resolve_profile_for_opening(profiles, actor, requested).await?;

    if let Some(user) = clean_scalar(str_from_aliases(body, &["user"])) {
        if user != actor.user.0 {
            return Err(TxError::validation("payload.user must match authenticated user"));
        }
    }

    if let Some(existing) = profiles
        .find_existing_open_shift(&actor.user.0, Some(&profile))
        .await
        .map_err(|err| TxError(Box::new(err.into_inner())))?
    {
        let summary = json!({
            "name": existing.name,
            "reused": true,
            "status": if existing.status.is_empty() { "Open".to_string() } else { existing.status },
        });
        let reference = DocRef::new("POS Opening Entry", summary["name"].as_str().unwrap_or(""));
        return Ok((summary, Some(reference)));
    }

    let company = match clean_scalar(str_from_aliases(body, &["company"])) {
        Some(company) => company,
        None => match store.get("POS Profile", &profile).await {
            Ok(doc) => doc.field_str("company").unwrap_or_default().to_string(),
            Err(_) => String::new(),
        },
    };
    if company.is_empty() {
        return Err(TxError::validation(&format!(
            "Company could not be resolved for POS Profile {profile}"
        )));
    }

    let mut payload: Map<String, Value> = doc_payload(body);
    payload.remove("balance_details");
    payload.remove("balanceDetails");
    payload.insert("pos_profile".into(), json!(profile));
    payload.insert("company".into(), json!(company));
    payload.insert("user".into(), json!(actor.user.0));
    payload.insert("status".into(), json!("Open"));
    payload
        .entry("posting_date".to_string())
        .or_insert_with(|| json!(today.to_string()));
    payload
        .entry("period_start_date".to_string())
        .or_insert_with(|| json!(format!("{today} 00:00:00")));
    let balance_details = normalize_balance_details(profiles, &profile, body).await?;

    let doc = store
        .insert("POS Opening Entry", payload, &actor.user.0)
        .await?;
    for (idx, row) in balance_details.iter().enumerate() {
        let mut fields = row.as_object().cloned().unwrap_or_default();
        fields.insert("parent".into(), json!(doc.name));
        fields.insert("parenttype".into(), json!("POS Opening Entry"));
        fields.insert("idx".into(), json!(idx as u64 + 1));
        store
            .insert("POS Opening Entry Detail", fields, &actor.user.0)
            .await?;
    }
    let doc = store.submit("POS Opening Entry", &doc.name).await?;

    let summary = json!({"name": doc.name});
    Ok((summary, Some(DocRef::new("POS Opening Entry", &doc.name))))
}

/// Close a shift: insert + submit the closing entry and mark the opening
/// entry closed so later bootstraps demand a fresh shift.
pub async fn closing_create_submit(
    store: &Arc<dyn DocumentStore>,
    checker: &dyn PermissionChecker,
    actor: &Actor,
    body: &Value,
    today: NaiveDate,
) -> Result<(Value, Option<DocRef>), TxError> {
    require(checker, actor, "POS Closing Entry", &[Action::Create, Action::Submit])?;

    let mut payload = doc_payload(body);
    payload
        .entry("posting_date".to_string())
        .or_insert_with(|| json!(today.to_string()));
    let opening = payload
        .get("pos_opening_entry")
        .and_then(Value::as_str)
        .map(str::to_string);

    let doc = store
        .insert("POS Closing Entry", payload, &actor.user.0)
        .await?;
    let doc = store.submit("POS Closing Entry", &doc.name).await?;

    if let Some(opening) = opening.filter(|o| !o.trim().is_empty()) {
        let mut patch = Map::new();
        patch.insert("status".into(), json!("Closed"));
        patch.insert("pos_closing_entry".into(), json!(doc.name));
        if let Err(err) = store.save("POS Opening Entry", &opening, patch).await {
            // The closing entry stands on its own; a missing opening link
            // only degrades shift bookkeeping.
            tracing::warn!(
                target: "tillbase::gateway",
                opening,
                "could not link closing entry: {err:?}"
            );
        }
    }

    let summary = json!({"name": doc.name});
    Ok((summary, Some(DocRef::new("POS Closing Entry", &doc.name))))
}
