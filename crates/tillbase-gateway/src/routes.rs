use crate::envelope::{ok_response, ApiError, ApiResult};
use crate::mutations::{invoice, payment, payment::PaymentKind, session};
use crate::payloads::{
    coerce_bool, coerce_f64, coerce_i64, request_id_from_body, str_from_aliases, value_from_aliases,
};
use crate::state::AppState;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tillbase_config::{AlertRuleConfig, Settings};
use tillbase_observe::prelude::*;
use tillbase_storage::prelude::*;
use tillbase_sync::prelude::*;
use tillbase_tx::prelude::*;
use tillbase_types::prelude::{Actor, WarehouseId};

pub async fn health() -> Response {
    ok_response(json!({"status": "ok"}), None)
}

pub async fn version(State(state): State<AppState>) -> Response {
    ok_response(
        json!({
            "version": state.version.version,
            "commit": state.version.commit,
        }),
        None,
    )
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    ok_response(state.metrics.snapshot(), None)
}

// ---------------------------------------------------------------------------
// Read endpoints
// ---------------------------------------------------------------------------

pub async fn sync_bootstrap(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult {
    let (actor, settings) = state.authorize(&headers)?;
    let request: BootstrapRequest = serde_json::from_value(body)
        .map_err(|err| ApiError::validation(&format!("invalid bootstrap request: {err}")))?;
    let data = state
        .planner
        .bootstrap(&actor, &request, &settings, Utc::now().date_naive())
        .await?;
    Ok(ok_response(serde_json::to_value(data).unwrap_or(Value::Null), None))
}

pub async fn sync_delta(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult {
    let (actor, settings) = state.authorize(&headers)?;
    let request: DeltaRequest = serde_json::from_value(body)
        .map_err(|err| ApiError::validation(&format!("invalid delta request: {err}")))?;
    let data = state.planner.pull_delta(&actor, &request, &settings).await?;
    Ok(ok_response(serde_json::to_value(data).unwrap_or(Value::Null), None))
}

pub async fn inventory_alerts(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult {
    let (_actor, settings) = state.authorize(&headers)?;
    let warehouse = str_from_aliases(&body, &["warehouse", "warehouse_id", "warehouseId"])
        .ok_or_else(|| ApiError::validation("warehouse is required"))?;
    let price_list = str_from_aliases(&body, &["price_list", "priceList"]).unwrap_or_default();

    if !settings.enable_inventory_alerts {
        return Ok(ok_response(json!({"alerts": []}), None));
    }
    let inventory = state.planner.inventory();
    let (rows, _info) = inventory.snapshot_page(&warehouse, &price_list, 0, 0).await?;
    let reorders = inventory.reorder_levels(&warehouse, &rows).await?;
    let engine = state.planner.alert_engine(&settings);
    let alerts = engine.evaluate(&WarehouseId(warehouse.clone()), &rows, &reorders);
    Ok(ok_response(json!({"alerts": alerts}), None))
}

pub async fn customers_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult {
    let (_actor, _settings) = state.authorize(&headers)?;
    let route = str_from_aliases(&body, &["route"]);
    let territory = str_from_aliases(&body, &["territory"]);
    let profile = str_from_aliases(
        &body,
        &["pos_profile", "posProfile", "profile_name", "profileName"],
    );
    let mut company = str_from_aliases(&body, &["company", "company_name", "companyName"]);
    if company.is_none() {
        if let Some(profile) = &profile {
            if let Some(detail) = state.planner.profiles().profile_detail(profile).await? {
                company = Some(detail.company).filter(|c| !c.is_empty());
            }
        }
    }

    let reader = state.planner.customers();
    let mut customers = reader
        .customers(route.as_deref(), territory.as_deref(), None, false)
        .await?;
    let names: Vec<String> = customers.iter().map(|c| c.name.clone()).collect();
    let outstanding = reader
        .outstanding_summary(&names, profile.as_deref(), company.as_deref())
        .await?;

    let rows: Vec<Value> = customers
        .iter_mut()
        .map(|customer| {
            let summary = outstanding.get(&customer.name).copied().unwrap_or_default();
            customer.outstanding = summary.outstanding;
            customer.pending_invoices_count = summary.pending_invoices_count;
            let credit_limit =
                CustomerReader::resolve_credit_limit(&customer.credit_limits, company.as_deref());
            let mut row = serde_json::to_value(&customer).unwrap_or(Value::Null);
            if let Some(object) = row.as_object_mut() {
                object.insert("credit_limit".into(), json!(credit_limit));
            }
            row
        })
        .collect();
    let count = rows.len();
    Ok(ok_response(json!({"customers": rows, "count": count}), None))
}

pub async fn profiles_mine(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(_body): Json<Value>,
) -> ApiResult {
    let (actor, _settings) = state.authorize(&headers)?;
    let profiles = state.planner.profiles().accessible_profiles(&actor).await?;
    let default_profile = profiles
        .iter()
        .find(|p| p.is_default)
        .map(|p| p.name.clone());
    let count = profiles.len();
    Ok(ok_response(
        json!({
            "user": actor.user.0,
            "default_profile": default_profile,
            "profiles": profiles,
            "count": count,
        }),
        None,
    ))
}

pub async fn activity_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult {
    let (actor, _settings) = state.authorize(&headers)?;
    let query: ActivityQuery = serde_json::from_value(body)
        .map_err(|err| ApiError::validation(&format!("invalid activity query: {err}")))?;
    let events = state.feed.list(&actor, &query).await?;
    let count = events.len();
    Ok(ok_response(json!({"events": events, "count": count}), None))
}

fn settings_payload(settings: &Settings, version: u64) -> Value {
    json!({
        "enable_api": settings.enable_api,
        "default_sync_page_size": settings.default_sync_page_size,
        "bootstrap_invoice_days": settings.bootstrap_invoice_days,
        "recent_paid_invoice_days": settings.recent_paid_invoice_days,
        "payment_entry_days": settings.payment_entry_days,
        "enable_inventory_alerts": settings.enable_inventory_alerts,
        "inventory_alert_default_limit": settings.inventory_alert_default_limit,
        "inventory_alert_critical_ratio": settings.inventory_alert_critical_ratio,
        "inventory_alert_low_ratio": settings.inventory_alert_low_ratio,
        "inventory_alert_rules": &settings.inventory_alert_rules,
        "idempotency_retention_days": settings.idempotency_retention_days,
        "version": version,
    })
}

pub async fn settings_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(_body): Json<Value>,
) -> ApiResult {
    let (_actor, settings) = state.authorize(&headers)?;
    Ok(ok_response(
        settings_payload(&settings, state.settings.version()),
        None,
    ))
}

// ---------------------------------------------------------------------------
// Mutation endpoints
// ---------------------------------------------------------------------------

/// Shared mutation scaffolding: resolve the request key up front so both
/// the success and the failure envelope carry it, run the executor, then
/// emit the best-effort activity event.
async fn run_mutation<F, Fut>(
    state: &AppState,
    headers: &HeaderMap,
    body: &Value,
    endpoint: &'static str,
    event: Option<(&'static str, &'static str, &'static str)>,
    apply: F,
) -> ApiResult
where
    F: FnOnce(Actor, Arc<Settings>) -> Fut,
    Fut: std::future::Future<Output = Result<(Value, Option<DocRef>), TxError>> + Send + 'static,
{
    let (actor, settings) = state.authorize(headers)?;
    let client_key = request_id_from_body(body).or_else(|| {
        headers
            .get("x-client-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    });
    let request_key = resolve_request_key(client_key.as_deref(), &actor, body);

    let future = apply(actor.clone(), settings);
    let result = state
        .executor
        .execute(endpoint, &actor, Some(&request_key), body, move || future)
        .await
        .map_err(|err| ApiError::from(err).with_request_id(Some(request_key.clone())))?;

    if !result.replayed {
        if let Some((event_type, action, doctype)) = event {
            let reference = result
                .data
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            state
                .recorder
                .record(ActivityEvent::new(event_type, action, doctype, &reference, &actor))
                .await;
        }
    }
    Ok(ok_response(result.data, Some(result.request_key)))
}

pub async fn invoice_create_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult {
    let store = state.store.clone();
    let checker = state.checker.clone();
    let payload = body.clone();
    run_mutation(
        &state,
        &headers,
        &body,
        "invoice.create_submit",
        Some(("Sales Invoice", "created", "Sales Invoice")),
        move |actor, _settings| async move {
            invoice::create_submit(
                &store,
                checker.as_ref(),
                &actor,
                &payload,
                Utc::now().date_naive(),
            )
            .await
        },
    )
    .await
}

pub async fn invoice_cancel(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult {
    let store = state.store.clone();
    let checker = state.checker.clone();
    let payload = body.clone();
    run_mutation(
        &state,
        &headers,
        &body,
        "invoice.cancel",
        Some(("Sales Invoice", "cancelled", "Sales Invoice")),
        move |actor, _settings| async move {
            invoice::cancel(&store, checker.as_ref(), &actor, &payload).await
        },
    )
    .await
}

async fn payment_endpoint(
    state: AppState,
    headers: HeaderMap,
    body: Value,
    endpoint: &'static str,
    kind: PaymentKind,
    action: &'static str,
) -> ApiResult {
    let store = state.store.clone();
    let checker = state.checker.clone();
    let payload = body.clone();
    run_mutation(
        &state,
        &headers,
        &body,
        endpoint,
        Some(("Payment Entry", action, "Payment Entry")),
        move |actor, _settings| async move {
            payment::create_submit(
                &store,
                checker.as_ref(),
                &actor,
                &payload,
                kind,
                Utc::now().date_naive(),
            )
            .await
        },
    )
    .await
}

pub async fn payment_receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult {
    payment_endpoint(
        state,
        headers,
        body,
        "payment.receive_create_submit",
        PaymentKind::Receive,
        "received",
    )
    .await
}

pub async fn payment_pay(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult {
    payment_endpoint(
        state,
        headers,
        body,
        "payment.pay_create_submit",
        PaymentKind::Pay,
        "paid",
    )
    .await
}

pub async fn payment_internal_transfer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult {
    payment_endpoint(
        state,
        headers,
        body,
        "payment.internal_transfer_create_submit",
        PaymentKind::InternalTransfer,
        "transferred",
    )
    .await
}

pub async fn session_open(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult {
    let store = state.store.clone();
    let checker = state.checker.clone();
    let profiles = state.planner.profiles();
    let payload = body.clone();
    run_mutation(
        &state,
        &headers,
        &body,
        "session.opening_create_submit",
        Some(("POS Opening Entry", "opened", "POS Opening Entry")),
        move |actor, _settings| async move {
            session::opening_create_submit(
                &store,
                checker.as_ref(),
                &profiles,
                &actor,
                &payload,
                Utc::now().date_naive(),
            )
            .await
        },
    )
    .await
}

pub async fn session_close(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult {
    let store = state.store.clone();
    let checker = state.checker.clone();
    let payload = body.clone();
    run_mutation(
        &state,
        &headers,
        &body,
        "session.closing_create_submit",
        Some(("POS Closing Entry", "closed", "POS Closing Entry")),
        move |actor, _settings| async move {
            session::closing_create_submit(
                &store,
                checker.as_ref(),
                &actor,
                &payload,
                Utc::now().date_naive(),
            )
            .await
        },
    )
    .await
}

/// Clamp rule rows at write time so evaluation can trust the invariants.
fn normalized_rules(body: &Value) -> Option<Vec<AlertRuleConfig>> {
    let rows = value_from_aliases(body, &["inventory_alert_rules", "inventoryAlertRules"])?
        .as_array()?
        .clone();
    let mut rules = Vec::new();
    for raw in rows {
        let Some(row) = raw.as_object() else {
            continue;
        };
        let mut critical =
            coerce_f64(row.get("critical_ratio").or(row.get("criticalRatio")), 0.35);
        let mut low = coerce_f64(row.get("low_ratio").or(row.get("lowRatio")), 1.0);
        if critical < 0.0 {
            critical = 0.0;
        }
        if low < critical {
            low = critical;
        }
        rules.push(AlertRuleConfig {
            enabled: coerce_bool(row.get("enabled"), true),
            warehouse: row
                .get("warehouse")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string(),
            item_group: row
                .get("item_group")
                .or(row.get("itemGroup"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string(),
            critical_ratio: critical,
            low_ratio: low,
            priority: coerce_i64(row.get("priority"), 10).max(0),
        });
    }
    Some(rules)
}

async fn validate_rule_targets(
    store: &Arc<dyn DocumentStore>,
    caps: &SchemaCapabilities,
    rules: &[AlertRuleConfig],
) -> Result<(), TxError> {
    for rule in rules {
        if !rule.warehouse.is_empty() && rule.warehouse != "*" && caps.has_table("Warehouse") {
            if !store.exists("Warehouse", &rule.warehouse).await? {
                return Err(TxError::validation(&format!(
                    "Warehouse not found: {}",
                    rule.warehouse
                )));
            }
        }
        if !rule.item_group.is_empty() && rule.item_group != "*" && caps.has_table("Item Group") {
            if !store.exists("Item Group", &rule.item_group).await? {
                return Err(TxError::validation(&format!(
                    "Item Group not found: {}",
                    rule.item_group
                )));
            }
        }
    }
    Ok(())
}

pub async fn settings_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult {
    let store = state.store.clone();
    let checker = state.checker.clone();
    let caps = state.caps.clone();
    let handle = state.settings.clone();
    let payload = body.clone();
    run_mutation(
        &state,
        &headers,
        &body,
        "settings.update",
        None,
        move |actor, _settings| async move {
            crate::mutations::require(
                checker.as_ref(),
                &actor,
                "Tillbase Settings",
                &[Action::Write],
            )?;

            let rules = normalized_rules(&payload);
            if let Some(rules) = &rules {
                validate_rule_targets(&store, &caps, rules).await?;
            }

            let version = handle.update(|settings| {
                if let Some(value) =
                    value_from_aliases(&payload, &["enable_api", "enableApi"])
                {
                    settings.enable_api = coerce_bool(Some(value), settings.enable_api);
                }
                if let Some(value) = value_from_aliases(
                    &payload,
                    &["enable_inventory_alerts", "enableInventoryAlerts"],
                ) {
                    settings.enable_inventory_alerts =
                        coerce_bool(Some(value), settings.enable_inventory_alerts);
                }
                if let Some(value) = value_from_aliases(
                    &payload,
                    &["default_sync_page_size", "defaultSyncPageSize"],
                ) {
                    settings.default_sync_page_size =
                        coerce_i64(Some(value), settings.default_sync_page_size as i64).max(1)
                            as u32;
                }
                if let Some(value) = value_from_aliases(
                    &payload,
                    &["bootstrap_invoice_days", "bootstrapInvoiceDays"],
                ) {
                    settings.bootstrap_invoice_days =
                        coerce_i64(Some(value), settings.bootstrap_invoice_days).max(0);
                }
                if let Some(value) = value_from_aliases(
                    &payload,
                    &["recent_paid_invoice_days", "recentPaidInvoiceDays"],
                ) {
                    settings.recent_paid_invoice_days =
                        coerce_i64(Some(value), settings.recent_paid_invoice_days).max(0);
                }
                if let Some(value) = value_from_aliases(
                    &payload,
                    &["inventory_alert_default_limit", "inventoryAlertDefaultLimit"],
                ) {
                    settings.inventory_alert_default_limit =
                        coerce_i64(Some(value), settings.inventory_alert_default_limit as i64)
                            .max(1) as usize;
                }
                if let Some(value) = value_from_aliases(
                    &payload,
                    &["inventory_alert_critical_ratio", "inventoryAlertCriticalRatio"],
                ) {
                    settings.inventory_alert_critical_ratio =
                        coerce_f64(Some(value), settings.inventory_alert_critical_ratio).max(0.0);
                }
                if let Some(value) = value_from_aliases(
                    &payload,
                    &["inventory_alert_low_ratio", "inventoryAlertLowRatio"],
                ) {
                    settings.inventory_alert_low_ratio =
                        coerce_f64(Some(value), settings.inventory_alert_low_ratio)
                            .max(settings.inventory_alert_critical_ratio);
                }
                if let Some(rules) = rules {
                    settings.inventory_alert_rules = rules;
                }
            });

            let snapshot = handle.get();
            let reference: Option<DocRef> = None;
            Ok((settings_payload(&snapshot, version), reference))
        },
    )
    .await
}
