use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tillbase_config::{Settings, SettingsHandle};
use tillbase_gateway::state::{AppState, AuthIndex, GatewayMetrics, VersionInfo};
use tillbase_gateway::router;
use tillbase_observe::prelude::*;
use tillbase_rates::prelude::{NullRateSource, RateResolver};
use tillbase_storage::prelude::*;
use tillbase_sync::prelude::{DocQuoteStore, SyncPlanner};
use tillbase_tx::memory::InMemoryIdempoStore;
use tillbase_tx::MutationExecutor;
use tillbase_types::prelude::Timestamp;
use tower::ServiceExt;

fn doc(doctype: &str, name: &str, docstatus: DocStatus, fields: Value) -> Document {
    let map: Map<String, Value> = match fields {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let mut doc = Document::new(doctype, map);
    doc.name = name.to_string();
    doc.docstatus = docstatus;
    doc.modified = Timestamp(1_000);
    doc
}

fn seed_register(store: &MemoryDocumentStore) {
    store.seed(doc(
        "POS Profile",
        "Front Desk",
        DocStatus::Draft,
        json!({
            "company": "Main Co",
            "currency": "USD",
            "warehouse": "WH-1",
            "selling_price_list": "Retail",
            "route": "Route A",
            "disabled": 0,
        }),
    ));
    store.seed(doc(
        "POS Profile User",
        "PFU-00001",
        DocStatus::Draft,
        json!({
            "parent": "Front Desk",
            "parenttype": "POS Profile",
            "user": "Guest",
            "default": 1,
            "idx": 1,
        }),
    ));
    store.seed(doc(
        "POS Payment Method",
        "PPM-00001",
        DocStatus::Draft,
        json!({
            "parent": "Front Desk",
            "parenttype": "POS Profile",
            "mode_of_payment": "Cash",
            "default": 1,
            "idx": 1,
        }),
    ));
    store.seed(doc(
        "Company",
        "Main Co",
        DocStatus::Draft,
        json!({"company": "Main Co", "default_currency": "USD"}),
    ));
    store.seed(doc(
        "Item",
        "SKU-1",
        DocStatus::Draft,
        json!({
            "item_code": "SKU-1",
            "item_name": "Cola",
            "item_group": "Drinks",
            "is_stock_item": 1,
            "is_sales_item": 1,
            "disabled": 0,
            "standard_rate": 2.0,
        }),
    ));
    store.seed(doc(
        "Bin",
        "BIN-00001",
        DocStatus::Draft,
        json!({
            "warehouse": "WH-1",
            "item_code": "SKU-1",
            "actual_qty": 10.0,
            "reserved_qty": 0.0,
            "projected_qty": 10.0,
        }),
    ));
    store.seed(doc(
        "Currency",
        "USD",
        DocStatus::Draft,
        json!({"currency_name": "US Dollar", "symbol": "$", "enabled": 1}),
    ));
}

async fn test_app() -> (Router, Arc<MemoryDocumentStore>) {
    let store = Arc::new(MemoryDocumentStore::new());
    seed_register(&store);
    let store_dyn: Arc<dyn DocumentStore> = store.clone();
    let caps = store_dyn.capabilities().await.unwrap();
    let resolver = RateResolver::new(
        Arc::new(NullRateSource),
        Arc::new(DocQuoteStore::new(store_dyn.clone())),
    );
    let planner = SyncPlanner::new(store_dyn.clone(), caps.clone(), resolver);

    let state = AppState {
        store: store_dyn.clone(),
        checker: Arc::new(AllowAll),
        caps,
        planner,
        executor: Arc::new(MutationExecutor::new(InMemoryIdempoStore::default())),
        recorder: Arc::new(StoreActivityRecorder::new(store_dyn.clone())),
        feed: ActivityFeed::new(store_dyn),
        settings: Arc::new(SettingsHandle::new(Settings::default())),
        auth: Arc::new(AuthIndex {
            tokens: Default::default(),
            allow_anonymous: true,
            anonymous_roles: Vec::new(),
        }),
        version: VersionInfo::from_env(),
        metrics: GatewayMetrics::default(),
    };
    (router(state), store)
}

async fn post(app: &Router, path: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(path)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn invoice_payload(request_id: &str) -> Value {
    json!({
        "client_request_id": request_id,
        "company": "Main Co",
        "customer": "CUST-1",
        "set_warehouse": "WH-1",
        "items": [{"item_code": "SKU-1", "qty": 2, "rate": 2.0}],
        "payments": [{"mode_of_payment": "Cash", "amount": 4.0}],
        "grand_total": 4.0,
    })
}

#[tokio::test]
async fn health_returns_envelope() {
    let (app, _store) = test_app().await;
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
    assert!(body.get("server_time").is_some());
}

#[tokio::test]
async fn invoice_retry_returns_identical_envelope_data_and_one_document() {
    let (app, store) = test_app().await;

    let (status_a, first) = post(&app, "/api/v1/invoices/create-submit", invoice_payload("abc")).await;
    let (status_b, second) = post(&app, "/api/v1/invoices/create-submit", invoice_payload("abc")).await;

    assert_eq!(status_a, StatusCode::OK);
    assert_eq!(status_b, StatusCode::OK);
    assert_eq!(first["success"], true);
    assert_eq!(first["data"], second["data"], "replay is byte-identical data");
    assert_eq!(first["request_id"], "abc");
    assert_eq!(second["request_id"], "abc");
    assert_eq!(first["data"]["docstatus"], 1);

    let invoices = store
        .list("Sales Invoice", QueryParams::default())
        .await
        .unwrap();
    assert_eq!(invoices.total, 1, "exactly one invoice created");
}

#[tokio::test]
async fn conflicting_key_reuse_fails_without_applying() {
    let (app, store) = test_app().await;

    let (_, first) = post(&app, "/api/v1/invoices/create-submit", invoice_payload("dup")).await;
    assert_eq!(first["success"], true);

    let mut changed = invoice_payload("dup");
    changed["grand_total"] = json!(999.0);
    let (status, body) = post(&app, "/api/v1/invoices/create-submit", changed).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["request_id"], "dup");

    let invoices = store
        .list("Sales Invoice", QueryParams::default())
        .await
        .unwrap();
    assert_eq!(invoices.total, 1, "second payload must not apply");
}

#[tokio::test]
async fn validation_failure_sets_failed_record_and_replays_it() {
    let (app, _store) = test_app().await;

    let bad = json!({
        "client_request_id": "bad-1",
        "company": "Main Co",
        "items": [{"item_code": "SKU-1", "qty": 1}],
    });
    let (status, body) = post(&app, "/api/v1/invoices/create-submit", bad.clone()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "customer is required");

    // Same key + same payload: the stored failure is surfaced verbatim.
    let (status, body) = post(&app, "/api/v1/invoices/create-submit", bad).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "customer is required");
}

#[tokio::test]
async fn session_open_then_bootstrap_then_close() {
    let (app, _store) = test_app().await;

    // Bootstrap before any shift is refused.
    let (status, body) = post(&app, "/api/v1/sync/bootstrap", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Open shift required"));

    let (status, opened) = post(
        &app,
        "/api/v1/sessions/open",
        json!({"client_request_id": "open-1", "opening_amount": 100.0}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let opening_name = opened["data"]["name"].as_str().unwrap().to_string();

    // Re-opening reuses the open shift instead of double-opening.
    let (_, reopened) = post(
        &app,
        "/api/v1/sessions/open",
        json!({"client_request_id": "open-2", "opening_amount": 100.0}),
    )
    .await;
    assert_eq!(reopened["data"]["reused"], true);
    assert_eq!(reopened["data"]["name"], opening_name.as_str());

    let (status, bootstrap) = post(&app, "/api/v1/sync/bootstrap", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bootstrap["data"]["context"]["profile_name"], "Front Desk");
    assert_eq!(bootstrap["data"]["context"]["warehouse"], "WH-1");
    assert_eq!(
        bootstrap["data"]["inventory_items"]["items"][0]["item_code"],
        "SKU-1"
    );
    assert!(bootstrap["data"]["inventory_items"]["pagination"]["total"].is_number());

    let (status, closed) = post(
        &app,
        "/api/v1/sessions/close",
        json!({
            "client_request_id": "close-1",
            "pos_opening_entry": opening_name,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(closed["data"]["name"].as_str().is_some());

    // The shift is closed: bootstrap demands a fresh one again.
    let (status, _body) = post(&app, "/api/v1/sync/bootstrap", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn settings_update_bumps_version_and_clamps_rules() {
    let (app, _store) = test_app().await;

    let (_, before) = post(&app, "/api/v1/settings/get", json!({})).await;
    assert_eq!(before["data"]["version"], 0);

    let (status, updated) = post(
        &app,
        "/api/v1/settings/update",
        json!({
            "client_request_id": "settings-1",
            "default_sync_page_size": 75,
            "inventory_alert_rules": [
                {"warehouse": "", "item_group": "", "critical_ratio": -0.2, "low_ratio": 0.1, "priority": -5}
            ],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["data"]["default_sync_page_size"], 75);
    assert_eq!(updated["data"]["version"], 1);
    let rule = &updated["data"]["inventory_alert_rules"][0];
    assert_eq!(rule["critical_ratio"], 0.0, "negative ratio clamps to zero");
    assert_eq!(rule["low_ratio"], 0.1);
    assert_eq!(rule["priority"], 0);

    let (_, after) = post(&app, "/api/v1/settings/get", json!({})).await;
    assert_eq!(after["data"]["default_sync_page_size"], 75);
}

#[tokio::test]
async fn delta_without_watermark_is_a_validation_error() {
    let (app, _store) = test_app().await;
    let (status, body) = post(&app, "/api/v1/sync/delta", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn mutations_record_activity_visible_to_other_cashiers() {
    let (app, _store) = test_app().await;
    let (_, created) = post(&app, "/api/v1/invoices/create-submit", invoice_payload("act-1")).await;
    assert_eq!(created["success"], true);

    // Guest created the invoice; the feed hides own events by default, so
    // query across all cashiers.
    let (status, activity) = post(
        &app,
        "/api/v1/activity/list",
        json!({"only_other_cashiers": false}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(activity["data"]["count"], 1);
    assert_eq!(activity["data"]["events"][0]["event_type"], "Sales Invoice");
}
