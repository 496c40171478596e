use chrono::NaiveDate;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tillbase_config::Settings;
use tillbase_rates::prelude::{NullRateSource, RateResolver};
use tillbase_storage::prelude::*;
use tillbase_sync::prelude::*;
use tillbase_types::prelude::{Actor, Timestamp};

fn doc(doctype: &str, name: &str, docstatus: DocStatus, modified: i64, fields: Value) -> Document {
    let map: Map<String, Value> = match fields {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let mut doc = Document::new(doctype, map);
    doc.name = name.to_string();
    doc.docstatus = docstatus;
    doc.modified = Timestamp(modified);
    doc.creation = Timestamp(modified);
    doc
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

fn actor() -> Actor {
    Actor::named("cashier@example.com")
}

async fn planner_for(store: &Arc<MemoryDocumentStore>) -> SyncPlanner {
    let store_dyn: Arc<dyn DocumentStore> = store.clone();
    let caps = store.capabilities().await.unwrap();
    let resolver = RateResolver::new(
        Arc::new(NullRateSource),
        Arc::new(DocQuoteStore::new(store_dyn.clone())),
    );
    SyncPlanner::new(store_dyn, caps, resolver)
}

fn seed_profile_and_shift(store: &MemoryDocumentStore) {
    store.seed(doc(
        "POS Profile",
        "Front Desk",
        DocStatus::Draft,
        1_000,
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
        1_000,
        json!({
            "parent": "Front Desk",
            "parenttype": "POS Profile",
            "user": "cashier@example.com",
            "default": 1,
            "idx": 1,
        }),
    ));
    store.seed(doc(
        "POS Payment Method",
        "PPM-00001",
        DocStatus::Draft,
        1_000,
        json!({
            "parent": "Front Desk",
            "parenttype": "POS Profile",
            "mode_of_payment": "Cash",
            "default": 1,
            "idx": 1,
        }),
    ));
    store.seed(doc(
        "POS Opening Entry",
        "OPE-00001",
        DocStatus::Submitted,
        2_000,
        json!({
            "status": "Open",
            "user": "cashier@example.com",
            "pos_profile": "Front Desk",
            "company": "Main Co",
            "posting_date": "2024-06-01",
            "period_start_date": "2024-06-01 08:00:00",
        }),
    ));
    store.seed(doc(
        "Company",
        "Main Co",
        DocStatus::Draft,
        1_000,
        json!({
            "company": "Main Co",
            "default_currency": "USD",
            "country": "Testland",
        }),
    ));
}

fn seed_inventory(store: &MemoryDocumentStore) {
    for (code, group, stocked, qty, reserved, modified) in [
        ("SKU-LOW", "Drinks", 1, 20.0, 5.0, 3_000i64),
        ("SKU-OK", "Drinks", 1, 500.0, 0.0, 3_000),
        ("SKU-NEG", "Drinks", 1, -4.0, 0.0, 3_000),
    ] {
        store.seed(doc(
            "Item",
            code,
            DocStatus::Draft,
            modified,
            json!({
                "item_code": code,
                "item_name": format!("{code} name"),
                "item_group": group,
                "is_stock_item": stocked,
                "is_sales_item": 1,
                "disabled": 0,
                "stock_uom": "Unit",
                "standard_rate": 3.0,
            }),
        ));
        store.seed(doc(
            "Bin",
            &format!("BIN-{code}"),
            DocStatus::Draft,
            modified,
            json!({
                "warehouse": "WH-1",
                "item_code": code,
                "actual_qty": qty,
                "reserved_qty": reserved,
                "projected_qty": qty - reserved,
                "stock_uom": "Unit",
                "valuation_rate": 1.5,
            }),
        ));
    }
    store.seed(doc(
        "Item Reorder",
        "IR-00001",
        DocStatus::Draft,
        3_000,
        json!({
            "parent": "SKU-LOW",
            "warehouse": "WH-1",
            "warehouse_reorder_level": 100.0,
            "warehouse_reorder_qty": 50.0,
        }),
    ));
    store.seed(doc(
        "Item Price",
        "IP-00001",
        DocStatus::Draft,
        3_000,
        json!({
            "item_code": "SKU-LOW",
            "selling": 1,
            "price_list": "Retail",
            "price_list_rate": 2.5,
            "currency": "USD",
        }),
    ));
}

#[tokio::test]
async fn bootstrap_requires_an_open_shift() {
    let store = Arc::new(MemoryDocumentStore::new());
    store.seed(doc(
        "POS Profile",
        "Front Desk",
        DocStatus::Draft,
        1_000,
        json!({"company": "Main Co", "disabled": 0}),
    ));
    // Closed shift only.
    store.seed(doc(
        "POS Opening Entry",
        "OPE-CLOSED",
        DocStatus::Submitted,
        2_000,
        json!({
            "status": "Closed",
            "user": "cashier@example.com",
            "pos_profile": "Front Desk",
        }),
    ));
    let planner = planner_for(&store).await;

    let err = planner
        .bootstrap(&actor(), &BootstrapRequest::default(), &Settings::default(), today())
        .await
        .expect_err("no open shift");
    assert_eq!(err.code(), "VALIDATION_ERROR");
    assert!(err.0.message_user.contains("Open shift required"));
}

#[tokio::test]
async fn bootstrap_rejects_inaccessible_profile() {
    let store = Arc::new(MemoryDocumentStore::new());
    seed_profile_and_shift(&store);
    let planner = planner_for(&store).await;

    let request = BootstrapRequest {
        profile_name: Some("Back Office".into()),
        ..BootstrapRequest::default()
    };
    let err = planner
        .bootstrap(&actor(), &request, &Settings::default(), today())
        .await
        .expect_err("profile not assigned");
    assert_eq!(err.code(), "PERMISSION_DENIED");
}

#[tokio::test]
async fn bootstrap_assembles_all_entity_families() {
    let store = Arc::new(MemoryDocumentStore::new());
    seed_profile_and_shift(&store);
    seed_inventory(&store);

    store.seed(doc(
        "Customer",
        "CUST-0001",
        DocStatus::Draft,
        3_000,
        json!({
            "customer_name": "Ada",
            "route": "Route A",
            "territory": "North",
            "disabled": 0,
        }),
    ));
    store.seed(doc(
        "Customer Credit Limit",
        "CCL-00001",
        DocStatus::Draft,
        3_000,
        json!({"parent": "CUST-0001", "company": "Main Co", "credit_limit": 900.0}),
    ));
    store.seed(doc(
        "Supplier",
        "SUPP-0001",
        DocStatus::Draft,
        3_000,
        json!({"supplier_name": "Acme", "supplier_group": "Raw", "disabled": 0}),
    ));
    store.seed(doc(
        "Sales Invoice",
        "SI-OPEN",
        DocStatus::Submitted,
        3_000,
        json!({
            "customer": "CUST-0001",
            "company": "Main Co",
            "pos_profile": "Front Desk",
            "posting_date": "2024-05-15",
            "status": "Unpaid",
            "grand_total": 40.0,
            "outstanding_amount": 40.0,
        }),
    ));
    store.seed(doc(
        "Sales Invoice Item",
        "SII-00001",
        DocStatus::Draft,
        3_000,
        json!({
            "parent": "SI-OPEN",
            "parenttype": "Sales Invoice",
            "item_code": "SKU-LOW",
            "qty": 2.0,
            "rate": 20.0,
            "amount": 40.0,
            "idx": 1,
        }),
    ));
    store.seed(doc(
        "Sales Invoice",
        "SI-PAID-RECENT",
        DocStatus::Submitted,
        3_000,
        json!({
            "customer": "CUST-0001",
            "company": "Main Co",
            "pos_profile": "Front Desk",
            "posting_date": "2024-05-28",
            "status": "Paid",
            "grand_total": 10.0,
        }),
    ));
    store.seed(doc(
        "Sales Invoice",
        "SI-PAID-OLD",
        DocStatus::Submitted,
        3_000,
        json!({
            "customer": "CUST-0001",
            "company": "Main Co",
            "pos_profile": "Front Desk",
            "posting_date": "2024-04-01",
            "status": "Paid",
            "grand_total": 99.0,
        }),
    ));
    store.seed(doc(
        "Payment Entry",
        "PE-00001",
        DocStatus::Submitted,
        3_000,
        json!({
            "posting_date": "2024-05-20",
            "party": "CUST-0001",
            "party_type": "Customer",
            "payment_type": "Receive",
            "paid_amount": 15.0,
            "received_amount": 15.0,
        }),
    ));
    store.seed(doc(
        "Payment Entry Reference",
        "PER-00001",
        DocStatus::Draft,
        3_000,
        json!({
            "parent": "PE-00001",
            "parenttype": "Payment Entry",
            "reference_doctype": "Sales Invoice",
            "reference_name": "SI-OPEN",
            "allocated_amount": 15.0,
            "outstanding_amount": 25.0,
            "idx": 1,
        }),
    ));
    store.seed(doc(
        "Currency",
        "USD",
        DocStatus::Draft,
        1_000,
        json!({"currency_name": "US Dollar", "symbol": "$", "enabled": 1}),
    ));
    store.seed(doc(
        "Currency",
        "VES",
        DocStatus::Draft,
        1_000,
        json!({"currency_name": "Bolivar", "symbol": "Bs", "enabled": 1}),
    ));
    store.seed(doc(
        "Currency Exchange",
        "CE-00001",
        DocStatus::Draft,
        1_000,
        json!({
            "from_currency": "VES",
            "to_currency": "USD",
            "date": "2024-05-01",
            "exchange_rate": 0.025,
        }),
    ));
    store.seed(doc(
        "Payment Term",
        "Net 30",
        DocStatus::Draft,
        1_000,
        json!({"payment_term_name": "Net 30", "invoice_portion": 100.0, "credit_days": 30}),
    ));
    store.seed(doc(
        "Territory",
        "North",
        DocStatus::Draft,
        1_000,
        json!({"territory_name": "North", "is_group": 0}),
    ));
    store.seed(doc(
        "Customer Group",
        "Retail",
        DocStatus::Draft,
        1_000,
        json!({"customer_group_name": "Retail", "is_group": 0}),
    ));
    store.seed(doc(
        "Stock Settings",
        "Stock Settings",
        DocStatus::Draft,
        1_000,
        json!({"allow_negative_stock": 0}),
    ));

    let planner = planner_for(&store).await;
    let data = planner
        .bootstrap(&actor(), &BootstrapRequest::default(), &Settings::default(), today())
        .await
        .expect("bootstrap");

    // Context resolves from the profile and the open shift.
    assert_eq!(data.context.profile_name.as_deref(), Some("Front Desk"));
    assert_eq!(data.context.warehouse.as_deref(), Some("WH-1"));
    assert_eq!(data.context.price_list.as_deref(), Some("Retail"));
    assert_eq!(data.context.pos_opening_entry, "OPE-00001");
    assert_eq!(data.open_shift.name, "OPE-00001");
    assert_eq!(data.pos_profiles.len(), 1);
    assert!(data.pos_profiles[0].is_default);
    let detail = data.pos_profile_detail.as_ref().expect("profile detail");
    assert_eq!(detail.payments.len(), 1);
    assert_eq!(detail.payments[0].mode_of_payment, "Cash");

    // Inventory: SKU-NEG is negative without an alert covering it only if
    // alerts exclude it; negative projection alerts CRITICAL, so it stays.
    let inventory_codes: Vec<&str> = data
        .inventory_items
        .items
        .iter()
        .map(|row| row.item_code.0.as_str())
        .collect();
    assert!(inventory_codes.contains(&"SKU-LOW"));
    assert!(inventory_codes.contains(&"SKU-OK"));
    assert!(inventory_codes.contains(&"SKU-NEG"), "alerted negative row stays visible");
    assert_eq!(data.inventory_items.pagination.total, 3);
    let low_row = data
        .inventory_items
        .items
        .iter()
        .find(|row| row.item_code.0 == "SKU-LOW")
        .unwrap();
    assert_eq!(low_row.price, 2.5, "price list rate beats standard rate");
    assert_eq!(low_row.sellable_qty, 15.0);

    // Alerts: SKU-NEG critical (projection <= 0); SKU-LOW critical because
    // projected 15 <= 100 * 0.35.
    let alert_codes: Vec<&str> = data
        .inventory_alerts
        .iter()
        .map(|a| a.item_code.0.as_str())
        .collect();
    assert_eq!(alert_codes, vec!["SKU-NEG", "SKU-LOW"]);

    // Customers carry credit limits and outstanding aggregation.
    assert_eq!(data.customers.items.len(), 1);
    let customer = &data.customers.items[0];
    assert_eq!(customer.credit_limits.len(), 1);
    assert_eq!(customer.outstanding, 40.0);
    assert_eq!(customer.pending_invoices_count, 1);

    assert_eq!(data.suppliers.items.len(), 1);

    // Invoice windows: open + recently paid, stale paid excluded.
    let invoice_names: Vec<&str> = data
        .invoices
        .items
        .iter()
        .map(|row| row.name.as_str())
        .collect();
    assert!(invoice_names.contains(&"SI-OPEN"));
    assert!(invoice_names.contains(&"SI-PAID-RECENT"));
    assert!(!invoice_names.contains(&"SI-PAID-OLD"));
    let open_invoice = data
        .invoices
        .items
        .iter()
        .find(|row| row.name == "SI-OPEN")
        .unwrap();
    assert_eq!(open_invoice.items.len(), 1);
    assert_eq!(open_invoice.items[0].qty, 2.0);

    // Payment entries windowed with references attached.
    assert_eq!(data.payment_entries.items.len(), 1);
    assert_eq!(data.payment_entries.items[0].references.len(), 1);

    // Reference data and rates: VES resolves through the stored quote.
    assert_eq!(data.exchange_rates.base_currency.as_deref(), Some("USD"));
    assert_eq!(data.exchange_rates.rates.get("VES"), Some(&Some(0.025)));
    assert_eq!(data.exchange_rates.rates.get("USD"), Some(&Some(1.0)));
    assert_eq!(data.payment_terms.len(), 1);
    assert_eq!(data.territories.len(), 1);
    assert_eq!(data.customer_groups.len(), 1);
    assert!(!data.stock_settings.allow_negative_stock);
}

#[tokio::test]
async fn inventory_delta_unions_stock_master_and_price_signals() {
    let store = Arc::new(MemoryDocumentStore::new());
    seed_profile_and_shift(&store);

    let watermark = 5_000i64;
    // A: only its bin changed after the watermark.
    // B: only its item master changed.
    // C: only its selling price changed.
    // D: untouched.
    for (code, item_mod, bin_mod) in [
        ("SKU-A", 1_000i64, 6_000i64),
        ("SKU-B", 7_000, 1_000),
        ("SKU-C", 1_000, 1_000),
        ("SKU-D", 1_000, 1_000),
    ] {
        store.seed(doc(
            "Item",
            code,
            DocStatus::Draft,
            item_mod,
            json!({
                "item_code": code,
                "item_name": code,
                "item_group": "Drinks",
                "is_stock_item": 1,
                "is_sales_item": 1,
                "disabled": 0,
            }),
        ));
        store.seed(doc(
            "Bin",
            &format!("BIN-{code}"),
            DocStatus::Draft,
            bin_mod,
            json!({
                "warehouse": "WH-1",
                "item_code": code,
                "actual_qty": 10.0,
                "reserved_qty": 0.0,
                "projected_qty": 10.0,
            }),
        ));
    }
    store.seed(doc(
        "Item Price",
        "IP-C",
        DocStatus::Draft,
        8_000,
        json!({
            "item_code": "SKU-C",
            "selling": 1,
            "price_list": "Retail",
            "price_list_rate": 9.0,
            "currency": "USD",
        }),
    ));

    let planner = planner_for(&store).await;
    let request = DeltaRequest {
        modified_since: watermark,
        doc_types: vec!["bin".into(), "item price".into()],
        profile_name: Some("Front Desk".into()),
        warehouse: None,
        price_list: None,
        route: None,
        territory: None,
    };
    let delta = planner
        .pull_delta(&actor(), &request, &Settings::default())
        .await
        .expect("delta");

    // Both aliases canonicalize into one Inventory family.
    assert_eq!(delta.changes.len(), 1);
    let inventory = delta.changes.get("Inventory").expect("inventory family");
    let codes: Vec<&str> = inventory
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["item_code"].as_str().unwrap())
        .collect();
    assert!(codes.contains(&"SKU-A"), "stock-level change signal");
    assert!(codes.contains(&"SKU-B"), "item-master change signal");
    assert!(codes.contains(&"SKU-C"), "price change signal");
    assert!(!codes.contains(&"SKU-D"), "untouched item excluded");
    assert_eq!(delta.context.warehouse.as_deref(), Some("WH-1"));
}

#[tokio::test]
async fn delta_requires_watermark_and_tombstones_disabled_customers() {
    let store = Arc::new(MemoryDocumentStore::new());
    seed_profile_and_shift(&store);
    store.seed(doc(
        "Customer",
        "CUST-GONE",
        DocStatus::Draft,
        9_000,
        json!({"customer_name": "Gone", "disabled": 1}),
    ));
    store.seed(doc(
        "Customer",
        "CUST-OLD",
        DocStatus::Draft,
        1_000,
        json!({"customer_name": "Old", "disabled": 0}),
    ));
    let planner = planner_for(&store).await;

    let missing = DeltaRequest {
        modified_since: 0,
        doc_types: vec!["Customer".into()],
        profile_name: None,
        warehouse: None,
        price_list: None,
        route: None,
        territory: None,
    };
    let err = planner
        .pull_delta(&actor(), &missing, &Settings::default())
        .await
        .expect_err("watermark required");
    assert_eq!(err.code(), "VALIDATION_ERROR");

    let request = DeltaRequest {
        modified_since: 5_000,
        ..missing
    };
    let delta = planner
        .pull_delta(&actor(), &request, &Settings::default())
        .await
        .expect("delta");
    let customers = delta.changes.get("Customer").unwrap().as_array().unwrap();
    assert_eq!(customers.len(), 1);
    assert_eq!(customers[0]["name"], "CUST-GONE");
    assert_eq!(customers[0]["disabled"], true);
}

#[tokio::test]
async fn unknown_doc_types_degrade_to_generic_listing() {
    let store = Arc::new(MemoryDocumentStore::new());
    seed_profile_and_shift(&store);
    store.seed(doc(
        "Delivery Note",
        "DN-00001",
        DocStatus::Submitted,
        9_000,
        json!({"customer": "CUST-0001"}),
    ));
    let planner = planner_for(&store).await;

    let request = DeltaRequest {
        modified_since: 5_000,
        doc_types: vec!["Delivery Note".into()],
        profile_name: None,
        warehouse: None,
        price_list: None,
        route: None,
        territory: None,
    };
    let delta = planner
        .pull_delta(&actor(), &request, &Settings::default())
        .await
        .expect("delta");
    let rows = delta.changes.get("Delivery Note").unwrap().as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], "DN-00001");
    assert_eq!(rows[0]["docstatus"], 1);
}
