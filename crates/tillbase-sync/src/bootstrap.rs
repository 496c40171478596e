use crate::currencies::{active_currencies, ExchangeRates};
use crate::customers::CustomerReader;
use crate::errors::SyncError;
use crate::inventory::InventoryReader;
use crate::invoices::InvoiceReader;
use crate::pagination::{PageInfo, Paginated};
use crate::payments::PaymentReader;
use crate::profiles::{OpeningShift, ProfileDetail, ProfileReader, ProfileSummary};
use crate::rows::{
    rows_from_docs, CompanyRow, CurrencyRow, CustomerGroupRow, CustomerRow, InvoiceRow,
    PaymentEntryRow, PaymentTermRow, StockSettingsRow, SupplierRow, TerritoryRow,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tillbase_config::Settings;
use tillbase_inventory::prelude::*;
use tillbase_rates::prelude::*;
use tillbase_storage::prelude::*;
use tillbase_types::prelude::{Actor, WarehouseId};

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct BootstrapRequest {
    #[serde(default, alias = "profileName", alias = "pos_profile", alias = "posProfile")]
    pub profile_name: Option<String>,
    #[serde(default, alias = "posOpeningEntry", alias = "pos_opening_name", alias = "posOpeningName")]
    pub pos_opening_entry: Option<String>,
    #[serde(default, alias = "warehouse_id", alias = "warehouseId")]
    pub warehouse: Option<String>,
    #[serde(default, alias = "priceList")]
    pub price_list: Option<String>,
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub territory: Option<String>,
    #[serde(default = "default_true", alias = "includeInventory")]
    pub include_inventory: bool,
    #[serde(default = "default_true", alias = "includeCustomers")]
    pub include_customers: bool,
    #[serde(default = "default_true", alias = "includeInvoices")]
    pub include_invoices: bool,
    #[serde(default = "default_true", alias = "includeAlerts")]
    pub include_alerts: bool,
    #[serde(default = "default_true", alias = "recentPaidOnly")]
    pub recent_paid_only: bool,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub inventory_offset: u64,
    #[serde(default)]
    pub customers_offset: u64,
    #[serde(default)]
    pub suppliers_offset: u64,
    #[serde(default)]
    pub invoices_offset: u64,
    #[serde(default)]
    pub payments_offset: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct BootstrapContext {
    pub profile_name: Option<String>,
    pub company: Option<String>,
    pub company_currency: Option<String>,
    pub warehouse: Option<String>,
    pub route: Option<String>,
    pub territory: Option<String>,
    pub price_list: Option<String>,
    pub currency: Option<String>,
    pub pos_opening_entry: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct BootstrapData {
    pub context: BootstrapContext,
    pub open_shift: OpeningShift,
    pub pos_profiles: Vec<ProfileSummary>,
    pub pos_profile_detail: Option<ProfileDetail>,
    pub company: Option<CompanyRow>,
    pub stock_settings: StockSettingsRow,
    pub currencies: Vec<CurrencyRow>,
    pub exchange_rates: ExchangeRates,
    pub payment_terms: Vec<PaymentTermRow>,
    pub customer_groups: Vec<CustomerGroupRow>,
    pub territories: Vec<TerritoryRow>,
    pub inventory_items: Paginated<SnapshotRow>,
    pub inventory_alerts: Vec<Alert>,
    pub customers: Paginated<CustomerRow>,
    pub suppliers: Paginated<SupplierRow>,
    pub invoices: Paginated<InvoiceRow>,
    pub payment_entries: Paginated<PaymentEntryRow>,
}

/// Orchestrates bootstrap and delta retrieval over the storage SPI. Each
/// entity family reads its own snapshot; the contract is eventual
/// convergence under repeated delta pulls, not point-in-time global
/// consistency.
#[derive(Clone)]
pub struct SyncPlanner {
    pub(crate) store: Arc<dyn DocumentStore>,
    pub(crate) caps: SchemaCapabilities,
    pub(crate) resolver: RateResolver,
}

impl SyncPlanner {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        caps: SchemaCapabilities,
        resolver: RateResolver,
    ) -> Self {
        SyncPlanner {
            store,
            caps,
            resolver,
        }
    }

    pub fn inventory(&self) -> InventoryReader {
        InventoryReader::new(self.store.clone(), self.caps.clone())
    }

    pub fn customers(&self) -> CustomerReader {
        CustomerReader::new(self.store.clone(), self.caps.clone())
    }

    pub fn invoices(&self) -> InvoiceReader {
        InvoiceReader::new(self.store.clone(), self.caps.clone())
    }

    pub fn payments(&self) -> PaymentReader {
        PaymentReader::new(self.store.clone(), self.caps.clone())
    }

    pub fn profiles(&self) -> ProfileReader {
        ProfileReader::new(self.store.clone(), self.caps.clone())
    }

    pub fn alert_engine(&self, settings: &Settings) -> AlertEngine {
        let rules: Vec<AlertRule> = settings
            .inventory_alert_rules
            .iter()
            .filter_map(AlertRule::from_config)
            .collect();
        AlertEngine::new(
            rules,
            AlertDefaults::new(
                settings.inventory_alert_critical_ratio,
                settings.inventory_alert_low_ratio,
                settings.inventory_alert_default_limit,
            ),
        )
    }

    /// Alerts plus visible rows for an already-built snapshot. Alerts are
    /// computed when asked for or when negative rows need the visibility
    /// decision; disabled alerting yields none and hides negatives.
    pub(crate) async fn alerts_and_visible_rows(
        &self,
        settings: &Settings,
        warehouse: &str,
        rows: Vec<SnapshotRow>,
        want_alerts: bool,
    ) -> Result<(Vec<SnapshotRow>, Vec<Alert>), SyncError> {
        if rows.is_empty() {
            return Ok((rows, Vec::new()));
        }
        let need_evaluation =
            settings.enable_inventory_alerts && (want_alerts || has_negative_rows(&rows));
        let alerts = if need_evaluation {
            let reorders = self.inventory().reorder_levels(warehouse, &rows).await?;
            self.alert_engine(settings).evaluate(
                &WarehouseId(warehouse.to_string()),
                &rows,
                &reorders,
            )
        } else {
            Vec::new()
        };
        let visible = if settings.enable_inventory_alerts || has_negative_rows(&rows) {
            apply_visibility_rules(rows, &alerts)
        } else {
            rows
        };
        Ok((visible, alerts))
    }

    pub async fn bootstrap(
        &self,
        actor: &Actor,
        request: &BootstrapRequest,
        settings: &Settings,
        today: NaiveDate,
    ) -> Result<BootstrapData, SyncError> {
        let profiles = self.profiles();
        let accessible = profiles.accessible_profiles(actor).await?;
        let accessible_names: Vec<&str> = accessible.iter().map(|p| p.name.as_str()).collect();

        let requested = request
            .profile_name
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());
        if let Some(name) = requested {
            if !accessible_names.contains(&name) {
                return Err(SyncError::permission_denied(&format!(
                    "User {} does not have access to POS Profile {name}.",
                    actor.user
                )));
            }
        }

        let open_shift = profiles
            .require_open_shift(
                actor,
                requested,
                request.pos_opening_entry.as_deref().filter(|n| !n.is_empty()),
            )
            .await?;

        let profile_name = requested
            .map(str::to_string)
            .or_else(|| {
                let shift_profile = open_shift.pos_profile.trim();
                (!shift_profile.is_empty()).then(|| shift_profile.to_string())
            })
            .or_else(|| accessible.first().map(|p| p.name.clone()));
        if let Some(name) = &profile_name {
            if !accessible_names.contains(&name.as_str()) {
                return Err(SyncError::permission_denied(&format!(
                    "User {} does not have access to POS Profile {name}.",
                    actor.user
                )));
            }
        }

        let detail = match &profile_name {
            Some(name) => profiles.profile_detail(name).await?,
            None => None,
        };

        let company_name = detail
            .as_ref()
            .map(|d| d.company.clone())
            .filter(|c| !c.is_empty());
        let company = match &company_name {
            Some(name) => self.company_row(name).await?,
            None => None,
        };

        let warehouse = pick(
            request.warehouse.as_deref(),
            detail.as_ref().map(|d| d.warehouse.as_str()),
        );
        let price_list = pick(
            request.price_list.as_deref(),
            detail.as_ref().map(|d| d.selling_price_list.as_str()),
        );
        let route = pick(
            request.route.as_deref(),
            detail.as_ref().map(|d| d.route.as_str()),
        )
        .or_else(|| {
            detail
                .as_ref()
                .map(|d| d.territory.clone())
                .filter(|t| !t.is_empty())
        });
        let territory = pick(request.territory.as_deref(), route.as_deref());

        let limit = request.limit.unwrap_or(settings.default_sync_page_size);

        // Inventory family + alerts.
        let (inventory_items, inventory_alerts) = if request.include_inventory {
            match &warehouse {
                Some(warehouse) => {
                    let (rows, info) = self
                        .inventory()
                        .snapshot_page(
                            warehouse,
                            price_list.as_deref().unwrap_or(""),
                            request.inventory_offset,
                            limit,
                        )
                        .await?;
                    let (visible, alerts) = self
                        .alerts_and_visible_rows(settings, warehouse, rows, request.include_alerts)
                        .await?;
                    (
                        Paginated::new(visible, info),
                        if request.include_alerts { alerts } else { Vec::new() },
                    )
                }
                None => (Paginated::whole(Vec::new()), Vec::new()),
            }
        } else {
            (Paginated::whole(Vec::new()), Vec::new())
        };

        // Customer family with outstanding aggregation on the page.
        let customers = if request.include_customers {
            let all = self
                .customers()
                .customers(route.as_deref(), territory.as_deref(), None, false)
                .await?;
            let mut page = paginate(all, request.customers_offset, limit);
            let names: Vec<String> = page.items.iter().map(|c| c.name.clone()).collect();
            let outstanding = self
                .customers()
                .outstanding_summary(&names, profile_name.as_deref(), company_name.as_deref())
                .await?;
            for customer in &mut page.items {
                if let Some(summary) = outstanding.get(&customer.name) {
                    customer.outstanding = summary.outstanding;
                    customer.pending_invoices_count = summary.pending_invoices_count;
                }
            }
            page
        } else {
            Paginated::whole(Vec::new())
        };

        let suppliers = self
            .suppliers_page(request.suppliers_offset, limit)
            .await?;

        let invoices = if request.include_invoices {
            let profile = profile_name.clone().unwrap_or_default();
            let all = self
                .invoices()
                .bootstrap_invoices(&profile, settings, request.recent_paid_only, today)
                .await?;
            paginate(all, request.invoices_offset, limit)
        } else {
            Paginated::whole(Vec::new())
        };

        let from_date = today - chrono::Duration::days(settings.payment_entry_days.max(0));
        let payment_entries = paginate(
            self.payments().bootstrap_entries(from_date).await?,
            request.payments_offset,
            limit,
        );

        // Reference data.
        let base_currency = company
            .as_ref()
            .map(|c| c.default_currency.clone())
            .filter(|c| !c.is_empty())
            .or_else(|| {
                detail
                    .as_ref()
                    .map(|d| d.currency.clone())
                    .filter(|c| !c.is_empty())
            });
        let rate_date = open_shift
            .posting_date
            .parse::<NaiveDate>()
            .unwrap_or(today);
        let session = self.resolver.session();
        let store = self.store.clone();
        let (currencies, exchange_rates) =
            active_currencies(&store, &session, base_currency.as_deref(), rate_date).await?;

        let stock_settings = self.stock_settings().await?;
        let payment_terms = self.reference_rows::<PaymentTermRow>("Payment Term").await?;
        let customer_groups = self
            .reference_rows::<CustomerGroupRow>("Customer Group")
            .await?;
        let territories = self.reference_rows::<TerritoryRow>("Territory").await?;

        Ok(BootstrapData {
            context: BootstrapContext {
                profile_name: profile_name.clone(),
                company: company_name,
                company_currency: company
                    .as_ref()
                    .map(|c| c.default_currency.clone())
                    .filter(|c| !c.is_empty()),
                warehouse,
                route,
                territory,
                price_list,
                currency: detail
                    .as_ref()
                    .map(|d| d.currency.clone())
                    .filter(|c| !c.is_empty()),
                pos_opening_entry: open_shift.name.clone(),
            },
            open_shift,
            pos_profiles: accessible,
            pos_profile_detail: detail,
            company,
            stock_settings,
            currencies,
            exchange_rates,
            payment_terms,
            customer_groups,
            territories,
            inventory_items,
            inventory_alerts,
            customers,
            suppliers,
            invoices,
            payment_entries,
        })
    }

    async fn company_row(&self, name: &str) -> Result<Option<CompanyRow>, SyncError> {
        match self.store.get("Company", name).await {
            Ok(doc) => {
                let mut row: CompanyRow = crate::rows::row_from_doc(&doc)?;
                if row.company.is_empty() {
                    row.company = doc.name.clone();
                }
                Ok(Some(row))
            }
            Err(err) if err.code() == "NOT_FOUND" => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn stock_settings(&self) -> Result<StockSettingsRow, SyncError> {
        if !self.caps.has_table("Stock Settings") {
            return Ok(StockSettingsRow::default());
        }
        match self.store.get("Stock Settings", "Stock Settings").await {
            Ok(doc) => crate::rows::row_from_doc(&doc),
            Err(err) if err.code() == "NOT_FOUND" => Ok(StockSettingsRow::default()),
            Err(err) => Err(err.into()),
        }
    }

    async fn suppliers_page(
        &self,
        offset: u64,
        limit: u32,
    ) -> Result<Paginated<SupplierRow>, SyncError> {
        if !self.caps.has_table("Supplier") {
            return Ok(Paginated::whole(Vec::new()));
        }
        let listing = self
            .store
            .list(
                "Supplier",
                QueryParams::default()
                    .filter("disabled", Filter::Eq(Value::from(0)))
                    .order(OrderBy::asc("name"))
                    .page(offset, Some(limit)),
            )
            .await?;
        let rows: Vec<SupplierRow> = rows_from_docs(&listing.docs)?;
        Ok(Paginated::new(
            rows,
            PageInfo::new(offset, limit, listing.total),
        ))
    }

    pub(crate) async fn reference_rows<T: serde::de::DeserializeOwned>(
        &self,
        doctype: &str,
    ) -> Result<Vec<T>, SyncError> {
        if !self.caps.has_table(doctype) {
            return Ok(Vec::new());
        }
        let listing = self
            .store
            .list(doctype, QueryParams::default().order(OrderBy::asc("name")))
            .await?;
        rows_from_docs(&listing.docs)
    }
}

fn pick(requested: Option<&str>, fallback: Option<&str>) -> Option<String> {
    requested
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| fallback.map(str::trim).filter(|v| !v.is_empty()))
        .map(str::to_string)
}

fn paginate<T>(items: Vec<T>, offset: u64, limit: u32) -> Paginated<T> {
    let total = items.len() as u64;
    let start = (offset as usize).min(items.len());
    let page: Vec<T> = if limit > 0 {
        items.into_iter().skip(start).take(limit as usize).collect()
    } else {
        items.into_iter().skip(start).collect()
    };
    let info = if limit > 0 {
        PageInfo::new(offset, limit, total)
    } else {
        PageInfo::whole(total)
    };
    Paginated::new(page, info)
}
