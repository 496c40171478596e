use crate::errors::SyncError;
use crate::rows::{rows_from_docs, CreditLimitRow, CreditLimitSummary, CustomerRow};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tillbase_storage::prelude::*;

/// Invoice statuses that still owe money.
pub const OUTSTANDING_STATUSES: [&str; 6] = [
    "Unpaid",
    "Overdue",
    "Partly Paid",
    "Overdue and Discounted",
    "Unpaid and Discounted",
    "Partly Paid and Discounted",
];

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OutstandingSummary {
    pub outstanding: f64,
    pub pending_invoices_count: u64,
}

#[derive(Clone)]
pub struct CustomerReader {
    store: Arc<dyn DocumentStore>,
    caps: SchemaCapabilities,
}

impl CustomerReader {
    pub fn new(store: Arc<dyn DocumentStore>, caps: SchemaCapabilities) -> Self {
        CustomerReader { store, caps }
    }

    /// Customers scoped to a delivery route (preferred) or territory, with
    /// credit limits attached. Delta pulls include disabled customers so
    /// clients can tombstone them.
    pub async fn customers(
        &self,
        route: Option<&str>,
        territory: Option<&str>,
        modified_since: Option<i64>,
        include_disabled: bool,
    ) -> Result<Vec<CustomerRow>, SyncError> {
        let mut params = QueryParams::default().order(OrderBy::asc("customer_name"));
        if !include_disabled {
            params = params.filter("disabled", Filter::Eq(Value::from(0)));
        }
        if let Some(since) = modified_since {
            params = params.filter("modified", Filter::Gte(Value::from(since)));
        }
        if let Some(route) = route.filter(|r| !r.is_empty()) {
            if self.caps.has_field("Customer", "route") {
                params = params.filter("route", Filter::Eq(Value::String(route.into())));
            }
        } else if let Some(territory) = territory.filter(|t| !t.is_empty()) {
            if self.caps.has_field("Customer", "territory") {
                params = params.filter("territory", Filter::Eq(Value::String(territory.into())));
            }
        }

        let listing = self.store.list("Customer", params).await?;
        let mut customers: Vec<CustomerRow> = rows_from_docs(&listing.docs)?;

        let credit_by_parent = self
            .credit_limits(customers.iter().map(|c| c.name.clone()).collect())
            .await?;
        for customer in &mut customers {
            customer.credit_limits = credit_by_parent
                .get(&customer.name)
                .cloned()
                .unwrap_or_default();
        }
        Ok(customers)
    }

    async fn credit_limits(
        &self,
        names: Vec<String>,
    ) -> Result<BTreeMap<String, Vec<CreditLimitSummary>>, SyncError> {
        let mut map: BTreeMap<String, Vec<CreditLimitSummary>> = BTreeMap::new();
        if names.is_empty() || !self.caps.has_table("Customer Credit Limit") {
            return Ok(map);
        }
        let listing = self
            .store
            .list(
                "Customer Credit Limit",
                QueryParams::default().filter(
                    "parent",
                    Filter::In(names.into_iter().map(Value::String).collect()),
                ),
            )
            .await?;
        for row in rows_from_docs::<CreditLimitRow>(&listing.docs)? {
            if row.parent.is_empty() {
                continue;
            }
            map.entry(row.parent.clone()).or_default().push(CreditLimitSummary {
                company: row.company,
                credit_limit: row.credit_limit,
                bypass_credit_limit_check: row.bypass_credit_limit_check,
            });
        }
        Ok(map)
    }

    /// Positive outstanding totals per customer across open-status
    /// invoices. Invoices without a profile (created at the desk) count
    /// toward every profile.
    pub async fn outstanding_summary(
        &self,
        customer_names: &[String],
        profile: Option<&str>,
        company: Option<&str>,
    ) -> Result<BTreeMap<String, OutstandingSummary>, SyncError> {
        let mut summary: BTreeMap<String, OutstandingSummary> = BTreeMap::new();
        if customer_names.is_empty() {
            return Ok(summary);
        }

        let mut params = QueryParams::default()
            .filter(
                "customer",
                Filter::In(
                    customer_names
                        .iter()
                        .map(|n| Value::String(n.clone()))
                        .collect(),
                ),
            )
            .filter(
                "status",
                Filter::In(
                    OUTSTANDING_STATUSES
                        .iter()
                        .map(|s| Value::String((*s).into()))
                        .collect(),
                ),
            );
        if let Some(company) = company.filter(|c| !c.is_empty()) {
            params = params.filter("company", Filter::Eq(Value::String(company.into())));
        }

        let listing = self.store.list("Sales Invoice", params).await?;
        for doc in &listing.docs {
            let row_profile = doc.field_str("pos_profile").unwrap_or_default().trim();
            if let Some(profile) = profile.filter(|p| !p.is_empty()) {
                if !row_profile.is_empty() && row_profile != profile {
                    continue;
                }
            }
            let customer = doc.field_str("customer").unwrap_or_default().trim().to_string();
            if customer.is_empty() {
                continue;
            }
            let mut outstanding = doc.field_f64("outstanding_amount");
            if outstanding == 0.0 {
                outstanding = doc.field_f64("grand_total") - doc.field_f64("paid_amount");
            }
            if outstanding <= 0.0 {
                continue;
            }
            let bucket = summary.entry(customer).or_default();
            bucket.outstanding += outstanding;
            bucket.pending_invoices_count += 1;
        }
        Ok(summary)
    }

    /// Credit limit applicable to one customer: the company-specific row
    /// first, else the first configured row.
    pub fn resolve_credit_limit(
        credit_limits: &[CreditLimitSummary],
        company: Option<&str>,
    ) -> Option<f64> {
        if let Some(company) = company.filter(|c| !c.is_empty()) {
            if let Some(row) = credit_limits
                .iter()
                .find(|row| !row.company.is_empty() && row.company == company)
            {
                return row.credit_limit;
            }
        }
        credit_limits.iter().find_map(|row| row.credit_limit)
    }
}
