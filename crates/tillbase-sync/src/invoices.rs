use crate::errors::SyncError;
use crate::rows::{
    rows_from_docs, InvoiceItemRow, InvoicePaymentRow, InvoiceRow, PaymentScheduleRow,
};
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tillbase_config::Settings;
use tillbase_storage::prelude::*;

/// Statuses that keep an invoice in the bootstrap "open" window.
pub const OPEN_STATUSES: [&str; 10] = [
    "Draft",
    "Unpaid",
    "Overdue",
    "Partly Paid",
    "Overdue and Discounted",
    "Unpaid and Discounted",
    "Partly Paid and Discounted",
    "Cancelled",
    "Credit Note Issued",
    "Return",
];

#[derive(Clone)]
pub struct InvoiceReader {
    store: Arc<dyn DocumentStore>,
    caps: SchemaCapabilities,
}

impl InvoiceReader {
    pub fn new(store: Arc<dyn DocumentStore>, caps: SchemaCapabilities) -> Self {
        InvoiceReader { store, caps }
    }

    /// Time-windowed bootstrap set: open-status invoices over the last N
    /// days plus recently paid ones over the last M days, de-duplicated by
    /// name, children attached.
    pub async fn bootstrap_invoices(
        &self,
        profile: &str,
        settings: &Settings,
        recent_paid_only: bool,
        today: NaiveDate,
    ) -> Result<Vec<InvoiceRow>, SyncError> {
        if profile.is_empty() {
            return Ok(Vec::new());
        }
        let open_start = today - chrono::Duration::days(settings.bootstrap_invoice_days.max(0));

        let open_params = QueryParams::default()
            .filter("pos_profile", Filter::Eq(Value::String(profile.into())))
            .filter(
                "posting_date",
                Filter::Gte(Value::String(open_start.to_string())),
            )
            .filter(
                "status",
                Filter::In(
                    OPEN_STATUSES
                        .iter()
                        .map(|s| Value::String((*s).into()))
                        .collect(),
                ),
            )
            .order(OrderBy::desc("posting_date"));
        let listing = self.store.list("Sales Invoice", open_params).await?;
        let mut invoices: Vec<InvoiceRow> = rows_from_docs(&listing.docs)?;

        if recent_paid_only {
            let paid_start =
                today - chrono::Duration::days(settings.recent_paid_invoice_days.max(0));
            let paid_params = QueryParams::default()
                .filter("pos_profile", Filter::Eq(Value::String(profile.into())))
                .filter(
                    "posting_date",
                    Filter::Gte(Value::String(paid_start.to_string())),
                )
                .filter("status", Filter::Eq(Value::String("Paid".into())))
                .order(OrderBy::desc("posting_date"));
            let paid = self.store.list("Sales Invoice", paid_params).await?;
            let seen: std::collections::BTreeSet<String> =
                invoices.iter().map(|row| row.name.clone()).collect();
            for row in rows_from_docs::<InvoiceRow>(&paid.docs)? {
                if !seen.contains(&row.name) {
                    invoices.push(row);
                }
            }
        }

        self.attach_children(&mut invoices).await?;
        Ok(invoices)
    }

    /// Incremental rows since the watermark, scoped to the profile when
    /// one is set.
    pub async fn delta(
        &self,
        modified_since: i64,
        profile: Option<&str>,
    ) -> Result<Vec<InvoiceRow>, SyncError> {
        let mut params = QueryParams::default()
            .filter("modified", Filter::Gte(Value::from(modified_since)))
            .order(OrderBy::asc("modified"));
        if let Some(profile) = profile.filter(|p| !p.is_empty()) {
            params = params.filter("pos_profile", Filter::Eq(Value::String(profile.into())));
        }
        let listing = self.store.list("Sales Invoice", params).await?;
        let mut invoices: Vec<InvoiceRow> = rows_from_docs(&listing.docs)?;
        self.attach_children(&mut invoices).await?;
        Ok(invoices)
    }

    async fn attach_children(&self, invoices: &mut [InvoiceRow]) -> Result<(), SyncError> {
        let names: Vec<Value> = invoices
            .iter()
            .filter(|row| !row.name.is_empty())
            .map(|row| Value::String(row.name.clone()))
            .collect();
        if names.is_empty() {
            return Ok(());
        }

        let items: BTreeMap<String, Vec<InvoiceItemRow>> = group_by_parent(
            self.child_rows("Sales Invoice Item", &names).await?,
            |row: &InvoiceItemRow| row.parent.clone(),
        );
        let payments: BTreeMap<String, Vec<InvoicePaymentRow>> = group_by_parent(
            self.child_rows("Sales Invoice Payment", &names).await?,
            |row: &InvoicePaymentRow| row.parent.clone(),
        );
        let schedules: BTreeMap<String, Vec<PaymentScheduleRow>> = group_by_parent(
            self.child_rows("Payment Schedule", &names).await?,
            |row: &PaymentScheduleRow| row.parent.clone(),
        );

        for invoice in invoices {
            invoice.items = items.get(&invoice.name).cloned().unwrap_or_default();
            invoice
                .items
                .retain(|item| !item.item_code.trim().is_empty());
            invoice.payments = payments.get(&invoice.name).cloned().unwrap_or_default();
            invoice
                .payments
                .retain(|payment| !payment.mode_of_payment.trim().is_empty());
            invoice.payment_schedule = schedules.get(&invoice.name).cloned().unwrap_or_default();
        }
        Ok(())
    }

    async fn child_rows<T: serde::de::DeserializeOwned>(
        &self,
        doctype: &str,
        parent_names: &[Value],
    ) -> Result<Vec<T>, SyncError> {
        if !self.caps.has_table(doctype) {
            return Ok(Vec::new());
        }
        let mut params = QueryParams::default()
            .filter("parent", Filter::In(parent_names.to_vec()))
            .order(OrderBy::asc("idx"));
        if self.caps.has_field(doctype, "parenttype") {
            params = params.filter(
                "parenttype",
                Filter::Eq(Value::String("Sales Invoice".into())),
            );
        }
        let listing = self.store.list(doctype, params).await?;
        rows_from_docs(&listing.docs)
    }
}

fn group_by_parent<T>(rows: Vec<T>, parent: impl Fn(&T) -> String) -> BTreeMap<String, Vec<T>> {
    let mut grouped: BTreeMap<String, Vec<T>> = BTreeMap::new();
    for row in rows {
        let key = parent(&row);
        if key.is_empty() {
            continue;
        }
        grouped.entry(key).or_default().push(row);
    }
    grouped
}
