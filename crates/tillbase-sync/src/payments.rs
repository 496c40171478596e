use crate::errors::SyncError;
use crate::rows::{rows_from_docs, PaymentEntryRow, PaymentReferenceRow};
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tillbase_storage::prelude::*;

#[derive(Clone)]
pub struct PaymentReader {
    store: Arc<dyn DocumentStore>,
    caps: SchemaCapabilities,
}

impl PaymentReader {
    pub fn new(store: Arc<dyn DocumentStore>, caps: SchemaCapabilities) -> Self {
        PaymentReader { store, caps }
    }

    /// Submitted customer receipts windowed by posting date, references
    /// attached.
    pub async fn bootstrap_entries(
        &self,
        from_date: NaiveDate,
    ) -> Result<Vec<PaymentEntryRow>, SyncError> {
        let params = QueryParams::default()
            .filter(
                "posting_date",
                Filter::Gte(Value::String(from_date.to_string())),
            )
            .filter("docstatus", Filter::Eq(Value::from(1)))
            .filter("party_type", Filter::Eq(Value::String("Customer".into())))
            .filter("payment_type", Filter::Eq(Value::String("Receive".into())))
            .order(OrderBy::desc("posting_date"));
        let listing = self.store.list("Payment Entry", params).await?;
        let mut entries: Vec<PaymentEntryRow> = rows_from_docs(&listing.docs)?;
        self.attach_references(&mut entries).await?;
        Ok(entries)
    }

    /// Customer receipts changed since the watermark, any docstatus, so
    /// clients observe cancellations too.
    pub async fn delta(&self, modified_since: i64) -> Result<Vec<PaymentEntryRow>, SyncError> {
        let params = QueryParams::default()
            .filter("modified", Filter::Gte(Value::from(modified_since)))
            .filter("party_type", Filter::Eq(Value::String("Customer".into())))
            .filter("payment_type", Filter::Eq(Value::String("Receive".into())))
            .order(OrderBy::asc("modified"));
        let listing = self.store.list("Payment Entry", params).await?;
        let mut entries: Vec<PaymentEntryRow> = rows_from_docs(&listing.docs)?;
        self.attach_references(&mut entries).await?;
        Ok(entries)
    }

    async fn attach_references(&self, entries: &mut [PaymentEntryRow]) -> Result<(), SyncError> {
        let names: Vec<Value> = entries
            .iter()
            .filter(|row| !row.name.is_empty())
            .map(|row| Value::String(row.name.clone()))
            .collect();
        if names.is_empty() || !self.caps.has_table("Payment Entry Reference") {
            return Ok(());
        }

        let mut params = QueryParams::default()
            .filter("parent", Filter::In(names))
            .order(OrderBy::asc("idx"));
        if self.caps.has_field("Payment Entry Reference", "parenttype") {
            params = params.filter(
                "parenttype",
                Filter::Eq(Value::String("Payment Entry".into())),
            );
        }
        let listing = self.store.list("Payment Entry Reference", params).await?;
        let mut grouped: BTreeMap<String, Vec<PaymentReferenceRow>> = BTreeMap::new();
        for row in rows_from_docs::<PaymentReferenceRow>(&listing.docs)? {
            if row.parent.is_empty() {
                continue;
            }
            grouped.entry(row.parent.clone()).or_default().push(row);
        }
        for entry in entries {
            entry.references = grouped.get(&entry.name).cloned().unwrap_or_default();
        }
        Ok(())
    }
}
