use crate::errors::SyncError;
use crate::rows::{rows_from_docs, CurrencyRow};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tillbase_rates::prelude::*;
use tillbase_storage::prelude::*;
use tillbase_types::prelude::CurrencyCode;

#[derive(Clone, Debug, Serialize)]
pub struct ExchangeRates {
    pub base_currency: Option<String>,
    pub date: String,
    pub rates: BTreeMap<String, Option<f64>>,
}

/// Stored conversion quotes read straight from the document store's
/// exchange table, so the resolver's fallback chain sees authored data.
#[derive(Clone)]
pub struct DocQuoteStore {
    store: Arc<dyn DocumentStore>,
}

impl DocQuoteStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        DocQuoteStore { store }
    }
}

#[async_trait]
impl QuoteStore for DocQuoteStore {
    async fn latest_quote(
        &self,
        from: &CurrencyCode,
        to: &CurrencyCode,
        date: NaiveDate,
    ) -> Result<Option<ExchangeQuote>, RateError> {
        let params = QueryParams::default()
            .filter("from_currency", Filter::Eq(Value::String(from.0.clone())))
            .filter("to_currency", Filter::Eq(Value::String(to.0.clone())))
            .filter("date", Filter::Lte(Value::String(date.to_string())))
            .order(OrderBy::desc("date"))
            .page(0, Some(1));
        let listing = self
            .store
            .list("Currency Exchange", params)
            .await
            .map_err(|err| RateError::provider_unavailable(&format!("quote lookup: {err}")))?;

        Ok(listing.docs.first().and_then(|doc| {
            let rate = doc.field_f64("exchange_rate");
            let quote_date: NaiveDate = doc.field_str("date")?.parse().ok()?;
            Some(ExchangeQuote {
                from: from.clone(),
                to: to.clone(),
                date: quote_date,
                rate,
            })
        }))
    }
}

/// Enabled currencies with each one's rate against the base currency as of
/// the given date, resolved through one memoized session.
pub async fn active_currencies(
    store: &Arc<dyn DocumentStore>,
    session: &RateSession,
    base_currency: Option<&str>,
    rate_date: NaiveDate,
) -> Result<(Vec<CurrencyRow>, ExchangeRates), SyncError> {
    let listing = store
        .list(
            "Currency",
            QueryParams::default()
                .filter("enabled", Filter::Eq(Value::from(1)))
                .order(OrderBy::asc("name")),
        )
        .await?;
    let mut currencies: Vec<CurrencyRow> = rows_from_docs(&listing.docs)?;

    let mut rates: BTreeMap<String, Option<f64>> = BTreeMap::new();
    for row in &mut currencies {
        let code = row.name.trim().to_string();
        if code.is_empty() {
            continue;
        }
        let resolved = match base_currency {
            Some(base) if !base.is_empty() => {
                session
                    .resolve(
                        &CurrencyCode(code.clone()),
                        &CurrencyCode(base.to_string()),
                        rate_date,
                    )
                    .await
            }
            _ => None,
        };
        row.exchange_rate = resolved;
        row.exchange_rate_to = base_currency.map(str::to_string);
        row.exchange_rate_date = Some(rate_date.to_string());
        rates.insert(code, resolved);
    }

    Ok((
        currencies,
        ExchangeRates {
            base_currency: base_currency.map(str::to_string),
            date: rate_date.to_string(),
            rates,
        },
    ))
}
