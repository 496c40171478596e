use crate::errors::RateError;
use crate::model::ExchangeQuote;
use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use std::sync::Arc;
use tillbase_types::prelude::CurrencyCode;

/// Authoritative external rate lookup. Implementations must only return
/// positive rates; anything else is treated as "no quote".
#[async_trait]
pub trait ExchangeRateSource: Send + Sync {
    async fn lookup(
        &self,
        from: &CurrencyCode,
        to: &CurrencyCode,
        date: NaiveDate,
    ) -> Result<Option<f64>, RateError>;
}

/// Source that knows nothing; forces the resolver onto stored quotes.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullRateSource;

#[async_trait]
impl ExchangeRateSource for NullRateSource {
    async fn lookup(
        &self,
        _from: &CurrencyCode,
        _to: &CurrencyCode,
        _date: NaiveDate,
    ) -> Result<Option<f64>, RateError> {
        Ok(None)
    }
}

/// Read access to locally stored conversion quotes.
#[async_trait]
pub trait QuoteStore: Send + Sync {
    /// Most recent quote for (from, to) dated on or before `date`.
    async fn latest_quote(
        &self,
        from: &CurrencyCode,
        to: &CurrencyCode,
        date: NaiveDate,
    ) -> Result<Option<ExchangeQuote>, RateError>;
}

#[derive(Clone, Default)]
pub struct InMemoryQuoteStore {
    quotes: Arc<RwLock<Vec<ExchangeQuote>>>,
}

impl InMemoryQuoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, quote: ExchangeQuote) {
        self.quotes.write().push(quote);
    }
}

#[async_trait]
impl QuoteStore for InMemoryQuoteStore {
    async fn latest_quote(
        &self,
        from: &CurrencyCode,
        to: &CurrencyCode,
        date: NaiveDate,
    ) -> Result<Option<ExchangeQuote>, RateError> {
        let quotes = self.quotes.read();
        Ok(quotes
            .iter()
            .filter(|q| &q.from == from && &q.to == to && q.date <= date)
            .max_by_key(|q| q.date)
            .cloned())
    }
}
