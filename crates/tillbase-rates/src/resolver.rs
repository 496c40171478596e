use crate::errors::RateError;
use crate::source::{ExchangeRateSource, QuoteStore};
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tillbase_types::prelude::CurrencyCode;

/// Resolves a conversion rate as of a date through the fallback chain:
/// identity, external source, stored direct quote, inverted stored quote.
/// `None` means "unknown" — callers must never substitute 1.0 for it.
#[derive(Clone)]
pub struct RateResolver {
    source: Arc<dyn ExchangeRateSource>,
    quotes: Arc<dyn QuoteStore>,
}

impl RateResolver {
    pub fn new(source: Arc<dyn ExchangeRateSource>, quotes: Arc<dyn QuoteStore>) -> Self {
        RateResolver { source, quotes }
    }

    pub async fn resolve(
        &self,
        from: &CurrencyCode,
        to: &CurrencyCode,
        date: NaiveDate,
    ) -> Option<f64> {
        if from.0.is_empty() || to.0.is_empty() {
            return None;
        }
        if from == to {
            return Some(1.0);
        }

        match self.source.lookup(from, to, date).await {
            Ok(Some(rate)) if rate > 0.0 => return Some(rate),
            Ok(_) => {}
            Err(err) => {
                // Source trouble degrades to stored quotes.
                tracing::debug!(
                    target: "tillbase::rates",
                    from = %from,
                    to = %to,
                    "rate source lookup failed: {err:?}"
                );
            }
        }

        if let Ok(Some(quote)) = self.quotes.latest_quote(from, to, date).await {
            if quote.rate > 0.0 {
                return Some(quote.rate);
            }
        }

        if let Ok(Some(inverse)) = self.quotes.latest_quote(to, from, date).await {
            if inverse.rate > 0.0 {
                return Some(1.0 / inverse.rate);
            }
        }

        None
    }

    pub fn session(&self) -> RateSession {
        RateSession {
            resolver: self.clone(),
            memo: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

/// Memoizes resolved pairs for the duration of one sync response; nothing
/// outlives the session.
#[derive(Clone)]
pub struct RateSession {
    resolver: RateResolver,
    memo: Arc<Mutex<HashMap<(String, String, NaiveDate), Option<f64>>>>,
}

impl RateSession {
    pub async fn resolve(
        &self,
        from: &CurrencyCode,
        to: &CurrencyCode,
        date: NaiveDate,
    ) -> Option<f64> {
        let key = (from.0.clone(), to.0.clone(), date);
        if let Some(cached) = self.memo.lock().get(&key) {
            return *cached;
        }
        let resolved = self.resolver.resolve(from, to, date).await;
        self.memo.lock().insert(key, resolved);
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExchangeQuote;
    use crate::source::{InMemoryQuoteStore, NullRateSource};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cur(code: &str) -> CurrencyCode {
        CurrencyCode(code.to_string())
    }

    fn date(text: &str) -> NaiveDate {
        text.parse().unwrap()
    }

    struct FixedSource {
        rate: Option<f64>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ExchangeRateSource for FixedSource {
        async fn lookup(
            &self,
            _: &CurrencyCode,
            _: &CurrencyCode,
            _: NaiveDate,
        ) -> Result<Option<f64>, RateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.rate)
        }
    }

    fn resolver_with_quotes(quotes: &[ExchangeQuote]) -> RateResolver {
        let store = InMemoryQuoteStore::new();
        for quote in quotes {
            store.push(quote.clone());
        }
        RateResolver::new(Arc::new(NullRateSource), Arc::new(store))
    }

    #[tokio::test]
    async fn same_currency_is_exactly_one_regardless_of_quotes() {
        let resolver = resolver_with_quotes(&[ExchangeQuote::new(
            "USD",
            "USD",
            date("2024-01-01"),
            9.0,
        )]);
        assert_eq!(resolver.resolve(&cur("USD"), &cur("USD"), date("2024-06-01")).await, Some(1.0));
    }

    #[tokio::test]
    async fn external_source_wins_when_positive() {
        let source = Arc::new(FixedSource {
            rate: Some(36.5),
            calls: AtomicUsize::new(0),
        });
        let store = InMemoryQuoteStore::new();
        store.push(ExchangeQuote::new("USD", "VES", date("2024-01-01"), 10.0));
        let resolver = RateResolver::new(source, Arc::new(store));
        assert_eq!(
            resolver.resolve(&cur("USD"), &cur("VES"), date("2024-06-01")).await,
            Some(36.5)
        );
    }

    #[tokio::test]
    async fn non_positive_source_rate_falls_through_to_stored_quote() {
        let source = Arc::new(FixedSource {
            rate: Some(0.0),
            calls: AtomicUsize::new(0),
        });
        let store = InMemoryQuoteStore::new();
        store.push(ExchangeQuote::new("USD", "VES", date("2024-01-01"), 10.0));
        let resolver = RateResolver::new(source, Arc::new(store));
        assert_eq!(
            resolver.resolve(&cur("USD"), &cur("VES"), date("2024-06-01")).await,
            Some(10.0)
        );
    }

    #[tokio::test]
    async fn most_recent_quote_on_or_before_date_wins() {
        let resolver = resolver_with_quotes(&[
            ExchangeQuote::new("USD", "VES", date("2024-01-01"), 10.0),
            ExchangeQuote::new("USD", "VES", date("2024-05-01"), 20.0),
            ExchangeQuote::new("USD", "VES", date("2024-07-01"), 30.0),
        ]);
        assert_eq!(
            resolver.resolve(&cur("USD"), &cur("VES"), date("2024-06-01")).await,
            Some(20.0)
        );
    }

    #[tokio::test]
    async fn inverse_quote_is_inverted() {
        let resolver = resolver_with_quotes(&[ExchangeQuote::new(
            "VES",
            "USD",
            date("2024-01-01"),
            40.0,
        )]);
        assert_eq!(
            resolver.resolve(&cur("USD"), &cur("VES"), date("2024-06-01")).await,
            Some(1.0 / 40.0)
        );
    }

    #[tokio::test]
    async fn unknown_pair_is_none_not_one() {
        let resolver = resolver_with_quotes(&[]);
        assert_eq!(resolver.resolve(&cur("USD"), &cur("XXX"), date("2024-06-01")).await, None);
    }

    #[tokio::test]
    async fn session_memoizes_per_pair() {
        let source = Arc::new(FixedSource {
            rate: Some(2.0),
            calls: AtomicUsize::new(0),
        });
        let resolver = RateResolver::new(source.clone(), Arc::new(InMemoryQuoteStore::new()));
        let session = resolver.session();

        for _ in 0..3 {
            assert_eq!(
                session.resolve(&cur("USD"), &cur("EUR"), date("2024-06-01")).await,
                Some(2.0)
            );
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }
}
