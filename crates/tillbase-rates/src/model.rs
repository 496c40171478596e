use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tillbase_types::prelude::CurrencyCode;

/// One stored conversion quote. Quotes are authored data; the resolver
/// only reads them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExchangeQuote {
    pub from: CurrencyCode,
    pub to: CurrencyCode,
    pub date: NaiveDate,
    pub rate: f64,
}

impl ExchangeQuote {
    pub fn new(from: &str, to: &str, date: NaiveDate, rate: f64) -> Self {
        ExchangeQuote {
            from: CurrencyCode(from.to_string()),
            to: CurrencyCode(to.to_string()),
            date,
            rate,
        }
    }
}
