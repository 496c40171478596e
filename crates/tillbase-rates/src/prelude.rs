pub use crate::errors::RateError;
pub use crate::model::ExchangeQuote;
pub use crate::resolver::{RateResolver, RateSession};
pub use crate::source::{ExchangeRateSource, InMemoryQuoteStore, NullRateSource, QuoteStore};
