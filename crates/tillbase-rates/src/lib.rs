pub mod errors;
pub mod model;
pub mod resolver;
pub mod source;
pub mod prelude;

pub use errors::RateError;
pub use model::ExchangeQuote;
pub use resolver::{RateResolver, RateSession};
pub use source::{ExchangeRateSource, InMemoryQuoteStore, NullRateSource, QuoteStore};
