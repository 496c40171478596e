use tillbase_errors::prelude::*;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0:?}")]
pub struct RateError(pub Box<ErrorObj>);

impl RateError {
    pub fn into_inner(self) -> ErrorObj {
        *self.0
    }

    pub fn provider_unavailable(detail: &str) -> Self {
        RateError(Box::new(
            ErrorBuilder::new(codes::PROVIDER_UNAVAILABLE)
                .user_msg("Exchange rate source is unavailable.")
                .dev_msg(detail)
                .build(),
        ))
    }
}
