use tillbase_errors::prelude::*;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0:?}")]
pub struct ConfigError(pub Box<ErrorObj>);

impl ConfigError {
    pub fn into_inner(self) -> ErrorObj {
        *self.0
    }

    pub fn invalid(detail: &str) -> Self {
        ConfigError(Box::new(
            ErrorBuilder::new(codes::VALIDATION_ERROR)
                .user_msg("Runtime configuration is invalid.")
                .dev_msg(detail)
                .build(),
        ))
    }
}
