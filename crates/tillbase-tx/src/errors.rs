use tillbase_errors::prelude::*;
use tillbase_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0:?}")]
pub struct TxError(pub Box<ErrorObj>);

impl TxError {
    pub fn into_inner(self) -> ErrorObj {
        *self.0
    }

    pub fn code(&self) -> &'static str {
        self.0.code.as_str()
    }

    pub fn validation(msg: &str) -> Self {
        TxError(Box::new(
            ErrorBuilder::new(codes::VALIDATION_ERROR).user_msg(msg).build(),
        ))
    }

    /// Same request key reused with a different payload: a client bug that
    /// must fail loudly instead of silently proceeding.
    pub fn conflicting_key(key: &str, endpoint: &str) -> Self {
        TxError(Box::new(
            ErrorBuilder::new(codes::VALIDATION_ERROR)
                .user_msg("The same request key was reused with a different payload.")
                .dev_msg(format!(
                    "idempotency conflict: key {key} on {endpoint} carries a different payload hash"
                ))
                .build(),
        ))
    }

    /// Replay of a request whose first attempt failed: the stored message is
    /// surfaced verbatim, the mutation is not re-attempted.
    pub fn prior_failure(message: &str) -> Self {
        TxError(Box::new(
            ErrorBuilder::new(codes::VALIDATION_ERROR)
                .user_msg(if message.is_empty() {
                    "Previous attempt failed"
                } else {
                    message
                })
                .build(),
        ))
    }

    pub fn in_flight(key: &str) -> Self {
        TxError(Box::new(
            ErrorBuilder::new(codes::CONFLICT)
                .user_msg("Another attempt for this request is still in progress.")
                .dev_msg(format!("request key {key} is in flight"))
                .build(),
        ))
    }

    pub fn not_found(msg: &str) -> Self {
        TxError(Box::new(
            ErrorBuilder::new(codes::NOT_FOUND)
                .user_msg("Record not found.")
                .dev_msg(msg)
                .build(),
        ))
    }

    pub fn internal(msg: &str) -> Self {
        TxError(Box::new(
            ErrorBuilder::new(codes::INTERNAL_ERROR)
                .user_msg("Mutation failed.")
                .dev_msg(msg)
                .build(),
        ))
    }
}

impl From<StorageError> for TxError {
    fn from(err: StorageError) -> Self {
        TxError(Box::new(err.into_inner()))
    }
}
