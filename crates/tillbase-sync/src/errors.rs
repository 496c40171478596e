use tillbase_errors::prelude::*;
use tillbase_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0:?}")]
pub struct SyncError(pub Box<ErrorObj>);

impl SyncError {
    pub fn into_inner(self) -> ErrorObj {
        *self.0
    }

    pub fn code(&self) -> &'static str {
        self.0.code.as_str()
    }

    pub fn validation(msg: &str) -> Self {
        SyncError(Box::new(
            ErrorBuilder::new(codes::VALIDATION_ERROR).user_msg(msg).build(),
        ))
    }

    pub fn permission_denied(msg: &str) -> Self {
        SyncError(Box::new(
            ErrorBuilder::new(codes::PERMISSION_DENIED).user_msg(msg).build(),
        ))
    }

    pub fn not_found(msg: &str) -> Self {
        SyncError(Box::new(
            ErrorBuilder::new(codes::NOT_FOUND)
                .user_msg("Not found.")
                .dev_msg(msg)
                .build(),
        ))
    }

    pub fn internal(msg: &str) -> Self {
        SyncError(Box::new(
            ErrorBuilder::new(codes::INTERNAL_ERROR)
                .user_msg("Synchronization failed.")
                .dev_msg(msg)
                .build(),
        ))
    }
}

impl From<StorageError> for SyncError {
    fn from(err: StorageError) -> Self {
        SyncError(Box::new(err.into_inner()))
    }
}
