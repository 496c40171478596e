use tillbase_errors::prelude::*;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0:?}")]
pub struct StorageError(pub Box<ErrorObj>);

impl StorageError {
    pub fn into_inner(self) -> ErrorObj {
        *self.0
    }

    pub fn code(&self) -> &'static str {
        self.0.code.as_str()
    }

    pub fn not_found(msg: &str) -> Self {
        StorageError(Box::new(
            ErrorBuilder::new(codes::NOT_FOUND)
                .user_msg("Document not found.")
                .dev_msg(msg)
                .build(),
        ))
    }

    pub fn validation(msg: &str) -> Self {
        StorageError(Box::new(
            ErrorBuilder::new(codes::VALIDATION_ERROR)
                .user_msg(msg)
                .build(),
        ))
    }

    pub fn permission_denied(msg: &str) -> Self {
        StorageError(Box::new(
            ErrorBuilder::new(codes::PERMISSION_DENIED)
                .user_msg("Not permitted.")
                .dev_msg(msg)
                .build(),
        ))
    }

    pub fn link_violation(msg: &str) -> Self {
        StorageError(Box::new(
            ErrorBuilder::new(codes::LINK_VALIDATION_ERROR)
                .user_msg("Linked document constraint violated.")
                .dev_msg(msg)
                .build(),
        ))
    }

    pub fn conflict(msg: &str) -> Self {
        StorageError(Box::new(
            ErrorBuilder::new(codes::CONFLICT)
                .user_msg("Document was changed concurrently.")
                .dev_msg(msg)
                .build(),
        ))
    }

    pub fn internal(msg: &str) -> Self {
        StorageError(Box::new(
            ErrorBuilder::new(codes::INTERNAL_ERROR)
                .user_msg("Storage operation failed.")
                .dev_msg(msg)
                .build(),
        ))
    }
}
