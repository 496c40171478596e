use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use tillbase_errors::prelude::*;
use tillbase_types::prelude::Envelope;

/// Gateway-level error: any collaborator failure normalized to an
/// `ErrorObj` plus the request id it should be correlated with.
#[derive(Debug)]
pub struct ApiError {
    pub obj: ErrorObj,
    pub request_id: Option<String>,
}

impl ApiError {
    pub fn new(obj: ErrorObj) -> Self {
        ApiError {
            obj,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn authentication(msg: &str) -> Self {
        ApiError::new(
            ErrorBuilder::new(codes::AUTHENTICATION_ERROR)
                .user_msg(msg)
                .build(),
        )
    }

    pub fn validation(msg: &str) -> Self {
        ApiError::new(ErrorBuilder::new(codes::VALIDATION_ERROR).user_msg(msg).build())
    }

    pub fn forbidden(msg: &str) -> Self {
        ApiError::new(ErrorBuilder::new(codes::PERMISSION_DENIED).user_msg(msg).build())
    }
}

impl From<tillbase_storage::StorageError> for ApiError {
    fn from(err: tillbase_storage::StorageError) -> Self {
        ApiError::new(err.into_inner())
    }
}

impl From<tillbase_tx::TxError> for ApiError {
    fn from(err: tillbase_tx::TxError) -> Self {
        ApiError::new(err.into_inner())
    }
}

impl From<tillbase_sync::SyncError> for ApiError {
    fn from(err: tillbase_sync::SyncError) -> Self {
        ApiError::new(err.into_inner())
    }
}

impl From<tillbase_config::ConfigError> for ApiError {
    fn from(err: tillbase_config::ConfigError) -> Self {
        ApiError::new(err.into_inner())
    }
}

fn is_expected(code: &str) -> bool {
    matches!(
        code,
        "VALIDATION_ERROR"
            | "NOT_FOUND"
            | "PERMISSION_DENIED"
            | "AUTHENTICATION_ERROR"
            | "LINK_VALIDATION_ERROR"
    )
}

/// Success envelope; always HTTP 200 so clients switch on `success`.
pub fn ok_response(data: Value, request_id: Option<String>) -> Response {
    (StatusCode::OK, Json(Envelope::ok(data, request_id))).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.obj.code.as_str();
        // Expected business errors go back without incident logging;
        // everything else is logged server-side with the dev message.
        if !is_expected(code) {
            tracing::error!(
                target: "tillbase::gateway",
                code,
                request_id = self.request_id.as_deref().unwrap_or(""),
                "request failed: {}",
                self.obj.message()
            );
        }
        let status =
            StatusCode::from_u16(self.obj.code.http_status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let envelope = Envelope::fail(
            code,
            self.obj.message_user.clone(),
            self.obj.wire_details(),
            self.request_id,
        );
        (status, Json(envelope)).into_response()
    }
}

pub type ApiResult = Result<Response, ApiError>;
