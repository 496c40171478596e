use crate::time::server_time;
use serde::{Deserialize, Serialize};
use serde_json::Value;
#[cfg(feature = "schema")]
use schemars::JsonSchema;

/// Wire contract shared by every entry point, success or failure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct Envelope {
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<ErrorBody>,
    pub request_id: Option<String>,
    pub server_time: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl Envelope {
    pub fn ok(data: Value, request_id: Option<String>) -> Self {
        Envelope {
            success: true,
            data: Some(data),
            error: None,
            request_id,
            server_time: server_time(),
        }
    }

    pub fn fail(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Option<Value>,
        request_id: Option<String>,
    ) -> Self {
        Envelope {
            success: false,
            data: None,
            error: Some(ErrorBody {
                code: code.into(),
                message: message.into(),
                details,
            }),
            request_id,
            server_time: server_time(),
        }
    }
}
