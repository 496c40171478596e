use crate::codes::ErrorCode;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Normalized error carried across crate boundaries. `message_user` is safe
/// to return to clients; `message_dev` stays in server logs and diagnostics.
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorObj {
    pub code: ErrorCode,
    pub message_user: String,
    pub message_dev: Option<String>,
    pub details: Option<Value>,
    /// Diagnostic hint for failures outside the closed catalog, e.g. the
    /// collaborator exception's class name.
    pub source_hint: Option<String>,
}

impl ErrorObj {
    pub fn message(&self) -> &str {
        self.message_dev.as_deref().unwrap_or(&self.message_user)
    }

    pub fn wire_details(&self) -> Option<Value> {
        match (&self.details, &self.source_hint) {
            (Some(details), _) => Some(details.clone()),
            (None, Some(hint)) => Some(serde_json::json!({ "type": hint })),
            (None, None) => None,
        }
    }
}

impl std::fmt::Display for ErrorObj {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message())
    }
}

impl Serialize for ErrorObj {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ErrorObj", 3)?;
        state.serialize_field("code", self.code.as_str())?;
        state.serialize_field("message", &self.message_user)?;
        state.serialize_field("details", &self.wire_details())?;
        state.end()
    }
}

pub struct ErrorBuilder {
    obj: ErrorObj,
}

impl ErrorBuilder {
    pub fn new(code: ErrorCode) -> Self {
        ErrorBuilder {
            obj: ErrorObj {
                code,
                message_user: "Unexpected error".to_string(),
                message_dev: None,
                details: None,
                source_hint: None,
            },
        }
    }

    pub fn user_msg(mut self, msg: impl Into<String>) -> Self {
        self.obj.message_user = msg.into();
        self
    }

    pub fn dev_msg(mut self, msg: impl Into<String>) -> Self {
        self.obj.message_dev = Some(msg.into());
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.obj.details = Some(details);
        self
    }

    pub fn source_hint(mut self, hint: impl Into<String>) -> Self {
        self.obj.source_hint = Some(hint.into());
        self
    }

    pub fn build(self) -> ErrorObj {
        self.obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes;

    #[test]
    fn builder_carries_code_and_messages() {
        let obj = ErrorBuilder::new(codes::VALIDATION_ERROR)
            .user_msg("customer is required")
            .dev_msg("payload.customer missing")
            .build();
        assert_eq!(obj.code.as_str(), "VALIDATION_ERROR");
        assert_eq!(obj.message(), "payload.customer missing");
        assert_eq!(obj.message_user, "customer is required");
    }

    #[test]
    fn source_hint_becomes_wire_details() {
        let obj = ErrorBuilder::new(codes::INTERNAL_ERROR)
            .user_msg("Unexpected error")
            .source_hint("TimeoutError")
            .build();
        let wire = serde_json::to_value(&obj).unwrap();
        assert_eq!(wire["details"]["type"], "TimeoutError");
    }
}
