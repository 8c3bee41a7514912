use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationPrompt {
    pub token: String,
    pub command: String,
    pub summary: String,
    pub expires_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<ConfirmationPrompt>,
}

impl DispatchResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            payload: None,
            error: None,
            confirmation: None,
        }
    }

    /// Failed results always carry a non-empty message and error detail.
    pub fn failure(message: impl Into<String>, error: impl Into<String>) -> Self {
        let message = non_empty(message.into(), "command failed");
        let error = non_empty(error.into(), "no error detail was provided");
        Self {
            success: false,
            message,
            payload: None,
            error: Some(error),
            confirmation: None,
        }
    }

    pub fn proposed(message: impl Into<String>, prompt: ConfirmationPrompt) -> Self {
        Self {
            success: true,
            message: message.into(),
            payload: None,
            error: None,
            confirmation: Some(prompt),
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn is_proposed(&self) -> bool {
        self.confirmation.is_some()
    }
}

fn non_empty(value: String, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_never_has_blank_message_or_error() {
        let result = DispatchResult::failure("  ", "");
        assert!(!result.success);
        assert_eq!(result.message, "command failed");
        assert_eq!(result.error.as_deref(), Some("no error detail was provided"));
    }

    #[test]
    fn serialization_omits_absent_fields() {
        let value = serde_json::to_value(DispatchResult::success("ok")).expect("encode");
        assert_eq!(value, serde_json::json!({"success": true, "message": "ok"}));
    }
}
