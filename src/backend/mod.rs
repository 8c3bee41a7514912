pub mod http;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use http::HttpBackend;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Transport(String),
    #[error("backend returned status {code}: {message}")]
    Status { code: u16, message: String },
    #[error("failed to decode backend response: {0}")]
    Decode(String),
}

/// One remote operation, independent of who asked for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendCall {
    pub action_type: String,
    pub target: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl BackendCall {
    pub fn new(action_type: &str, target: &str) -> Self {
        Self {
            action_type: action_type.to_string(),
            target: target.to_string(),
            parameters: Map::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendContext {
    pub principal: String,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl BackendResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn failed(error: &str) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            ..Self::default()
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Reads an identifier field, accepting both string and numeric ids.
    pub fn identifier(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            Value::String(value) if !value.trim().is_empty() => Some(value.clone()),
            Value::Number(value) => Some(value.to_string()),
            _ => None,
        }
    }

    pub fn field_text(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            Value::Null => None,
            Value::String(value) => Some(value.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn fields_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

pub trait Backend: Send + Sync {
    fn execute(
        &self,
        call: &BackendCall,
        context: &BackendContext,
    ) -> Result<BackendResponse, BackendError>;
}
