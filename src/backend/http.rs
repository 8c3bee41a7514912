use super::{Backend, BackendCall, BackendContext, BackendError, BackendResponse};
use crate::config::BackendConfig;
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;

const ACTIONS_PATH: &str = "api/v1/actions";

#[derive(Debug, Clone)]
pub struct HttpBackend {
    agent: ureq::Agent,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Serialize)]
struct ActionRequestBody<'a> {
    target: &'a str,
    parameters: &'a Map<String, Value>,
    principal: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    idempotency_key: Option<&'a str>,
}

impl HttpBackend {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn from_config(config: &BackendConfig, token: Option<String>) -> Self {
        Self::new(
            &config.base_url,
            token,
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn endpoint(&self, action_type: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            ACTIONS_PATH,
            urlencoding::encode(action_type)
        )
    }
}

impl Backend for HttpBackend {
    fn execute(
        &self,
        call: &BackendCall,
        context: &BackendContext,
    ) -> Result<BackendResponse, BackendError> {
        let body = ActionRequestBody {
            target: &call.target,
            parameters: &call.parameters,
            principal: &context.principal,
            idempotency_key: context.idempotency_key.as_deref(),
        };
        let payload =
            serde_json::to_value(&body).map_err(|e| BackendError::Decode(e.to_string()))?;

        let mut request = self.agent.post(&self.endpoint(&call.action_type));
        if let Some(token) = &self.token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }
        if let Some(key) = &context.idempotency_key {
            request = request.set("Idempotency-Key", key);
        }

        tracing::debug!(
            action = %call.action_type,
            target = %call.target,
            principal = %context.principal,
            "calling backend"
        );
        match request.send_json(payload) {
            Ok(response) => response
                .into_json::<BackendResponse>()
                .map_err(|e| BackendError::Decode(e.to_string())),
            Err(ureq::Error::Status(code, response)) => {
                let raw = response.into_string().unwrap_or_default();
                Err(BackendError::Status {
                    code,
                    message: status_message(&raw),
                })
            }
            Err(ureq::Error::Transport(err)) => Err(BackendError::Transport(err.to_string())),
        }
    }
}

fn status_message(raw: &str) -> String {
    let from_json = serde_json::from_str::<Value>(raw).ok().and_then(|value| {
        ["error", "message", "detail"]
            .iter()
            .find_map(|key| value.get(*key).and_then(Value::as_str).map(str::to_string))
    });
    from_json
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                "no response body".to_string()
            } else {
                trimmed.chars().take(200).collect()
            }
        })
}
