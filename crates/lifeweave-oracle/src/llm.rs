//! HTTP transport for plan requests.
//!
//! Both wire formats are asked for the same structured reply, described by
//! [`plan_schema`]. `OpenAI`-compatible APIs receive it as a strict
//! `json_schema` response format. Anthropic receives it as the input schema
//! of a forced [`PLAN_TOOL`] call. Either way the text handed back is the
//! plan JSON, which [`crate::parse`] still validates: not every
//! `OpenAI`-compatible server honours the schema.

use serde_json::{Value, json};
use tracing::debug;

use crate::config::{BackendType, LlmBackendConfig};
use crate::error::LlmOracleError;
use crate::prompt::RenderedPrompt;

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Name of the tool Anthropic models are forced to call with the plan.
pub const PLAN_TOOL: &str = "submit_plan";

/// Sampling temperature for plan requests.
const PLAN_TEMPERATURE: f64 = 0.4;

/// Longest slice of an error body carried into the error message.
const ERROR_BODY_LIMIT: usize = 512;

/// JSON schema of a strategy plan reply.
pub fn plan_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": [
            "description",
            "motivation",
            "strategies",
            "success_condition",
            "failure_condition"
        ],
        "properties": {
            "description": {
                "type": "string",
                "description": "One sentence naming what the character wants."
            },
            "motivation": {
                "type": "array",
                "items": {"type": "string"},
                "description": "Why the character wants it."
            },
            "strategies": {
                "type": "array",
                "items": {"type": "string"},
                "description": "Ordered concrete steps, first step first."
            },
            "success_condition": {
                "type": "string",
                "description": "World state that means the goal is achieved."
            },
            "failure_condition": {
                "type": ["string", "null"],
                "description": "World state that makes the goal impossible, if any."
            }
        }
    })
}

/// One configured LLM endpoint.
#[derive(Debug)]
pub struct LlmBackend {
    client: reqwest::Client,
    wire: BackendType,
    endpoint: String,
    api_key: String,
    model: String,
}

impl LlmBackend {
    /// Build a backend for `config`. The endpoint path is derived from the
    /// wire format.
    pub fn new(config: &LlmBackendConfig) -> Self {
        let base = config.api_url.trim_end_matches('/');
        let endpoint = match config.backend_type {
            BackendType::OpenAi => format!("{base}/chat/completions"),
            BackendType::Anthropic => format!("{base}/messages"),
        };
        Self {
            client: reqwest::Client::new(),
            wire: config.backend_type,
            endpoint,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &'static str {
        match self.wire {
            BackendType::OpenAi => "openai-compatible",
            BackendType::Anthropic => "anthropic",
        }
    }

    /// Request a plan for `prompt` and return the plan JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`LlmOracleError::Backend`] if the call fails, the model
    /// refuses, or the reply carries no plan. Returns
    /// [`LlmOracleError::Parse`] if the reply was cut off at `max_tokens`.
    pub async fn complete(
        &self,
        prompt: &RenderedPrompt,
        max_tokens: u32,
    ) -> Result<String, LlmOracleError> {
        let request = self
            .client
            .post(&self.endpoint)
            .json(&self.request_body(prompt, max_tokens));
        let request = match self.wire {
            BackendType::OpenAi => request.bearer_auth(&self.api_key),
            BackendType::Anthropic => request
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION),
        };

        let response = request
            .send()
            .await
            .map_err(|e| self.failure(&format!("request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("unable to read error body: {e}"));
            let body: String = body.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(self.failure(&format!("returned {status}: {body}")));
        }

        let reply: Value = response
            .json()
            .await
            .map_err(|e| self.failure(&format!("reply is not JSON: {e}")))?;
        debug!(backend = self.name(), model = %self.model, "plan reply received");
        self.extract_plan(&reply)
    }

    fn request_body(&self, prompt: &RenderedPrompt, max_tokens: u32) -> Value {
        match self.wire {
            BackendType::OpenAi => json!({
                "model": self.model,
                "messages": [
                    {"role": "system", "content": prompt.system},
                    {"role": "user", "content": prompt.user}
                ],
                "temperature": PLAN_TEMPERATURE,
                "max_tokens": max_tokens,
                "response_format": {
                    "type": "json_schema",
                    "json_schema": {
                        "name": "strategy_plan",
                        "strict": true,
                        "schema": plan_schema()
                    }
                }
            }),
            BackendType::Anthropic => json!({
                "model": self.model,
                "max_tokens": max_tokens,
                "temperature": PLAN_TEMPERATURE,
                "system": prompt.system,
                "messages": [
                    {"role": "user", "content": prompt.user}
                ],
                "tools": [{
                    "name": PLAN_TOOL,
                    "description": "Submit the character's goal plan.",
                    "input_schema": plan_schema()
                }],
                "tool_choice": {"type": "tool", "name": PLAN_TOOL}
            }),
        }
    }

    fn extract_plan(&self, reply: &Value) -> Result<String, LlmOracleError> {
        match self.wire {
            BackendType::OpenAi => self.extract_openai(reply),
            BackendType::Anthropic => self.extract_anthropic(reply),
        }
    }

    fn extract_openai(&self, reply: &Value) -> Result<String, LlmOracleError> {
        let choice = reply
            .get("choices")
            .and_then(|c| c.get(0))
            .ok_or_else(|| self.failure("reply has no choices"))?;
        if choice.get("finish_reason").and_then(Value::as_str) == Some("length") {
            return Err(truncated());
        }
        let message = choice.get("message");
        if let Some(refusal) = message
            .and_then(|m| m.get("refusal"))
            .and_then(Value::as_str)
        {
            return Err(self.failure(&format!("model refused: {refusal}")));
        }
        message
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .ok_or_else(|| self.failure("reply has no message content"))
    }

    fn extract_anthropic(&self, reply: &Value) -> Result<String, LlmOracleError> {
        if reply.get("stop_reason").and_then(Value::as_str) == Some("max_tokens") {
            return Err(truncated());
        }
        let blocks = reply
            .get("content")
            .and_then(Value::as_array)
            .ok_or_else(|| self.failure("reply has no content"))?;

        let tool_input = blocks.iter().find_map(|b| {
            let is_plan = b.get("type").and_then(Value::as_str) == Some("tool_use")
                && b.get("name").and_then(Value::as_str) == Some(PLAN_TOOL);
            if is_plan { b.get("input") } else { None }
        });
        if let Some(input) = tool_input {
            return Ok(input.to_string());
        }
        blocks
            .iter()
            .find_map(|b| b.get("text").and_then(Value::as_str))
            .map(ToOwned::to_owned)
            .ok_or_else(|| self.failure("reply has neither a plan tool call nor text"))
    }

    fn failure(&self, detail: &str) -> LlmOracleError {
        LlmOracleError::Backend(format!("{} {detail}", self.name()))
    }
}

fn truncated() -> LlmOracleError {
    LlmOracleError::Parse(String::from("reply cut off at max_tokens"))
}
