//! Anthropic Messages API provider
//!
//! Implementation of `LlmProvider` over `POST /v1/messages`. The workspace
//! content model already uses the Messages API block shapes, so requests are
//! mostly a re-serialisation of the conversation.

use std::fmt;
use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::{ContentUnit, Message, Role},
    provider::{Completion, FinishReason, GenerationOptions, LlmProvider, TokenUsage},
    tool::ToolDescriptor,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Longest slice of an error body kept in error messages
const ERROR_BODY_LIMIT: usize = 200;

/// Anthropic provider configuration
#[derive(Clone)]
pub struct AnthropicConfig {
    pub api_key: String,

    /// API root, without the `/v1/messages` suffix
    pub base_url: String,

    /// Per-request timeout
    pub timeout: Duration,
}

impl fmt::Debug for AnthropicConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl AnthropicConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.into(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Read `ANTHROPIC_API_KEY`, `ANTHROPIC_BASE_URL` and `ANTHROPIC_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AgentError::Config("ANTHROPIC_API_KEY is not set".into()))?;

        let mut config = Self::new(api_key);

        if let Ok(base_url) = std::env::var("ANTHROPIC_BASE_URL") {
            config.base_url = base_url;
        }

        if let Ok(raw) = std::env::var("ANTHROPIC_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                AgentError::Config(format!("ANTHROPIC_TIMEOUT_SECS is not a number: '{}'", raw))
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

/// Anthropic LLM provider
pub struct AnthropicProvider {
    http: reqwest::Client,
    config: AnthropicConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AgentError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(AnthropicConfig::from_env()?)
    }

    pub fn config(&self) -> &AnthropicConfig {
        &self.config
    }

    /// Build the JSON request body
    fn build_request_body(
        messages: &[Message],
        tools: &[ToolDescriptor],
        options: &GenerationOptions,
    ) -> Value {
        let mut body = json!({
            "model": options.model,
            "max_tokens": options.max_tokens,
            "messages": messages.iter().map(wire_message).collect::<Vec<_>>(),
        });

        if !tools.is_empty() {
            body["tools"] = tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.input_schema,
                    })
                })
                .collect();
        }

        if let Some(system) = &options.system_prompt {
            body["system"] = json!(system);
        }

        if let Some(temperature) = options.temperature {
            body["temperature"] = json!(temperature);
        }

        body
    }

    /// Decode a successful response body
    fn parse_response(body: Value, requested_model: &str) -> Result<Completion> {
        let response: MessagesResponse = serde_json::from_value(body)
            .map_err(|e| AgentError::ReasoningEngine(format!("unexpected response: {}", e)))?;

        if response.role.as_deref().is_some_and(|r| r != "assistant") {
            return Err(AgentError::ReasoningEngine(format!(
                "response role is '{}', expected 'assistant'",
                response.role.unwrap_or_default()
            )));
        }

        let message = Message::from_value(json!({
            "role": Role::Assistant,
            "content": response.content,
        }))
        .map_err(|e| AgentError::ReasoningEngine(format!("malformed response content: {}", e)))?;

        Ok(Completion {
            message,
            model: response.model.unwrap_or_else(|| requested_model.to_string()),
            usage: response.usage.map(|u| TokenUsage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
            }),
            finish_reason: response.stop_reason.as_deref().and_then(finish_reason),
        })
    }
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    role: Option<String>,
    content: Value,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<UsageBlock>,
}

#[derive(Deserialize)]
struct UsageBlock {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

fn finish_reason(reason: &str) -> Option<FinishReason> {
    match reason {
        "end_turn" => Some(FinishReason::EndTurn),
        "max_tokens" => Some(FinishReason::MaxTokens),
        "stop_sequence" => Some(FinishReason::StopSequence),
        "tool_use" => Some(FinishReason::ToolUse),
        _ => None,
    }
}

/// Serialise a message for the API
///
/// `tool_result` content must be a string or a list of content blocks, so
/// structured tool output is normalised into text blocks.
fn wire_message(message: &Message) -> Value {
    let content: Vec<Value> = message
        .content
        .iter()
        .map(|unit| match unit {
            ContentUnit::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => {
                let mut block = json!({
                    "type": "tool_result",
                    "tool_use_id": tool_use_id,
                    "content": wire_tool_content(content),
                });
                if *is_error {
                    block["is_error"] = json!(true);
                }
                block
            }
            other => serde_json::to_value(other).unwrap_or(Value::Null),
        })
        .collect();

    json!({ "role": message.role, "content": content })
}

fn wire_tool_content(content: &Value) -> Value {
    match content {
        Value::String(_) => content.clone(),
        Value::Array(blocks) => Value::Array(
            blocks
                .iter()
                .map(|block| match block.get("type").and_then(Value::as_str) {
                    Some("text") => {
                        let text = block["text"].as_str().unwrap_or_default();
                        json!({"type": "text", "text": text})
                    }
                    _ => json!({"type": "text", "text": block.to_string()}),
                })
                .collect(),
        ),
        Value::Null => Value::String(String::new()),
        other => Value::String(other.to_string()),
    }
}

fn truncate(text: &str) -> String {
    text.chars().take(ERROR_BODY_LIMIT).collect()
}

fn status_error(status: StatusCode, body: &str) -> AgentError {
    let detail = format!("HTTP {}: {}", status, truncate(body));
    match status {
        StatusCode::TOO_MANY_REQUESTS => AgentError::RateLimited(detail),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AgentError::Auth(detail),
        _ => AgentError::ReasoningEngine(detail),
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(!self.config.api_key.trim().is_empty())
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let body = Self::build_request_body(messages, tools, options);

        tracing::debug!(
            model = %options.model,
            messages = messages.len(),
            tools = tools.len(),
            "Anthropic request"
        );

        let response = self
            .http
            .post(self.config.messages_url())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::ReasoningEngine(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::warn!(%status, "Anthropic request rejected");
            return Err(status_error(status, &text));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| AgentError::ReasoningEngine(format!("unreadable response: {}", e)))?;

        let completion = Self::parse_response(json, &options.model)?;
        if completion.truncated() {
            tracing::warn!(max_tokens = options.max_tokens, "Response truncated by max_tokens");
        }
        Ok(completion)
    }
}
