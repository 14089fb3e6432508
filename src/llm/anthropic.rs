//! Anthropic Messages API client
//!
//! The internal types already follow the Messages API, so requests are built
//! directly from them.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::provider::{http_client, GenerationSettings, LlmProvider};
use super::types::{
    ContentBlock, Message, MessageResponse, StopReason, ToolChoice, ToolDefinition, Usage,
};

const DEFAULT_API_BASE: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-haiku-4-5";

#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "<[ToolDefinition]>::is_empty")]
    tools: &'a [ToolDefinition],
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

/// Wire response; unknown block types (thinking, server tools) are dropped
#[derive(Debug, Deserialize)]
struct WireResponse {
    id: String,
    model: String,
    content: Vec<serde_json::Value>,
    stop_reason: Option<StopReason>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetails,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetails {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

/// Anthropic LLM provider
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    settings: GenerationSettings,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider with an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_ANTHROPIC_MODEL.to_string(),
            settings: GenerationSettings::default(),
        }
    }

    /// Set the model to use
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Bound every request to the API
    pub fn with_request_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = http_client(timeout)?;
        Ok(self)
    }

    /// Set sampling settings
    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Override the API base URL
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    fn convert_response(wire: WireResponse) -> MessageResponse {
        let content = wire
            .content
            .into_iter()
            .filter_map(|block| serde_json::from_value::<ContentBlock>(block).ok())
            .collect();
        MessageResponse {
            id: wire.id,
            content,
            model: wire.model,
            stop_reason: wire.stop_reason,
            usage: wire.usage,
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    async fn send_with_tools_and_system(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        tools: Vec<ToolDefinition>,
        tool_choice: Option<ToolChoice>,
    ) -> Result<MessageResponse> {
        let request = MessageRequest {
            model: &self.model,
            max_tokens: self.settings.max_output_tokens,
            temperature: self.settings.temperature,
            messages: &messages,
            system,
            tools: &tools,
            tool_choice: if tools.is_empty() { None } else { tool_choice },
        };

        tracing::debug!(
            "[Anthropic] Sending {} message(s) with {} tool(s) to {}",
            messages.len(),
            tools.len(),
            self.model
        );

        let response = self
            .client
            .post(format!("{}/messages", self.api_base.trim_end_matches('/')))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Anthropic API")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read Anthropic response body")?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ApiError>(&body)
                .map(|e| format!("{}: {}", e.error.error_type, e.error.message))
                .unwrap_or(body);
            tracing::error!("[Anthropic] API error: {} - {}", status, detail);
            anyhow::bail!("Anthropic API error ({}): {}", status, detail);
        }

        let wire: WireResponse =
            serde_json::from_str(&body).context("Failed to parse Anthropic API response")?;
        Ok(Self::convert_response(wire))
    }

    fn model(&self) -> String {
        self.model.clone()
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_omits_empty_tools() {
        let messages = vec![Message::user("hi")];
        let request = MessageRequest {
            model: DEFAULT_ANTHROPIC_MODEL,
            max_tokens: 1024,
            temperature: 0.2,
            messages: &messages,
            system: None,
            tools: &[],
            tool_choice: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("tools").is_none());
        assert!(json.get("system").is_none());
        assert_eq!(json["messages"][0]["content"], "hi");
    }

    #[test]
    fn test_convert_response_drops_unknown_blocks() {
        let wire: WireResponse = serde_json::from_value(json!({
            "id": "msg_01",
            "model": "claude-haiku-4-5",
            "content": [
                {"type": "thinking", "thinking": "...", "signature": "x"},
                {"type": "text", "text": "There are 2 agents in Lima."}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 8}
        }))
        .unwrap();

        let response = AnthropicProvider::convert_response(wire);
        assert_eq!(response.content.len(), 1);
        assert_eq!(response.text(), "There are 2 agents in Lima.");
        assert_eq!(response.stop_reason, Some(StopReason::EndTurn));
    }

    #[test]
    fn test_convert_response_with_new_stop_reason() {
        let wire: WireResponse = serde_json::from_value(json!({
            "id": "msg_02",
            "model": "claude-haiku-4-5",
            "content": [{"type": "text", "text": "Still working."}],
            "stop_reason": "pause_turn",
            "usage": {"input_tokens": 4, "output_tokens": 2}
        }))
        .unwrap();

        let response = AnthropicProvider::convert_response(wire);
        assert_eq!(response.stop_reason, Some(StopReason::Unknown));
        assert_eq!(response.text(), "Still working.");
    }
}
