//! OpenAI-compatible chat completions client
//!
//! Works against api.openai.com or any endpoint exposing
//! `POST {base}/chat/completions` with function calling.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::provider::{http_client, GenerationSettings, LlmProvider};
use super::types::{
    ContentBlock, Message, MessageContent, MessageResponse, StopReason, ToolChoice,
    ToolDefinition, Usage,
};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

// OpenAI-compatible API types
#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage>,
    max_completion_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OpenAiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct OpenAiTool {
    #[serde(rename = "type")]
    type_: &'static str,
    function: OpenAiFunction,
}

#[derive(Debug, Serialize)]
struct OpenAiFunction {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    parameters: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl OpenAiMessage {
    fn text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiToolCall {
    id: String,
    #[serde(rename = "type")]
    type_: String,
    function: OpenAiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiToolFunction {
    name: String,
    /// JSON-encoded arguments
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// OpenAI chat completions provider
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    settings: GenerationSettings,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            settings: GenerationSettings::default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Bound every request to the API
    pub fn with_request_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = http_client(timeout)?;
        Ok(self)
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Flatten internal messages into chat completion messages.
    ///
    /// Tool results become `tool` role messages; an assistant's text and tool
    /// calls share one message.
    fn convert_messages(system: Option<String>, messages: &[Message]) -> Vec<OpenAiMessage> {
        let mut out = Vec::with_capacity(messages.len() + 1);
        if let Some(system) = system {
            out.push(OpenAiMessage::text("system", system));
        }

        for msg in messages {
            let blocks = match &msg.content {
                MessageContent::Text(text) => {
                    out.push(OpenAiMessage::text(&msg.role, text.as_str()));
                    continue;
                }
                MessageContent::Blocks(blocks) => blocks,
            };

            let mut text = String::new();
            let mut tool_calls = Vec::new();
            for block in blocks {
                match block {
                    ContentBlock::Text { text: t } => text.push_str(t),
                    ContentBlock::ToolUse { id, name, input } => tool_calls.push(OpenAiToolCall {
                        id: id.clone(),
                        type_: "function".to_string(),
                        function: OpenAiToolFunction {
                            name: name.clone(),
                            arguments: input.to_string(),
                        },
                    }),
                    ContentBlock::ToolResult {
                        tool_use_id,
                        content,
                        is_error,
                    } => {
                        let body = content.clone().unwrap_or_default();
                        let body = if is_error.unwrap_or(false) {
                            format!("Error: {}", body)
                        } else {
                            body
                        };
                        out.push(OpenAiMessage {
                            role: "tool".to_string(),
                            content: Some(body),
                            tool_calls: None,
                            tool_call_id: Some(tool_use_id.clone()),
                        });
                    }
                }
            }

            if !text.is_empty() || !tool_calls.is_empty() {
                out.push(OpenAiMessage {
                    role: msg.role.clone(),
                    content: if text.is_empty() { None } else { Some(text) },
                    tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
                    tool_call_id: None,
                });
            }
        }
        out
    }

    fn convert_tools(tools: &[ToolDefinition]) -> Vec<OpenAiTool> {
        tools
            .iter()
            .map(|tool| OpenAiTool {
                type_: "function",
                function: OpenAiFunction {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.input_schema.to_json(),
                },
            })
            .collect()
    }

    fn convert_response(&self, response: OpenAiResponse) -> Result<MessageResponse> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .context("No choices in OpenAI response")?;

        let mut content = Vec::new();
        if let Some(text) = choice.message.content.filter(|t| !t.is_empty()) {
            content.push(ContentBlock::text(text));
        }
        for call in choice.message.tool_calls.unwrap_or_default() {
            // Malformed arguments are passed through so the tool can report them
            let input = serde_json::from_str(&call.function.arguments)
                .unwrap_or(Value::String(call.function.arguments));
            content.push(ContentBlock::tool_use(call.id, call.function.name, input));
        }

        let stop_reason = match choice.finish_reason.as_deref() {
            Some("tool_calls") => Some(StopReason::ToolUse),
            Some("length") => Some(StopReason::MaxTokens),
            Some("content_filter") => Some(StopReason::Refusal),
            Some(_) => Some(StopReason::EndTurn),
            None => None,
        };

        Ok(MessageResponse {
            id: if response.id.is_empty() {
                uuid::Uuid::new_v4().to_string()
            } else {
                response.id
            },
            content,
            model: if response.model.is_empty() {
                self.model.clone()
            } else {
                response.model
            },
            stop_reason,
            usage: response
                .usage
                .map(|u| Usage {
                    input_tokens: u.prompt_tokens,
                    output_tokens: u.completion_tokens,
                })
                .unwrap_or_default(),
        })
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    async fn send_with_tools_and_system(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        tools: Vec<ToolDefinition>,
        tool_choice: Option<ToolChoice>,
    ) -> Result<MessageResponse> {
        let tools = Self::convert_tools(&tools);
        let tool_choice = if tools.is_empty() {
            None
        } else {
            Some(match tool_choice {
                Some(ToolChoice::Any) => "required",
                Some(ToolChoice::None) => "none",
                Some(ToolChoice::Auto) | None => "auto",
            })
        };
        let body = OpenAiRequest {
            model: &self.model,
            messages: Self::convert_messages(system, &messages),
            max_completion_tokens: self.settings.max_output_tokens,
            temperature: self.settings.temperature,
            tools,
            tool_choice,
        };

        let url = format!("{}/chat/completions", self.api_base.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to send request to OpenAI API")?;

        match response.status() {
            StatusCode::OK => {
                let text = response
                    .text()
                    .await
                    .context("Failed to read OpenAI response text")?;
                let parsed: OpenAiResponse =
                    serde_json::from_str(&text).context("Failed to parse OpenAI response")?;
                self.convert_response(parsed)
            }
            StatusCode::UNAUTHORIZED => {
                anyhow::bail!("Authentication failed. Check your API key.");
            }
            StatusCode::TOO_MANY_REQUESTS => {
                anyhow::bail!("Rate limit exceeded. Please try again later.");
            }
            status => {
                let error_body: Option<Value> = response.json().await.ok();
                let error_msg = error_body
                    .as_ref()
                    .and_then(|v| v.get("error").and_then(|e| e.get("message")))
                    .and_then(|v| v.as_str())
                    .unwrap_or("Unknown error");
                tracing::error!("[OpenAI] API error: {} - {}", status, error_msg);
                anyhow::bail!("OpenAI API request failed ({}): {}", status, error_msg);
            }
        }
    }

    fn model(&self) -> String {
        self.model.clone()
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}
