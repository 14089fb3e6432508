//! Gemini client for both the Gemini API and Vertex AI
//!
//! Translates between the crate's internal message types (Anthropic format)
//! and the `generateContent` wire format, which both endpoints share.
//!
//! # Authentication
//!
//! - Gemini API: `x-goog-api-key` header (`GEMINI_API_KEY`)
//! - Vertex AI: `Authorization: Bearer` header (`VERTEX_ACCESS_TOKEN`), with the
//!   project and location encoded in the URL

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use super::provider::{http_client, GenerationSettings, LlmProvider};
use super::types::{
    ContentBlock, Message, MessageContent, MessageResponse, StopReason, ToolChoice,
    ToolDefinition, Usage,
};

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-pro";

// ============================================================================
// Gemini-specific request/response types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_config: Option<GeminiToolConfig>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    role: String,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<GeminiFunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<GeminiFunctionResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiFunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiFunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<GeminiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct GeminiFunctionDeclaration {
    name: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiToolConfig {
    function_calling_config: GeminiFunctionCallingConfig,
}

#[derive(Debug, Serialize)]
struct GeminiFunctionCallingConfig {
    mode: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    usage_metadata: Option<GeminiUsageMetadata>,
    model_version: Option<String>,
    response_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

// ============================================================================
// GeminiProvider
// ============================================================================

/// Where requests go and how they authenticate
#[derive(Debug, Clone)]
pub enum GeminiEndpoint {
    /// Public Gemini API with an API key
    ApiKey { api_key: String, api_base: String },
    /// Vertex AI publisher model with an OAuth bearer token
    Vertex {
        project_id: String,
        location: String,
        access_token: String,
        api_base: Option<String>,
    },
}

/// Google Gemini provider
///
/// All internal types follow Anthropic's format; translation happens at the
/// boundary.
pub struct GeminiProvider {
    client: Client,
    endpoint: GeminiEndpoint,
    model: String,
    settings: GenerationSettings,
}

impl GeminiProvider {
    /// Gemini API provider with an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: GeminiEndpoint::ApiKey {
                api_key: api_key.into(),
                api_base: DEFAULT_API_BASE.to_string(),
            },
            model: DEFAULT_GEMINI_MODEL.to_string(),
            settings: GenerationSettings::default(),
        }
    }

    /// Vertex AI provider for a project and location
    pub fn vertex(
        project_id: impl Into<String>,
        location: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            endpoint: GeminiEndpoint::Vertex {
                project_id: project_id.into(),
                location: location.into(),
                access_token: access_token.into(),
                api_base: None,
            },
            model: DEFAULT_GEMINI_MODEL.to_string(),
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

    /// Override the API base URL (proxies, regional endpoints)
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        let base = base.into();
        match &mut self.endpoint {
            GeminiEndpoint::ApiKey { api_base, .. } => *api_base = base,
            GeminiEndpoint::Vertex { api_base, .. } => *api_base = Some(base),
        }
        self
    }

    fn generate_url(&self) -> String {
        match &self.endpoint {
            GeminiEndpoint::ApiKey { api_base, .. } => format!(
                "{}/models/{}:generateContent",
                api_base.trim_end_matches('/'),
                self.model
            ),
            GeminiEndpoint::Vertex {
                project_id,
                location,
                api_base,
                ..
            } => {
                let base = api_base
                    .clone()
                    .unwrap_or_else(|| format!("https://{}-aiplatform.googleapis.com/v1", location));
                format!(
                    "{}/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
                    base.trim_end_matches('/'),
                    project_id,
                    location,
                    self.model
                )
            }
        }
    }

    // ========================================================================
    // Format conversion: Internal (Anthropic) -> Gemini
    // ========================================================================

    /// Convert internal messages to Gemini contents.
    ///
    /// Tool results only carry the tool-use id, while Gemini wants the function
    /// name, so names are resolved across the whole conversation.
    fn convert_messages(messages: &[Message]) -> Vec<GeminiContent> {
        let tool_names: HashMap<&str, &str> = messages
            .iter()
            .filter_map(|m| m.blocks())
            .flatten()
            .filter_map(|b| b.as_tool_use().map(|(id, name, _)| (id, name)))
            .collect();

        let mut contents: Vec<GeminiContent> = Vec::new();
        for msg in messages {
            let role = if msg.role == "assistant" { "model" } else { "user" };
            let parts = Self::convert_content_to_parts(&msg.content, &tool_names);
            if parts.is_empty() {
                continue;
            }

            // Function responses always travel in a user turn
            let (responses, others): (Vec<_>, Vec<_>) = parts
                .into_iter()
                .partition(|p| p.function_response.is_some());
            if !others.is_empty() {
                contents.push(GeminiContent {
                    role: role.to_string(),
                    parts: others,
                });
            }
            if !responses.is_empty() {
                contents.push(GeminiContent {
                    role: "user".to_string(),
                    parts: responses,
                });
            }
        }

        Self::merge_consecutive_roles(contents)
    }

    /// Merge consecutive contents with the same role (Gemini requires alternation)
    fn merge_consecutive_roles(contents: Vec<GeminiContent>) -> Vec<GeminiContent> {
        let mut merged: Vec<GeminiContent> = Vec::new();
        for content in contents {
            if let Some(last) = merged.last_mut() {
                if last.role == content.role {
                    last.parts.extend(content.parts);
                    continue;
                }
            }
            merged.push(content);
        }
        merged
    }

    fn convert_content_to_parts(
        content: &MessageContent,
        tool_names: &HashMap<&str, &str>,
    ) -> Vec<GeminiPart> {
        let blocks = match content {
            MessageContent::Text(text) => {
                return vec![GeminiPart {
                    text: Some(text.clone()),
                    ..Default::default()
                }]
            }
            MessageContent::Blocks(blocks) => blocks,
        };

        blocks
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } if text.is_empty() => None,
                ContentBlock::Text { text } => Some(GeminiPart {
                    text: Some(text.clone()),
                    ..Default::default()
                }),
                ContentBlock::ToolUse { name, input, .. } => Some(GeminiPart {
                    function_call: Some(GeminiFunctionCall {
                        name: name.clone(),
                        args: input.clone(),
                    }),
                    ..Default::default()
                }),
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                } => {
                    let name = tool_names
                        .get(tool_use_id.as_str())
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| tool_use_id.clone());
                    let output = content.clone().unwrap_or_else(|| "No output".to_string());
                    let response = if is_error.unwrap_or(false) {
                        serde_json::json!({ "error": output })
                    } else {
                        serde_json::json!({ "result": output })
                    };
                    Some(GeminiPart {
                        function_response: Some(GeminiFunctionResponse { name, response }),
                        ..Default::default()
                    })
                }
            })
            .collect()
    }

    fn convert_tools(tools: &[ToolDefinition]) -> Option<Vec<GeminiTool>> {
        if tools.is_empty() {
            return None;
        }
        let declarations = tools
            .iter()
            .map(|tool| GeminiFunctionDeclaration {
                name: tool.name.clone(),
                description: tool.description.clone().unwrap_or_default(),
                // Gemini rejects an object schema with no properties
                parameters: tool
                    .input_schema
                    .properties
                    .as_ref()
                    .filter(|props| props.as_object().map_or(true, |map| !map.is_empty()))
                    .map(|_| Self::clean_schema_for_gemini(&tool.input_schema.to_json())),
            })
            .collect();
        Some(vec![GeminiTool {
            function_declarations: declarations,
        }])
    }

    /// Strip JSON Schema keywords Gemini function declarations reject
    fn clean_schema_for_gemini(value: &Value) -> Value {
        const UNSUPPORTED_FIELDS: &[&str] = &[
            "additionalProperties",
            "$schema",
            "definitions",
            "$ref",
            "default",
        ];

        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .filter(|(key, _)| !UNSUPPORTED_FIELDS.contains(&key.as_str()))
                    .map(|(key, val)| (key.clone(), Self::clean_schema_for_gemini(val)))
                    .collect(),
            ),
            Value::Array(arr) => Value::Array(arr.iter().map(Self::clean_schema_for_gemini).collect()),
            other => other.clone(),
        }
    }

    fn convert_tool_config(tool_choice: &Option<ToolChoice>) -> GeminiToolConfig {
        let mode = match tool_choice {
            Some(ToolChoice::Auto) | None => "AUTO",
            Some(ToolChoice::Any) => "ANY",
            Some(ToolChoice::None) => "NONE",
        };
        GeminiToolConfig {
            function_calling_config: GeminiFunctionCallingConfig {
                mode: mode.to_string(),
            },
        }
    }

    fn build_request(
        &self,
        messages: &[Message],
        system: Option<String>,
        tools: &[ToolDefinition],
        tool_choice: &Option<ToolChoice>,
    ) -> GeminiRequest {
        let tools = Self::convert_tools(tools);
        let tool_config = tools.as_ref().map(|_| Self::convert_tool_config(tool_choice));
        GeminiRequest {
            contents: Self::convert_messages(messages),
            system_instruction: system.map(|text| GeminiSystemInstruction {
                parts: vec![GeminiPart {
                    text: Some(text),
                    ..Default::default()
                }],
            }),
            tools,
            tool_config,
            generation_config: GeminiGenerationConfig {
                max_output_tokens: self.settings.max_output_tokens,
                temperature: self.settings.temperature,
            },
        }
    }

    // ========================================================================
    // Format conversion: Gemini -> Internal (Anthropic)
    // ========================================================================

    fn convert_response(&self, gemini_resp: GeminiResponse) -> Result<MessageResponse> {
        let candidate = gemini_resp
            .candidates
            .as_ref()
            .and_then(|c| c.first())
            .context("No candidates in Gemini response")?;

        let parts = candidate
            .content
            .as_ref()
            .map(|c| c.parts.as_slice())
            .unwrap_or(&[]);

        let mut content = Vec::new();
        let mut tool_call_counter: u32 = 0;
        for part in parts {
            if let Some(text) = &part.text {
                // Thought summaries are not part of the answer
                if part.thought != Some(true) && !text.is_empty() {
                    content.push(ContentBlock::text(text.clone()));
                }
            }
            if let Some(fc) = &part.function_call {
                tool_call_counter += 1;
                // Gemini has no call ids; ids must stay unique across the whole loop
                content.push(ContentBlock::tool_use(
                    format!("gemini_{}", uuid::Uuid::new_v4().simple()),
                    fc.name.clone(),
                    fc.args.clone(),
                ));
            }
        }

        let stop_reason = if tool_call_counter > 0 {
            Some(StopReason::ToolUse)
        } else {
            candidate.finish_reason.as_deref().map(|r| match r {
                "MAX_TOKENS" => StopReason::MaxTokens,
                "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" => StopReason::Refusal,
                _ => StopReason::EndTurn,
            })
        };

        let usage = gemini_resp
            .usage_metadata
            .map(|u| Usage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
            })
            .unwrap_or_default();

        Ok(MessageResponse {
            id: gemini_resp
                .response_id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            content,
            model: gemini_resp.model_version.unwrap_or_else(|| self.model.clone()),
            stop_reason,
            usage,
        })
    }

    async fn send_gemini_request(&self, request: &GeminiRequest) -> Result<GeminiResponse> {
        let url = self.generate_url();
        let request_json =
            serde_json::to_string(request).context("Failed to serialize Gemini request")?;
        tracing::debug!("[Gemini] Request JSON: {}", request_json);

        let builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json");
        let builder = match &self.endpoint {
            GeminiEndpoint::ApiKey { api_key, .. } => builder.header("x-goog-api-key", api_key),
            GeminiEndpoint::Vertex { access_token, .. } => builder.bearer_auth(access_token),
        };

        let response = builder
            .body(request_json)
            .send()
            .await
            .context("Failed to send request to Gemini API")?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .context("Failed to read Gemini response body")?;
        tracing::debug!("[Gemini] Response status: {}", status);

        if !status.is_success() {
            tracing::error!("[Gemini] API error: {} - {}", status, response_text);
            anyhow::bail!("Gemini API error ({}): {}", status, response_text);
        }

        serde_json::from_str(&response_text).context("Failed to parse Gemini API response")
    }
}

#[async_trait::async_trait]
impl LlmProvider for GeminiProvider {
    async fn send_with_tools_and_system(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        tools: Vec<ToolDefinition>,
        tool_choice: Option<ToolChoice>,
    ) -> Result<MessageResponse> {
        let request = self.build_request(&messages, system, &tools, &tool_choice);
        let response = self.send_gemini_request(&request).await?;
        self.convert_response(response)
    }

    fn model(&self) -> String {
        self.model.clone()
    }

    fn provider_name(&self) -> &str {
        match self.endpoint {
            GeminiEndpoint::ApiKey { .. } => "gemini",
            GeminiEndpoint::Vertex { .. } => "vertexai",
        }
    }
}
