//! LLM Provider trait
//!
//! Abstracts the model interface so that Vertex AI, Gemini, Anthropic, OpenAI
//! or the scripted development provider can drive the SQL planner
//! interchangeably.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;

use super::types::{Message, MessageResponse, ToolChoice, ToolDefinition};

/// Sampling settings shared by every provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSettings {
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_output_tokens: 1024,
            temperature: 0.2,
        }
    }
}

/// Default bound on one HTTP request to a model API
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP client whose requests fail once `timeout` has elapsed
pub fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

/// Trait for model backends used by the planner.
///
/// All providers work with the same internal message types (which follow
/// Anthropic's format). Providers with a different wire format translate
/// internally.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a request with tools and a system instruction, returning the
    /// full response.
    async fn send_with_tools_and_system(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        tools: Vec<ToolDefinition>,
        tool_choice: Option<ToolChoice>,
    ) -> Result<MessageResponse>;

    /// Get the current model name.
    fn model(&self) -> String;

    /// Get the provider name (e.g. "vertexai", "anthropic").
    fn provider_name(&self) -> &str;
}
