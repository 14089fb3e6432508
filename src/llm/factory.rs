//! Provider selection from configuration

use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;

use super::anthropic::{AnthropicProvider, DEFAULT_ANTHROPIC_MODEL};
use super::gemini::{GeminiProvider, DEFAULT_GEMINI_MODEL};
use super::openai::{OpenAiProvider, DEFAULT_OPENAI_MODEL};
use super::provider::{GenerationSettings, LlmProvider, DEFAULT_REQUEST_TIMEOUT};
use super::scripted::ScriptedProvider;
use crate::core::{AgentError, AgentResult};

/// Supported model backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    /// Gemini on Vertex AI (bearer token)
    #[value(name = "vertexai", alias = "vertex")]
    VertexAi,
    /// Gemini API (API key)
    Gemini,
    Anthropic,
    Openai,
    /// Scripted development provider, no network
    #[value(alias = "none")]
    Fake,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::VertexAi => "vertexai",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Openai => "openai",
            ProviderKind::Fake => "fake",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::VertexAi | ProviderKind::Gemini => DEFAULT_GEMINI_MODEL,
            ProviderKind::Anthropic => DEFAULT_ANTHROPIC_MODEL,
            ProviderKind::Openai => DEFAULT_OPENAI_MODEL,
            ProviderKind::Fake => "scripted",
        }
    }
}

/// Everything needed to construct a provider
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    /// Model name; the provider default when unset
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub vertex_project_id: Option<String>,
    pub vertex_location: String,
    pub vertex_access_token: Option<String>,
    /// Override of the provider base URL
    pub base_url: Option<String>,
    pub generation: GenerationSettings,
    /// Bound on one HTTP request to the provider
    pub request_timeout: Duration,
}

impl ProviderSettings {
    /// Settings for the scripted provider
    pub fn fake() -> Self {
        Self {
            kind: ProviderKind::Fake,
            model: None,
            api_key: None,
            vertex_project_id: None,
            vertex_location: "us-central1".to_string(),
            vertex_access_token: None,
            base_url: None,
            generation: GenerationSettings::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Model that will be used
    pub fn model_name(&self) -> String {
        self.model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.kind.default_model().to_string())
    }
}

fn required(value: &Option<String>, name: &str, kind: ProviderKind) -> AgentResult<String> {
    value
        .clone()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| {
            AgentError::InvalidConfig(format!(
                "{} is required when MODEL_PROVIDER={}",
                name,
                kind.as_str()
            ))
        })
}

fn client_error(err: anyhow::Error) -> AgentError {
    AgentError::InvalidConfig(format!("{:#}", err))
}

/// Build the configured provider. Missing credentials fail here, at startup.
pub fn build_provider(settings: &ProviderSettings) -> AgentResult<Arc<dyn LlmProvider>> {
    let model = settings.model_name();
    let provider: Arc<dyn LlmProvider> = match settings.kind {
        ProviderKind::VertexAi => {
            let project = required(&settings.vertex_project_id, "VERTEX_PROJECT_ID", settings.kind)?;
            let token = required(&settings.vertex_access_token, "VERTEX_ACCESS_TOKEN", settings.kind)?;
            let mut provider = GeminiProvider::vertex(project, &settings.vertex_location, token)
                .with_model(&model)
                .with_settings(settings.generation)
                .with_request_timeout(settings.request_timeout)
                .map_err(client_error)?;
            if let Some(base) = &settings.base_url {
                provider = provider.with_api_base(base);
            }
            Arc::new(provider)
        }
        ProviderKind::Gemini => {
            let key = required(&settings.api_key, "GEMINI_API_KEY", settings.kind)?;
            let mut provider = GeminiProvider::new(key)
                .with_model(&model)
                .with_settings(settings.generation)
                .with_request_timeout(settings.request_timeout)
                .map_err(client_error)?;
            if let Some(base) = &settings.base_url {
                provider = provider.with_api_base(base);
            }
            Arc::new(provider)
        }
        ProviderKind::Anthropic => {
            let key = required(&settings.api_key, "ANTHROPIC_API_KEY", settings.kind)?;
            let mut provider = AnthropicProvider::new(key)
                .with_model(&model)
                .with_settings(settings.generation)
                .with_request_timeout(settings.request_timeout)
                .map_err(client_error)?;
            if let Some(base) = &settings.base_url {
                provider = provider.with_api_base(base);
            }
            Arc::new(provider)
        }
        ProviderKind::Openai => {
            let key = required(&settings.api_key, "OPENAI_API_KEY", settings.kind)?;
            let mut provider = OpenAiProvider::new(key)
                .with_model(&model)
                .with_settings(settings.generation)
                .with_request_timeout(settings.request_timeout)
                .map_err(client_error)?;
            if let Some(base) = &settings.base_url {
                provider = provider.with_api_base(base);
            }
            Arc::new(provider)
        }
        ProviderKind::Fake => Arc::new(ScriptedProvider::new()),
    };

    tracing::info!(
        "[LLM] Using provider {} with model {}",
        provider.provider_name(),
        provider.model()
    );
    Ok(provider)
}
