//! Language model providers
//!
//! Every provider speaks the internal Anthropic-shaped types in [`types`] and
//! translates to its wire format at the boundary.

pub mod anthropic;
pub mod factory;
pub mod gemini;
pub mod openai;
pub mod provider;
pub mod scripted;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use factory::{build_provider, ProviderKind, ProviderSettings};
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use provider::{GenerationSettings, LlmProvider, DEFAULT_REQUEST_TIMEOUT};
pub use scripted::{ScriptedProvider, DEFAULT_SCRIPTED_REPLY};
pub use types::{
    ContentBlock, Message, MessageContent, MessageResponse, StopReason, ToolChoice,
    ToolDefinition, ToolInputSchema, Usage,
};
