//! Scripted provider for development and tests
//!
//! Replays a queue of canned responses in order. Once the queue is empty every
//! call answers with a fixed text, so a server started without model
//! credentials still completes turns.
//!
//! Requests are only kept by a provider built with [`ScriptedProvider::recording`].

use anyhow::Result;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::provider::LlmProvider;
use super::types::{
    ContentBlock, Message, MessageResponse, StopReason, ToolChoice, ToolDefinition, Usage,
};

/// Reply used once the script is exhausted
pub const DEFAULT_SCRIPTED_REPLY: &str = "(DEV) No LLM configured.";

/// One recorded request
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub system: Option<String>,
    pub tool_names: Vec<String>,
    pub tool_choice: Option<ToolChoice>,
}

/// A scripted step
#[derive(Debug, Clone)]
enum ScriptedStep {
    Respond(Vec<ContentBlock>),
    Fail(String),
    Hang,
}

/// Provider answering from a script
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<ScriptedStep>>,
    requests: Mutex<Vec<RecordedRequest>>,
    record: bool,
    calls: Mutex<u32>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider that keeps every request it receives, for assertions
    pub fn recording() -> Self {
        Self {
            record: true,
            ..Self::default()
        }
    }

    /// Queue a final text answer
    pub fn then_text(self, text: impl Into<String>) -> Self {
        self.push(ScriptedStep::Respond(vec![ContentBlock::text(text)]))
    }

    /// Queue a single tool call
    pub fn then_tool(self, name: impl Into<String>, input: Value) -> Self {
        self.push(ScriptedStep::Respond(vec![ContentBlock::tool_use(
            String::new(),
            name,
            input,
        )]))
    }

    /// Queue an arbitrary response made of content blocks
    pub fn then_blocks(self, blocks: Vec<ContentBlock>) -> Self {
        self.push(ScriptedStep::Respond(blocks))
    }

    /// Queue a transport failure
    pub fn then_error(self, message: impl Into<String>) -> Self {
        self.push(ScriptedStep::Fail(message.into()))
    }

    /// Queue a call that never completes
    pub fn then_hang(self) -> Self {
        self.push(ScriptedStep::Hang)
    }

    fn push(self, step: ScriptedStep) -> Self {
        if let Ok(mut steps) = self.steps.lock() {
            steps.push_back(step);
        }
        self
    }

    /// Requests received so far (always empty unless recording)
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Number of steps not yet consumed
    pub fn remaining(&self) -> usize {
        self.steps.lock().map(|s| s.len()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedProvider {
    async fn send_with_tools_and_system(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        tools: Vec<ToolDefinition>,
        tool_choice: Option<ToolChoice>,
    ) -> Result<MessageResponse> {
        let call = {
            let mut calls = self
                .calls
                .lock()
                .map_err(|_| anyhow::anyhow!("scripted provider lock poisoned"))?;
            *calls += 1;
            *calls
        };

        if self.record {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(RecordedRequest {
                    messages,
                    system,
                    tool_names: tools.iter().map(|t| t.name.clone()).collect(),
                    tool_choice,
                });
            }
        }

        let step = self.steps.lock().ok().and_then(|mut s| s.pop_front());
        let content = match step {
            Some(ScriptedStep::Fail(message)) => anyhow::bail!(message),
            Some(ScriptedStep::Hang) => std::future::pending().await,
            Some(ScriptedStep::Respond(blocks)) => blocks
                .into_iter()
                .enumerate()
                .map(|(i, block)| match block {
                    // Scripted tool calls get unique ids per call
                    ContentBlock::ToolUse { id, name, input } if id.is_empty() => {
                        ContentBlock::tool_use(format!("scripted_{}_{}", call, i), name, input)
                    }
                    other => other,
                })
                .collect(),
            None => vec![ContentBlock::text(DEFAULT_SCRIPTED_REPLY)],
        };

        let has_tool_use = content
            .iter()
            .any(|b: &ContentBlock| matches!(b, ContentBlock::ToolUse { .. }));

        Ok(MessageResponse {
            id: format!("scripted_{}", call),
            content,
            model: "scripted".to_string(),
            stop_reason: Some(if has_tool_use {
                StopReason::ToolUse
            } else {
                StopReason::EndTurn
            }),
            usage: Usage::default(),
        })
    }

    fn model(&self) -> String {
        "scripted".to_string()
    }

    fn provider_name(&self) -> &str {
        "fake"
    }
}
