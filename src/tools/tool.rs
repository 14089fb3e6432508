//! Tool trait definition
//!
//! Every capability the planner offers the model implements this trait.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::core::{AgentError, AgentResult};
use crate::llm::ToolDefinition;

/// Result of executing a tool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    /// The output of the tool
    pub output: String,
    /// Whether the tool execution resulted in an error
    pub is_error: bool,
}

impl ToolResult {
    /// Create a successful tool result
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: false,
        }
    }

    /// Create an error tool result
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            output: message.into(),
            is_error: true,
        }
    }
}

/// What a tool call does within the planner loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerStep {
    /// Look at tables, columns and sample rows
    InspectSchema,
    /// Run a proposed SELECT
    ProposeQuery,
}

impl std::fmt::Display for PlannerStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlannerStep::InspectSchema => f.write_str("inspect_schema"),
            PlannerStep::ProposeQuery => f.write_str("propose_query"),
        }
    }
}

/// Trait for tools the planner exposes to the model
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the name of this tool
    fn name(&self) -> &str;

    /// Get a description of this tool
    fn description(&self) -> &str;

    /// Get the tool definition sent to the model
    fn definition(&self) -> ToolDefinition;

    /// Planner step this tool performs
    fn step(&self) -> PlannerStep;

    /// Execute the tool with the given input.
    ///
    /// Errors the model can act on (`AgentError::is_tool_feedback`) are turned
    /// into tool errors by the registry; any other error ends the turn.
    async fn execute(&self, input: &Value) -> AgentResult<ToolResult>;
}

/// Deserialize tool input, reporting a malformed payload as `InvalidRequest`
pub fn parse_input<T: DeserializeOwned>(tool: &str, input: &Value) -> AgentResult<T> {
    serde_json::from_value(input.clone())
        .map_err(|e| AgentError::InvalidRequest(format!("invalid input for {}: {}", tool, e)))
}
