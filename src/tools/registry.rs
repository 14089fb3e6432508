//! Tool registry for managing available tools
//!
//! Tools are kept in registration order so the definitions sent to the model
//! are stable from one request to the next.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use super::tool::{PlannerStep, Tool, ToolResult};
use crate::core::AgentResult;
use crate::llm::ToolDefinition;

/// Registry that holds all available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: IndexMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty tool registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool; a tool with the same name is replaced
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        tracing::debug!("[ToolRegistry] Registering tool: {}", name);
        self.tools.insert(name, Arc::new(tool));
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Step performed by the named tool
    pub fn step_of(&self, name: &str) -> Option<PlannerStep> {
        self.tools.get(name).map(|t| t.step())
    }

    /// Get all tool definitions for the model
    pub fn get_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Execute a tool by name.
    ///
    /// Unknown tools and recoverable failures come back as error results for
    /// the model. Only failures that end the turn are returned as `Err`.
    pub async fn execute(&self, name: &str, input: &Value) -> AgentResult<ToolResult> {
        let Some(tool) = self.tools.get(name) else {
            tracing::warn!("[ToolRegistry] Model requested unknown tool: {}", name);
            return Ok(ToolResult::error(format!(
                "Unknown tool '{}'. Available tools: {}",
                name,
                self.tool_names().join(", ")
            )));
        };

        tracing::info!("[ToolRegistry] Executing tool: {}", name);
        tracing::debug!("[ToolRegistry] Input: {}", input);

        match tool.execute(input).await {
            Ok(result) => {
                tracing::debug!(
                    "[ToolRegistry] Tool {} completed. Is error: {}",
                    name,
                    result.is_error
                );
                Ok(result)
            }
            Err(err) if err.is_tool_feedback() => {
                tracing::info!("[ToolRegistry] Tool {} reported: {}", name, err);
                Ok(ToolResult::error(err.to_string()))
            }
            Err(err) => {
                tracing::error!("[ToolRegistry] Tool {} failed: {}", name, err);
                Err(err)
            }
        }
    }

    /// Get the list of tool names
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
