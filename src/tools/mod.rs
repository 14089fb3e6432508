//! Tools the planner exposes to the model
//!
//! - `Tool` trait - Interface for implementing tools
//! - `ToolResult` - Result type for tool execution
//! - `ToolRegistry` - Registry for managing available tools
//! - `sql` - Schema inspection and guarded query tools

mod registry;
pub mod sql;
mod tool;

pub use registry::ToolRegistry;
pub use sql::{DescribeTablesTool, ListTablesTool, RunSelectTool, DEFAULT_MAX_ROWS};
pub use tool::{parse_input, PlannerStep, Tool, ToolResult};
