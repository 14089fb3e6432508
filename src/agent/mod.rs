//! Language-to-query planner
//!
//! - `Planner` - The pluggable answering capability used by the chat service
//! - `SqlPlanner` - Tool-calling implementation over an `LlmProvider`
//! - `PlannerConfig` - Iteration bound and early-stopping policy

pub mod config;
pub mod planner;
pub mod system_prompt;

pub use config::{EarlyStopping, PlannerConfig, DEFAULT_LLM_TIMEOUT, DEFAULT_MAX_ITERATIONS};
pub use planner::{Planner, SqlPlanner, EXHAUSTED_ANSWER};
pub use system_prompt::{build_system_prompt, NO_DATA_ANSWER};
