//! Planner configuration
//!
//! ```ignore
//! let config = PlannerConfig::new()
//!     .with_max_iterations(8)
//!     .with_early_stopping(EarlyStopping::Generate);
//! ```

use std::time::Duration;

use clap::ValueEnum;

use crate::core::{AgentError, AgentResult};

/// Default bound on model calls per question
pub const DEFAULT_MAX_ITERATIONS: usize = 8;

/// Default bound on a single model call
pub const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(60);

/// What to answer when the iteration bound is hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum EarlyStopping {
    /// Return the last text the model produced, or a fixed apology
    #[default]
    Stop,
    /// Ask the model once more, with tools disabled, for a final answer
    Generate,
}

/// Configuration for a `SqlPlanner`
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Maximum number of model calls per question (prevents infinite loops)
    pub max_iterations: usize,

    /// Exhaustion policy
    pub early_stopping: EarlyStopping,

    /// A model call still pending after this long fails the turn
    pub llm_timeout: Duration,
}

impl PlannerConfig {
    pub fn new() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            early_stopping: EarlyStopping::Stop,
            llm_timeout: DEFAULT_LLM_TIMEOUT,
        }
    }

    /// Set maximum model calls per question
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_early_stopping(mut self, policy: EarlyStopping) -> Self {
        self.early_stopping = policy;
        self
    }

    pub fn with_llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = timeout;
        self
    }

    pub fn validate(&self) -> AgentResult<()> {
        if self.max_iterations == 0 {
            return Err(AgentError::InvalidConfig(
                "AGENT_MAX_ITERATIONS must be at least 1".to_string(),
            ));
        }
        if self.llm_timeout.is_zero() {
            return Err(AgentError::InvalidConfig(
                "LLM_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self::new()
    }
}
