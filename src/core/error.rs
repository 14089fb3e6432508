//! Error types for the chat agent

use thiserror::Error;

/// Errors that can occur while answering a chat turn
#[derive(Error, Debug)]
pub enum AgentError {
    /// A statement other than SELECT was proposed
    #[error("Only read queries (SELECT) are allowed")]
    NotAReadQuery,

    /// The analytic database could not be reached.
    ///
    /// The message is safe to show to end users: it never carries the
    /// connection string or credentials.
    #[error("{0}")]
    DataStoreUnavailable(String),

    /// The statement reached the database but failed (syntax, unknown column, timeout)
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// The final answer mentioned a mutation keyword
    #[error("Mutation keyword detected in answer: {0}")]
    MutationLeakDetected(String),

    /// The planner hit its iteration bound without a final answer
    #[error("Planner stopped after {iterations} iterations without a final answer")]
    PlannerExhausted {
        /// Number of model calls made
        iterations: usize,
        /// Last text the model produced along the way, if any
        partial: Option<String>,
    },

    /// Conversation history could not be written or read
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The language model call failed
    #[error("Language model error: {0}")]
    Llm(String),

    /// Session not found
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Request rejected before any work was done
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AgentError {
    /// Create a persistence error from any displayable cause
    pub fn persistence(err: impl std::fmt::Display) -> Self {
        AgentError::Persistence(err.to_string())
    }

    /// Create a language model error from any displayable cause
    pub fn llm(err: impl std::fmt::Display) -> Self {
        AgentError::Llm(err.to_string())
    }

    /// Whether the model can recover from this error by trying again.
    ///
    /// These are reported back to the model as tool errors; everything else
    /// ends the turn.
    pub fn is_tool_feedback(&self) -> bool {
        matches!(
            self,
            AgentError::NotAReadQuery | AgentError::QueryFailed(_) | AgentError::InvalidRequest(_)
        )
    }

    /// Message that may be shown to the end user and stored in history.
    ///
    /// Internal details (SQL errors, provider payloads) stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            AgentError::NotAReadQuery => self.to_string(),
            AgentError::DataStoreUnavailable(msg) => msg.clone(),
            AgentError::InvalidRequest(msg) => msg.clone(),
            AgentError::SessionNotFound(_) => self.to_string(),
            AgentError::Llm(_) => {
                "The language model could not be reached. Please try again later.".to_string()
            }
            AgentError::Persistence(_) => {
                "The conversation history could not be saved.".to_string()
            }
            _ => "An unexpected error occurred while answering.".to_string(),
        }
    }
}

/// Result type alias for agent operations
pub type AgentResult<T> = Result<T, AgentError>;
