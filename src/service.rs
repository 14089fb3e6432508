//! Chat turn orchestration
//!
//! One turn: make sure the session exists, load the recent history, persist
//! the question, describe the schema, let the planner answer, pass the answer
//! through the output guard and persist it. Every persisted user message is
//! followed by exactly one assistant message, which is the answer or an
//! `Error: ...` text when the turn failed.

use std::sync::Arc;

use serde::Serialize;

use crate::agent::Planner;
use crate::core::{AgentError, AgentResult};
use crate::guard::guard_output;
use crate::llm::Message;
use crate::session::{validate_session_id, HistoryStore, Role};
use crate::sql::SchemaInspector;

/// Messages loaded as conversational context by default
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Warning attached to a reply whose assistant message could not be saved
pub const UNSAVED_REPLY_WARNING: &str =
    "The answer could not be saved to the conversation history.";

/// Prefix of an assistant message recording a failed turn
pub const ERROR_PREFIX: &str = "Error: ";

/// Outcome of a successful turn
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnReply {
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Answers chat turns for any number of sessions
pub struct ChatService {
    store: HistoryStore,
    inspector: SchemaInspector,
    planner: Arc<dyn Planner>,
    history_window: usize,
}

impl ChatService {
    pub fn new(store: HistoryStore, inspector: SchemaInspector, planner: Arc<dyn Planner>) -> Self {
        Self {
            store,
            inspector,
            planner,
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }

    /// Number of past messages given to the planner
    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    /// Handle one user message
    pub async fn handle_turn(&self, session_id: &str, message: &str) -> AgentResult<TurnReply> {
        validate_session_id(session_id)?;
        if message.trim().is_empty() {
            return Err(AgentError::InvalidRequest("message must not be empty".into()));
        }

        self.store.get_or_create(session_id).await?;

        // Loaded before the question is stored, so it is not duplicated
        let history: Vec<Message> = self
            .store
            .recent(session_id, self.history_window)
            .await?
            .iter()
            .map(|m| m.to_llm_message())
            .collect();

        self.store.append(session_id, Role::User, message).await?;
        tracing::info!(
            "[ChatService] Session {}: question stored, {} message(s) of context",
            session_id,
            history.len()
        );

        match self.answer(session_id, message, &history).await {
            Ok(reply) => {
                let warning = match self.store.append(session_id, Role::Assistant, &reply).await {
                    Ok(_) => None,
                    Err(e) => {
                        tracing::error!(
                            "[ChatService] Session {}: answer not saved: {}",
                            session_id,
                            e
                        );
                        Some(UNSAVED_REPLY_WARNING.to_string())
                    }
                };
                Ok(TurnReply { reply, warning })
            }
            Err(err) => {
                tracing::error!("[ChatService] Session {}: turn failed: {}", session_id, err);
                let recorded = format!("{}{}", ERROR_PREFIX, err.user_message());
                if let Err(e) = self.store.append(session_id, Role::Assistant, &recorded).await {
                    tracing::error!(
                        "[ChatService] Session {}: error turn not saved: {}",
                        session_id,
                        e
                    );
                }
                Err(err)
            }
        }
    }

    async fn answer(&self, session_id: &str, question: &str, history: &[Message]) -> AgentResult<String> {
        let schema = self.inspector.describe_all().await?;
        let answer = self
            .planner
            .answer(session_id, question, &schema.render(), history)
            .await?;
        Ok(guard_output(answer))
    }
}
