//! Session and message record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::AgentError;
use crate::llm::Message;

/// Maximum length of an external session id
pub const MAX_SESSION_ID_LEN: usize = 64;

/// Author of a stored message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Role {
    type Error = AgentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(AgentError::Persistence(format!("unknown message role: {}", other))),
        }
    }
}

/// A persisted conversation thread
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SessionRecord {
    /// External session id chosen by the client
    pub session_id: String,
    /// Optional human label (empty when unset)
    pub user_label: String,
    /// When the session was first seen
    pub created_at: DateTime<Utc>,
}

/// One persisted message
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StoredMessage {
    /// Sequence assigned at persistence time; the ordering authority
    pub id: i64,
    pub session_id: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl StoredMessage {
    /// Convert into a plain-text model message for conversational context
    pub fn to_llm_message(&self) -> Message {
        match self.role {
            Role::User => Message::user(self.content.as_str()),
            Role::Assistant => Message::assistant(self.content.as_str()),
        }
    }
}

/// Session listing entry with its last activity
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SessionSummary {
    pub session_id: String,
    pub user_label: String,
    pub created_at: DateTime<Utc>,
    /// Time of the newest message, if any
    pub last_message_at: Option<DateTime<Utc>>,
    pub message_count: i64,
}

impl SessionSummary {
    /// Newest message time, or creation time for an empty session
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_message_at.unwrap_or(self.created_at)
    }
}

/// Check an external session id
pub fn validate_session_id(session_id: &str) -> Result<(), AgentError> {
    if session_id.trim().is_empty() {
        return Err(AgentError::InvalidRequest("session_id must not be empty".into()));
    }
    if session_id.chars().count() > MAX_SESSION_ID_LEN {
        return Err(AgentError::InvalidRequest(format!(
            "session_id must be at most {} characters",
            MAX_SESSION_ID_LEN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        assert_eq!(Role::try_from("user".to_string()).unwrap(), Role::User);
        assert_eq!(Role::Assistant.to_string(), "assistant");
        assert!(Role::try_from("system".to_string()).is_err());
    }

    #[test]
    fn test_validate_session_id() {
        assert!(validate_session_id("s1").is_ok());
        assert!(validate_session_id("   ").is_err());
        assert!(validate_session_id(&"x".repeat(65)).is_err());
        assert!(validate_session_id(&"ñ".repeat(64)).is_ok());
    }

    #[test]
    fn test_to_llm_message() {
        let msg = StoredMessage {
            id: 1,
            session_id: "s1".into(),
            role: Role::Assistant,
            content: "Hay 2 agentes".into(),
            created_at: Utc::now(),
        };
        let llm = msg.to_llm_message();
        assert_eq!(llm.role, "assistant");
        assert_eq!(llm.text(), Some("Hay 2 agentes"));
    }
}
