//! Conversation memory
//!
//! This module provides `HistoryStore`, the durable per-session message log,
//! and the record types it reads and writes.
//!
//! Messages are scoped by the external session id; nothing crosses sessions.

pub mod metadata;
pub mod storage;

pub use metadata::{
    validate_session_id, Role, SessionRecord, SessionSummary, StoredMessage, MAX_SESSION_ID_LEN,
};
pub use storage::{HistoryStore, DEFAULT_MESSAGE_TABLE, SESSION_TABLE};
