//! HTTP API
//!
//! JSON endpoints for chatting and for browsing or managing sessions:
//!
//! - `POST /api/chat/` - Answer one question
//! - `GET|POST /api/sessions/` - List sessions, create or relabel one
//! - `GET|DELETE /api/sessions/{id}/` - Session transcript, deletion
//! - `GET /api/health/` - Liveness and configuration summary

pub mod api;
mod handlers;
mod router;

use std::sync::Arc;

use crate::service::ChatService;

pub use router::create_router;

/// Shared state of every handler
pub struct AppState {
    pub service: Arc<ChatService>,
    /// Provider name reported by the health endpoint
    pub model_provider: String,
    pub model: String,
}
