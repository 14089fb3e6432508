//! Core types shared across the crate
//!
//! - `AgentError` / `AgentResult` - Error taxonomy of a chat turn

pub mod error;

pub use error::{AgentError, AgentResult};
