//! Chat backend answering business questions from a SQL database.
//!
//! A question goes through `service::ChatService`, which keeps per-session
//! history and hands the question to an `agent::Planner`. The default
//! planner lets a language model inspect the schema and run guarded,
//! read-only SELECT statements through the `tools` until it can answer.

pub mod core;
pub mod session;
pub mod sql;
pub mod tools;

pub mod agent;
pub mod guard;
pub mod llm;
pub mod service;

// Binary plumbing
pub mod config;
pub mod logging;
pub mod server;
