//! Read-only access to the analytic database
//!
//! - `ReadOnlyExecutor` - Guarded SELECT execution
//! - `SchemaInspector` - Live table/column description with sample rows
//! - `pool` - Pool construction and error classification

pub mod executor;
pub mod pool;
pub mod schema;
pub mod value;

pub use executor::ReadOnlyExecutor;
pub use pool::{analytics_pool, history_pool, PoolSettings, DATABASE_ENGINE};
pub use schema::{SchemaDescription, SchemaInspector, TableSchema};
pub use value::Row;
