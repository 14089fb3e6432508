//! Read-only SQL executor
//!
//! Every statement goes through [`guard_input`] before a connection is
//! acquired. Only a single statement is sent per call, and each call is bounded
//! by a statement timeout.

use std::time::Duration;

use sqlparser::ast::Statement;
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;
use sqlx::sqlite::SqlitePool;

use super::pool::classify_query_error;
use super::value::{decode_row, Row};
use crate::core::{AgentError, AgentResult};
use crate::guard::guard_input;

/// Default upper bound for one statement
pub const DEFAULT_STATEMENT_TIMEOUT: Duration = Duration::from_secs(15);

/// Executes validated SELECT statements against the analytic database
#[derive(Debug, Clone)]
pub struct ReadOnlyExecutor {
    pool: SqlitePool,
    statement_timeout: Duration,
}

impl ReadOnlyExecutor {
    /// Create an executor over the given pool
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            statement_timeout: DEFAULT_STATEMENT_TIMEOUT,
        }
    }

    /// Set the statement timeout
    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }

    /// Get the underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run a SELECT statement and return its rows in engine order.
    ///
    /// Fails with `NotAReadQuery` without touching the database when the
    /// statement is not a SELECT.
    pub async fn execute_select(&self, statement: &str) -> AgentResult<Vec<Row>> {
        let statement = single_statement(guard_input(statement)?)?;

        tracing::info!("[Executor] Running: {}", statement);

        let fetch = sqlx::query(statement).fetch_all(&self.pool);
        let rows = match tokio::time::timeout(self.statement_timeout, fetch).await {
            Ok(result) => result.map_err(classify_query_error)?,
            Err(_) => {
                tracing::warn!(
                    "[Executor] Statement timed out after {:?}",
                    self.statement_timeout
                );
                return Err(AgentError::QueryFailed(format!(
                    "statement timed out after {} seconds",
                    self.statement_timeout.as_secs()
                )));
            }
        };

        let decoded = rows
            .iter()
            .map(decode_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(classify_query_error)?;

        tracing::debug!("[Executor] {} row(s) returned", decoded.len());
        Ok(decoded)
    }
}

/// Parse the statement and refuse anything but exactly one query.
///
/// Returns the text without trailing semicolons. Comments and quoted
/// literals are handled by the parser, so a `;` inside them does not count.
fn single_statement(sql: &str) -> AgentResult<&str> {
    let statements = Parser::parse_sql(&SQLiteDialect {}, sql)
        .map_err(|e| AgentError::QueryFailed(format!("could not parse the query: {}", e)))?;

    match statements.as_slice() {
        [Statement::Query(_)] => {}
        [_] => return Err(AgentError::NotAReadQuery),
        _ => {
            return Err(AgentError::QueryFailed(
                "only one statement per query is allowed".to_string(),
            ))
        }
    }

    Ok(sql.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn seeded_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE core_agent (id INTEGER PRIMARY KEY, code TEXT, full_name TEXT, site TEXT, active INTEGER)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO core_agent (code, full_name, site, active) VALUES \
             ('A001', 'Ana Ramos', 'Lima', 1), \
             ('A002', 'Luis Pérez', 'Arequipa', 1), \
             ('A003', 'Sara Díaz', 'Lima', 1)",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool
    }

    #[tokio::test]
    async fn test_execute_select_returns_rows_in_order() {
        let executor = ReadOnlyExecutor::new(seeded_pool().await);

        let rows = executor
            .execute_select("SELECT code, site FROM core_agent ORDER BY code")
            .await
            .unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["code"], json!("A001"));
        assert_eq!(rows[1]["site"], json!("Arequipa"));
        let keys: Vec<&str> = rows[0].keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["code", "site"]);
    }

    #[tokio::test]
    async fn test_count_by_site() {
        let executor = ReadOnlyExecutor::new(seeded_pool().await);

        let rows = executor
            .execute_select("  select count(*) AS total from core_agent where site = 'Lima';")
            .await
            .unwrap();

        assert_eq!(rows[0]["total"], json!(2));
    }

    #[tokio::test]
    async fn test_drop_is_rejected_before_connecting() {
        let pool = seeded_pool().await;
        // a closed pool would fail with DataStoreUnavailable if it were ever used
        pool.close().await;
        let executor = ReadOnlyExecutor::new(pool);

        let err = executor
            .execute_select("DROP TABLE core_agent;")
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::NotAReadQuery));
    }

    #[tokio::test]
    async fn test_stacked_statement_is_rejected() {
        let pool = seeded_pool().await;
        let executor = ReadOnlyExecutor::new(pool.clone());

        let err = executor
            .execute_select("SELECT 1; DELETE FROM core_agent")
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::QueryFailed(_)));

        let rows = executor
            .execute_select("SELECT count(*) AS n FROM core_agent")
            .await
            .unwrap();
        assert_eq!(rows[0]["n"], json!(3));
    }

    #[tokio::test]
    async fn test_semicolon_inside_literal_is_allowed() {
        let executor = ReadOnlyExecutor::new(seeded_pool().await);
        let rows = executor.execute_select("SELECT 'a;b' AS s").await.unwrap();
        assert_eq!(rows[0]["s"], json!("a;b"));
    }

    #[tokio::test]
    async fn test_unknown_column_is_query_failure() {
        let executor = ReadOnlyExecutor::new(seeded_pool().await);
        let err = executor
            .execute_select("SELECT nope FROM core_agent")
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::QueryFailed(_)));
    }

    #[tokio::test]
    async fn test_closed_pool_is_unavailable() {
        let pool = seeded_pool().await;
        pool.close().await;
        let executor = ReadOnlyExecutor::new(pool);

        let err = executor.execute_select("SELECT 1").await.unwrap_err();
        assert!(matches!(err, AgentError::DataStoreUnavailable(_)));
    }

    #[tokio::test]
    async fn test_statement_hidden_behind_comment_is_rejected() {
        let executor = ReadOnlyExecutor::new(seeded_pool().await);

        let err = executor
            .execute_select("SELECT 1 AS a -- it's\n; SELECT 2 AS b")
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::QueryFailed(_)));

        let err = executor
            .execute_select("SELECT code FROM core_agent /* don't */; DELETE FROM core_agent")
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::QueryFailed(_)));
    }

    #[tokio::test]
    async fn test_semicolon_inside_comment_is_allowed() {
        let executor = ReadOnlyExecutor::new(seeded_pool().await);
        let rows = executor
            .execute_select("SELECT count(*) AS n FROM core_agent -- totals; by site")
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["n"], json!(3));
    }

    #[test]
    fn test_single_statement_trims_trailing_semicolons() {
        assert_eq!(single_statement("SELECT 1 ;; ").unwrap(), "SELECT 1");
        assert!(single_statement("SELECT 1; SELECT 2").is_err());
    }
}
