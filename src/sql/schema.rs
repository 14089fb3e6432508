//! Live schema description used to ground query generation
//!
//! Lists the visible tables, their columns, and a couple of sample rows per
//! table. Table names requested by the model are checked against the live
//! list before they are ever interpolated into SQL.

use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use super::pool::classify_query_error;
use super::value::{decode_row, Row};
use crate::core::{AgentError, AgentResult};

/// Sample rows shown per table
pub const DEFAULT_SAMPLE_ROWS: usize = 2;

/// One column of a table
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ColumnInfo {
    pub name: String,
    #[sqlx(rename = "type")]
    pub data_type: String,
    #[sqlx(rename = "notnull")]
    pub not_null: bool,
    #[sqlx(rename = "pk")]
    pub primary_key: i64,
}

/// Columns and sample rows of one table
#[derive(Debug, Clone, Serialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub sample_rows: Vec<Row>,
}

impl TableSchema {
    /// Render as plain text for the model
    pub fn render(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                let mut col = format!("{} {}", c.name, c.data_type);
                if c.primary_key > 0 {
                    col.push_str(" PRIMARY KEY");
                } else if c.not_null {
                    col.push_str(" NOT NULL");
                }
                col
            })
            .collect::<Vec<_>>()
            .join(", ");

        let mut out = format!("Table {} ({})\n", self.name, columns);
        if self.sample_rows.is_empty() {
            out.push_str("  (no rows)\n");
        } else {
            out.push_str(&format!("  {} sample row(s):\n", self.sample_rows.len()));
            for row in &self.sample_rows {
                out.push_str("  ");
                out.push_str(&serde_json::to_string(row).unwrap_or_default());
                out.push('\n');
            }
        }
        out
    }
}

/// Description of every visible table
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaDescription {
    pub tables: Vec<TableSchema>,
}

impl SchemaDescription {
    /// Render every table, separated by blank lines
    pub fn render(&self) -> String {
        if self.tables.is_empty() {
            return "No tables are available.".to_string();
        }
        self.tables
            .iter()
            .map(|t| t.render())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Reads table metadata from the analytic database
#[derive(Debug, Clone)]
pub struct SchemaInspector {
    pool: SqlitePool,
    /// When non-empty, only these tables are visible
    include_tables: Vec<String>,
    /// Tables that are never visible (conversation history)
    hidden_tables: Vec<String>,
    sample_rows: usize,
}

impl SchemaInspector {
    /// Create an inspector showing every table of the database
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            include_tables: Vec::new(),
            hidden_tables: Vec::new(),
            sample_rows: DEFAULT_SAMPLE_ROWS,
        }
    }

    /// Restrict the visible tables
    pub fn with_include_tables(mut self, tables: Vec<String>) -> Self {
        self.include_tables = tables;
        self
    }

    /// Hide tables from the model
    pub fn with_hidden_tables(mut self, tables: Vec<String>) -> Self {
        self.hidden_tables = tables;
        self
    }

    /// Set the number of sample rows per table (capped at the default)
    pub fn with_sample_rows(mut self, rows: usize) -> Self {
        self.sample_rows = rows.min(DEFAULT_SAMPLE_ROWS);
        self
    }

    /// List visible table names, sorted
    pub async fn list_tables(&self) -> AgentResult<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master \
             WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(classify_query_error)?;

        Ok(names
            .into_iter()
            .filter(|name| !self.hidden_tables.iter().any(|h| h.eq_ignore_ascii_case(name)))
            .filter(|name| {
                self.include_tables.is_empty()
                    || self.include_tables.iter().any(|t| t.eq_ignore_ascii_case(name))
            })
            .collect())
    }

    /// Describe the named tables.
    ///
    /// Unknown names fail with `QueryFailed` listing the tables that exist.
    pub async fn describe(&self, tables: &[String]) -> AgentResult<Vec<TableSchema>> {
        let visible = self.list_tables().await?;

        let mut resolved = Vec::with_capacity(tables.len());
        let mut unknown = Vec::new();
        for requested in tables {
            match visible
                .iter()
                .find(|name| name.eq_ignore_ascii_case(requested.trim()))
            {
                Some(name) => resolved.push(name.clone()),
                None => unknown.push(requested.clone()),
            }
        }

        if !unknown.is_empty() {
            return Err(AgentError::QueryFailed(format!(
                "unknown table(s): {}. Available tables: {}",
                unknown.join(", "),
                visible.join(", ")
            )));
        }

        let mut described = Vec::with_capacity(resolved.len());
        for name in resolved {
            described.push(self.describe_table(&name).await?);
        }
        Ok(described)
    }

    /// Describe every visible table
    pub async fn describe_all(&self) -> AgentResult<SchemaDescription> {
        let tables = self.list_tables().await?;
        let mut described = Vec::with_capacity(tables.len());
        for name in &tables {
            described.push(self.describe_table(name).await?);
        }
        tracing::debug!("[Schema] Described {} table(s)", described.len());
        Ok(SchemaDescription { tables: described })
    }

    /// Describe one table whose name has already been checked against the live list
    async fn describe_table(&self, name: &str) -> AgentResult<TableSchema> {
        let columns: Vec<ColumnInfo> = sqlx::query_as(
            "SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await
        .map_err(classify_query_error)?;

        let sample_rows = if self.sample_rows == 0 {
            Vec::new()
        } else {
            let sql = format!(
                "SELECT * FROM \"{}\" LIMIT {}",
                name.replace('"', "\"\""),
                self.sample_rows
            );
            let rows = sqlx::query(&sql)
                .fetch_all(&self.pool)
                .await
                .map_err(classify_query_error)?;
            rows.iter()
                .map(decode_row)
                .collect::<Result<Vec<_>, _>>()
                .map_err(classify_query_error)?
        };

        Ok(TableSchema {
            name: name.to_string(),
            columns,
            sample_rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        for sql in [
            "CREATE TABLE core_agent (id INTEGER PRIMARY KEY, code TEXT NOT NULL, site TEXT)",
            "CREATE TABLE core_indicator (id INTEGER PRIMARY KEY, name TEXT, value REAL)",
            "CREATE TABLE chat_message (id INTEGER PRIMARY KEY, content TEXT)",
            "INSERT INTO core_agent (code, site) VALUES ('A001','Lima'), ('A002','Arequipa'), ('A003','Lima')",
        ] {
            sqlx::query(sql).execute(&pool).await.unwrap();
        }
        pool
    }

    #[tokio::test]
    async fn test_list_tables_hides_history() {
        let inspector =
            SchemaInspector::new(pool().await).with_hidden_tables(vec!["chat_message".into()]);
        let tables = inspector.list_tables().await.unwrap();
        assert_eq!(tables, vec!["core_agent", "core_indicator"]);
    }

    #[tokio::test]
    async fn test_include_tables_restricts_view() {
        let inspector =
            SchemaInspector::new(pool().await).with_include_tables(vec!["core_agent".into()]);
        assert_eq!(inspector.list_tables().await.unwrap(), vec!["core_agent"]);
    }

    #[tokio::test]
    async fn test_describe_caps_sample_rows() {
        let inspector = SchemaInspector::new(pool().await).with_sample_rows(10);
        let tables = inspector.describe(&["CORE_AGENT".to_string()]).await.unwrap();

        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "core_agent");
        assert_eq!(tables[0].sample_rows.len(), 2);
        let columns: Vec<&str> = tables[0].columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(columns, vec!["id", "code", "site"]);
        assert!(tables[0].columns[1].not_null);

        let rendered = tables[0].render();
        assert!(rendered.contains("Table core_agent (id INTEGER PRIMARY KEY, code TEXT NOT NULL, site TEXT)"));
        assert!(rendered.contains("2 sample row(s)"));
    }

    #[tokio::test]
    async fn test_describe_unknown_table() {
        let inspector = SchemaInspector::new(pool().await);
        let err = inspector
            .describe(&["core_agent\"; DROP TABLE core_agent; --".to_string()])
            .await
            .unwrap_err();
        match err {
            AgentError::QueryFailed(msg) => assert!(msg.contains("Available tables")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_describe_all_renders_every_table() {
        let inspector =
            SchemaInspector::new(pool().await).with_hidden_tables(vec!["chat_message".into()]);
        let description = inspector.describe_all().await.unwrap();
        let rendered = description.render();
        assert!(rendered.contains("Table core_agent"));
        assert!(rendered.contains("Table core_indicator"));
        assert!(rendered.contains("(no rows)"));
        assert!(!rendered.contains("chat_message"));
    }
}
