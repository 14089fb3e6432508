//! Database tools offered to the planner
//!
//! - `list_tables` - names of the visible tables
//! - `describe_tables` - columns and a couple of sample rows per table
//! - `run_select` - executes one guarded SELECT and returns its rows

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::tool::{parse_input, PlannerStep, Tool, ToolResult};
use crate::core::AgentResult;
use crate::llm::{ToolDefinition, ToolInputSchema};
use crate::sql::value::render_rows;
use crate::sql::{ReadOnlyExecutor, SchemaInspector};

/// Rows returned to the model per query by default
pub const DEFAULT_MAX_ROWS: usize = 50;

/// Lists the tables the model may query
pub struct ListTablesTool {
    inspector: SchemaInspector,
}

impl ListTablesTool {
    pub fn new(inspector: SchemaInspector) -> Self {
        Self { inspector }
    }
}

#[async_trait]
impl Tool for ListTablesTool {
    fn name(&self) -> &str {
        "list_tables"
    }

    fn description(&self) -> &str {
        "List the names of the tables available for querying."
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: Some(self.description().to_string()),
            input_schema: ToolInputSchema::new().with_properties(json!({})),
        }
    }

    fn step(&self) -> PlannerStep {
        PlannerStep::InspectSchema
    }

    async fn execute(&self, _input: &Value) -> AgentResult<ToolResult> {
        let tables = self.inspector.list_tables().await?;
        if tables.is_empty() {
            return Ok(ToolResult::success("No tables are available."));
        }
        Ok(ToolResult::success(tables.join(", ")))
    }
}

/// Describes columns and sample rows of the named tables
pub struct DescribeTablesTool {
    inspector: SchemaInspector,
}

#[derive(Debug, Deserialize)]
struct DescribeTablesInput {
    tables: Vec<String>,
}

impl DescribeTablesTool {
    pub fn new(inspector: SchemaInspector) -> Self {
        Self { inspector }
    }
}

#[async_trait]
impl Tool for DescribeTablesTool {
    fn name(&self) -> &str {
        "describe_tables"
    }

    fn description(&self) -> &str {
        "Show the columns of the given tables together with up to 2 sample rows each. \
         Call list_tables first if you are unsure of the table names."
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: Some(self.description().to_string()),
            input_schema: ToolInputSchema::new()
                .with_properties(json!({
                    "tables": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Table names to describe"
                    }
                }))
                .with_required(vec!["tables".to_string()]),
        }
    }

    fn step(&self) -> PlannerStep {
        PlannerStep::InspectSchema
    }

    async fn execute(&self, input: &Value) -> AgentResult<ToolResult> {
        let input: DescribeTablesInput = parse_input(self.name(), input)?;
        if input.tables.is_empty() {
            return Ok(ToolResult::error("Provide at least one table name."));
        }

        let described = self.inspector.describe(&input.tables).await?;
        let text = described
            .iter()
            .map(|t| t.render())
            .collect::<Vec<_>>()
            .join("\n");
        Ok(ToolResult::success(text))
    }
}

/// Executes one read-only query
pub struct RunSelectTool {
    executor: ReadOnlyExecutor,
    max_rows: usize,
}

#[derive(Debug, Deserialize)]
struct RunSelectInput {
    query: String,
}

impl RunSelectTool {
    pub fn new(executor: ReadOnlyExecutor) -> Self {
        Self {
            executor,
            max_rows: DEFAULT_MAX_ROWS,
        }
    }

    /// Cap on rows shown to the model
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows.max(1);
        self
    }
}

#[async_trait]
impl Tool for RunSelectTool {
    fn name(&self) -> &str {
        "run_select"
    }

    fn description(&self) -> &str {
        "Run a single read-only SQL SELECT statement against the database and \
         return the resulting rows as JSON. Only SELECT is allowed."
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: Some(self.description().to_string()),
            input_schema: ToolInputSchema::new()
                .with_properties(json!({
                    "query": {
                        "type": "string",
                        "description": "One SQL SELECT statement"
                    }
                }))
                .with_required(vec!["query".to_string()]),
        }
    }

    fn step(&self) -> PlannerStep {
        PlannerStep::ProposeQuery
    }

    async fn execute(&self, input: &Value) -> AgentResult<ToolResult> {
        let input: RunSelectInput = parse_input(self.name(), input)?;
        tracing::info!("[SqlTools] Proposed query: {}", input.query);

        let rows = self.executor.execute_select(&input.query).await?;
        Ok(ToolResult::success(render_rows(&rows, self.max_rows)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AgentError;
    use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

    async fn pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        for sql in [
            "CREATE TABLE core_agent (id INTEGER PRIMARY KEY, code TEXT, site TEXT)",
            "INSERT INTO core_agent (code, site) VALUES ('A001','Lima'), ('A002','Arequipa'), ('A003','Lima')",
        ] {
            sqlx::query(sql).execute(&pool).await.unwrap();
        }
        pool
    }

    #[tokio::test]
    async fn test_list_and_describe() {
        let inspector = SchemaInspector::new(pool().await);
        let list = ListTablesTool::new(inspector.clone());
        assert_eq!(list.execute(&json!({})).await.unwrap().output, "core_agent");

        let describe = DescribeTablesTool::new(inspector);
        let result = describe
            .execute(&json!({"tables": ["core_agent"]}))
            .await
            .unwrap();
        assert!(result.output.contains("Table core_agent"));
        assert!(result.output.contains("2 sample row(s)"));

        let err = describe.execute(&json!({"table": "core_agent"})).await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_run_select_renders_rows() {
        let tool = RunSelectTool::new(ReadOnlyExecutor::new(pool().await)).with_max_rows(1);
        let result = tool
            .execute(&json!({"query": "SELECT code FROM core_agent WHERE site = 'Lima' ORDER BY code"}))
            .await
            .unwrap();
        assert!(!result.is_error);
        assert!(result.output.starts_with("2 row(s):"));
        assert!(result.output.contains("A001"));
        assert!(result.output.contains("... and 1 more rows"));
    }

    #[tokio::test]
    async fn test_run_select_rejects_mutation() {
        let tool = RunSelectTool::new(ReadOnlyExecutor::new(pool().await));
        let err = tool
            .execute(&json!({"query": "DELETE FROM core_agent"}))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::NotAReadQuery));
    }
}
