//! SQL planner loop
//!
//! Drives the model through a bounded loop:
//! - Thinking: one model call with the SQL tools available
//! - InspectSchema / ProposeQuery: the requested tools run and their results
//!   are fed back
//! - Finalize: the model answers with text and no tool calls
//!
//! The loop ends on Finalize, on an error that ends the turn, or when the
//! iteration bound is hit, in which case the early-stopping policy decides
//! the answer.

use std::sync::Arc;

use async_trait::async_trait;

use super::config::{EarlyStopping, PlannerConfig};
use super::system_prompt::build_system_prompt;
use crate::core::{AgentError, AgentResult};
use crate::llm::{ContentBlock, LlmProvider, Message, MessageContent, MessageResponse, ToolChoice};
use crate::tools::ToolRegistry;

/// Answer returned when the loop ends without any text from the model
pub const EXHAUSTED_ANSWER: &str = "I could not reach a final answer within the allowed number \
of steps. Please rephrase or narrow the question.";

const FINAL_ANSWER_NUDGE: &str = "You have used all available steps. Do not call any more \
tools. Give your best final answer using only the data gathered above.";

/// Turns a question into an answer grounded in query results
#[async_trait]
pub trait Planner: Send + Sync {
    /// Answer `question` for a session.
    ///
    /// `history` is the recent conversation, oldest first, without the
    /// question itself.
    async fn answer(
        &self,
        session_id: &str,
        question: &str,
        schema_description: &str,
        history: &[Message],
    ) -> AgentResult<String>;
}

/// Tool-calling planner backed by an LLM provider
pub struct SqlPlanner {
    llm: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    config: PlannerConfig,
}

impl SqlPlanner {
    pub fn new(llm: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>, config: PlannerConfig) -> Self {
        Self { llm, tools, config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    async fn call_llm(
        &self,
        messages: &[Message],
        system: &str,
        tool_choice: ToolChoice,
    ) -> AgentResult<MessageResponse> {
        let call = self.llm.send_with_tools_and_system(
            messages.to_vec(),
            Some(system.to_string()),
            self.tools.get_definitions(),
            Some(tool_choice),
        );

        match tokio::time::timeout(self.config.llm_timeout, call).await {
            Ok(result) => result.map_err(|e| {
                tracing::error!("[SqlPlanner] LLM call failed: {:#}", e);
                AgentError::llm(format!("{:#}", e))
            }),
            Err(_) => {
                tracing::error!(
                    "[SqlPlanner] LLM call timed out after {:?}",
                    self.config.llm_timeout
                );
                Err(AgentError::llm(format!(
                    "model call timed out after {} ms",
                    self.config.llm_timeout.as_millis()
                )))
            }
        }
    }

    /// Run the bounded loop. Hitting the bound yields `PlannerExhausted`.
    async fn run_loop(
        &self,
        session_id: &str,
        messages: &mut Vec<Message>,
        system: &str,
    ) -> AgentResult<String> {
        let mut partial: Option<String> = None;
        let mut iterations = 0;

        for iteration in 1..=self.config.max_iterations {
            iterations = iteration;
            tracing::info!(
                "[SqlPlanner] Session {}: calling LLM with {} messages (iteration {})",
                session_id,
                messages.len(),
                iteration
            );

            let response = self.call_llm(messages, system, ToolChoice::Auto).await?;
            tracing::debug!(
                "[SqlPlanner] stop_reason={:?} tokens in/out={}/{}",
                response.stop_reason,
                response.usage.input_tokens,
                response.usage.output_tokens
            );

            let text = response.text();
            if !text.trim().is_empty() {
                partial = Some(text.trim().to_string());
            }

            if !response.has_tool_use() {
                if text.trim().is_empty() {
                    tracing::warn!("[SqlPlanner] Model finished without any text");
                    break;
                }
                tracing::info!("[SqlPlanner] Finalize after {} iteration(s)", iteration);
                return Ok(text.trim().to_string());
            }

            let mut results = Vec::new();
            for (id, name, input) in response.tool_uses() {
                match self.tools.step_of(name) {
                    Some(step) => tracing::info!("[SqlPlanner] {} via {} ({})", step, name, id),
                    None => tracing::info!("[SqlPlanner] Unknown tool {} ({})", name, id),
                }
                // Errors that reach here end the turn (e.g. the database is down)
                let result = self.tools.execute(name, input).await?;
                results.push(ContentBlock::tool_result(id, result.output, result.is_error));
            }

            messages.push(Message::assistant_with_blocks(response.content.clone()));
            messages.push(Message::user_with_blocks(results));
        }

        Err(AgentError::PlannerExhausted {
            iterations,
            partial,
        })
    }

    /// One extra call with tools disabled
    async fn generate_final(&self, messages: &mut Vec<Message>, system: &str) -> AgentResult<String> {
        // Keep user/assistant alternation: the nudge joins the trailing tool results
        match messages.last_mut() {
            Some(last) if last.role == "user" => match &mut last.content {
                MessageContent::Blocks(blocks) => blocks.push(ContentBlock::text(FINAL_ANSWER_NUDGE)),
                MessageContent::Text(text) => {
                    text.push_str("\n\n");
                    text.push_str(FINAL_ANSWER_NUDGE);
                }
            },
            _ => messages.push(Message::user(FINAL_ANSWER_NUDGE)),
        }
        let response = self.call_llm(messages, system, ToolChoice::None).await?;
        Ok(response.text().trim().to_string())
    }
}

#[async_trait]
impl Planner for SqlPlanner {
    async fn answer(
        &self,
        session_id: &str,
        question: &str,
        schema_description: &str,
        history: &[Message],
    ) -> AgentResult<String> {
        let system = build_system_prompt(schema_description);
        let mut messages = history.to_vec();
        messages.push(Message::user(question));

        match self.run_loop(session_id, &mut messages, &system).await {
            Err(AgentError::PlannerExhausted { iterations, partial }) => {
                tracing::warn!(
                    "[SqlPlanner] Session {}: no final answer after {} iteration(s), policy {:?}",
                    session_id,
                    iterations,
                    self.config.early_stopping
                );
                if self.config.early_stopping == EarlyStopping::Generate {
                    let generated = self.generate_final(&mut messages, &system).await?;
                    if !generated.is_empty() {
                        return Ok(generated);
                    }
                }
                Ok(partial.unwrap_or_else(|| EXHAUSTED_ANSWER.to_string()))
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedProvider;
    use crate::sql::{ReadOnlyExecutor, SchemaInspector};
    use crate::tools::{DescribeTablesTool, ListTablesTool, RunSelectTool};
    use serde_json::json;
    use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

    async fn pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        for sql in [
            "CREATE TABLE core_agent (id INTEGER PRIMARY KEY, code TEXT, site TEXT, campaign TEXT)",
            "INSERT INTO core_agent (code, site, campaign) VALUES \
             ('A001','Lima','Ventas'), ('A002','Arequipa','Ventas'), ('A003','Lima','Soporte')",
        ] {
            sqlx::query(sql).execute(&pool).await.unwrap();
        }
        pool
    }

    fn registry(pool: SqlitePool) -> Arc<ToolRegistry> {
        let inspector = SchemaInspector::new(pool.clone());
        let mut tools = ToolRegistry::new();
        tools.register(ListTablesTool::new(inspector.clone()));
        tools.register(DescribeTablesTool::new(inspector));
        tools.register(RunSelectTool::new(ReadOnlyExecutor::new(pool)));
        Arc::new(tools)
    }

    fn last_tool_result(request: &crate::llm::scripted::RecordedRequest) -> (String, bool) {
        let blocks = request.messages.last().unwrap().blocks().unwrap();
        match &blocks[0] {
            ContentBlock::ToolResult {
                content, is_error, ..
            } => (content.clone().unwrap_or_default(), is_error.unwrap_or(false)),
            other => panic!("unexpected block: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_inspect_query_finalize() {
        let llm = Arc::new(
            ScriptedProvider::recording()
                .then_tool("describe_tables", json!({"tables": ["core_agent"]}))
                .then_tool("run_select", json!({"query": "SELECT COUNT(*) AS n FROM core_agent WHERE site = 'Lima'"}))
                .then_text("There are 2 agents in Lima."),
        );
        let planner = SqlPlanner::new(llm.clone(), registry(pool().await), PlannerConfig::new());

        let answer = planner
            .answer("s1", "How many agents are in Lima?", "Table core_agent", &[])
            .await
            .unwrap();
        assert_eq!(answer, "There are 2 agents in Lima.");

        let requests = llm.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[0].system.as_deref().unwrap().contains("Table core_agent"));
        assert_eq!(requests[0].tool_names, vec!["list_tables", "describe_tables", "run_select"]);
        let (output, is_error) = last_tool_result(&requests[2]);
        assert!(!is_error);
        assert!(output.contains("\"n\":2"));
    }

    #[tokio::test]
    async fn test_rejected_mutation_is_fed_back() {
        let llm = Arc::new(
            ScriptedProvider::recording()
                .then_tool("run_select", json!({"query": "DELETE FROM core_agent"}))
                .then_text("I can only read data."),
        );
        let pool = pool().await;
        let planner = SqlPlanner::new(llm.clone(), registry(pool.clone()), PlannerConfig::new());

        let answer = planner.answer("s1", "Remove everyone", "", &[]).await.unwrap();
        assert_eq!(answer, "I can only read data.");

        let (output, is_error) = last_tool_result(&llm.requests()[1]);
        assert!(is_error);
        assert!(output.contains("SELECT"));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM core_agent")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn test_history_precedes_question() {
        let llm = Arc::new(ScriptedProvider::recording().then_text("1 agent in Arequipa."));
        let planner = SqlPlanner::new(llm.clone(), registry(pool().await), PlannerConfig::new());
        let history = vec![
            Message::user("How many agents are in Lima?"),
            Message::assistant("There are 2 agents in Lima."),
        ];

        planner.answer("s1", "And in Arequipa?", "", &history).await.unwrap();

        let sent = &llm.requests()[0].messages;
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].text(), Some("How many agents are in Lima?"));
        assert_eq!(sent[2].text(), Some("And in Arequipa?"));
    }

    #[tokio::test]
    async fn test_exhaustion_stop_policy_without_text() {
        let llm = Arc::new(
            ScriptedProvider::recording()
                .then_tool("list_tables", json!({}))
                .then_tool("list_tables", json!({})),
        );
        let config = PlannerConfig::new().with_max_iterations(2);
        let planner = SqlPlanner::new(llm.clone(), registry(pool().await), config);

        let answer = planner.answer("s1", "?", "", &[]).await.unwrap();
        assert_eq!(answer, EXHAUSTED_ANSWER);
        assert_eq!(llm.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_exhaustion_stop_policy_keeps_partial_text() {
        let llm = Arc::new(ScriptedProvider::recording().then_blocks(vec![
            ContentBlock::text("So far: 3 agents in total."),
            ContentBlock::tool_use("", "list_tables", json!({})),
        ]));
        let config = PlannerConfig::new().with_max_iterations(1);
        let planner = SqlPlanner::new(llm, registry(pool().await), config);

        let answer = planner.answer("s1", "?", "", &[]).await.unwrap();
        assert_eq!(answer, "So far: 3 agents in total.");
    }

    #[tokio::test]
    async fn test_exhaustion_generate_policy() {
        let llm = Arc::new(
            ScriptedProvider::recording()
                .then_tool("list_tables", json!({}))
                .then_text("Best effort: core_agent holds 3 agents."),
        );
        let config = PlannerConfig::new()
            .with_max_iterations(1)
            .with_early_stopping(EarlyStopping::Generate);
        let planner = SqlPlanner::new(llm.clone(), registry(pool().await), config);

        let answer = planner.answer("s1", "?", "", &[]).await.unwrap();
        assert_eq!(answer, "Best effort: core_agent holds 3 agents.");

        let requests = llm.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].tool_choice, Some(ToolChoice::None));
        let last = requests[1].messages.last().unwrap().blocks().unwrap();
        assert!(matches!(last.last(), Some(ContentBlock::Text { .. })));
    }

    #[tokio::test]
    async fn test_store_outage_aborts_loop() {
        let pool = pool().await;
        let llm = Arc::new(
            ScriptedProvider::recording()
                .then_tool("run_select", json!({"query": "SELECT 1"}))
                .then_text("unreachable"),
        );
        let planner = SqlPlanner::new(llm.clone(), registry(pool.clone()), PlannerConfig::new());
        pool.close().await;

        let err = planner.answer("s1", "?", "", &[]).await.unwrap_err();
        assert!(matches!(err, AgentError::DataStoreUnavailable(_)));
        assert_eq!(llm.remaining(), 1);
    }

    #[tokio::test]
    async fn test_llm_failure_is_llm_error() {
        let llm = Arc::new(ScriptedProvider::recording().then_error("503 Service Unavailable"));
        let planner = SqlPlanner::new(llm, registry(pool().await), PlannerConfig::new());
        let err = planner.answer("s1", "?", "", &[]).await.unwrap_err();
        assert!(matches!(err, AgentError::Llm(_)));
    }

    #[tokio::test]
    async fn test_hung_model_call_times_out() {
        let llm = Arc::new(ScriptedProvider::new().then_hang());
        let config = PlannerConfig::new().with_llm_timeout(std::time::Duration::from_millis(50));
        let planner = SqlPlanner::new(llm, registry(pool().await), config);

        let err = planner.answer("s1", "?", "", &[]).await.unwrap_err();
        match err {
            AgentError::Llm(msg) => assert!(msg.contains("timed out")),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
