use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use sql_chat_agent::agent::SqlPlanner;
use sql_chat_agent::config::ServiceConfig;
use sql_chat_agent::llm::build_provider;
use sql_chat_agent::logging;
use sql_chat_agent::server::{create_router, AppState};
use sql_chat_agent::service::ChatService;
use sql_chat_agent::session::HistoryStore;
use sql_chat_agent::sql::{analytics_pool, history_pool, ReadOnlyExecutor, SchemaInspector};
use sql_chat_agent::tools::{DescribeTablesTool, ListTablesTool, RunSelectTool, ToolRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = ServiceConfig::parse();
    config.validate()?;

    let _log_guard = logging::init_logging(config.log_format)?;
    tracing::info!("=== SQL Chat Agent Starting ===");

    // Both pools connect lazily; an unreachable database shows up per request
    let pool_settings = config.pool_settings();
    let history = history_pool(&config.database_url, &pool_settings)?;
    let analytics = analytics_pool(&config.database_url, &pool_settings)?;

    let store = HistoryStore::with_message_table(history.clone(), &config.chat_history_table)?;
    store
        .init()
        .await
        .context("Failed to prepare the chat history tables")?;

    let inspector = SchemaInspector::new(analytics.clone())
        .with_include_tables(config.include_tables())
        .with_hidden_tables(store.owned_tables());
    let executor =
        ReadOnlyExecutor::new(analytics.clone()).with_statement_timeout(config.statement_timeout());

    let mut tools = ToolRegistry::new();
    tools.register(ListTablesTool::new(inspector.clone()));
    tools.register(DescribeTablesTool::new(inspector.clone()));
    tools.register(RunSelectTool::new(executor).with_max_rows(config.max_rows));
    tracing::info!("Registered {} tools: {:?}", tools.len(), tools.tool_names());

    let provider_settings = config.provider_settings();
    let llm = build_provider(&provider_settings)?;

    let planner = SqlPlanner::new(llm.clone(), Arc::new(tools), config.planner_config());
    let service = ChatService::new(store, inspector, Arc::new(planner))
        .with_history_window(config.history_window);

    let state = Arc::new(AppState {
        service: Arc::new(service),
        model_provider: llm.provider_name().to_string(),
        model: llm.model(),
    });
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    analytics.close().await;
    history.close().await;
    tracing::info!("=== SQL Chat Agent Shutting Down ===");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
