//! Service configuration
//!
//! Every setting can be given as a command-line flag or through the
//! environment (a `.env` file is loaded first by the binary).

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

use crate::agent::{EarlyStopping, PlannerConfig, DEFAULT_MAX_ITERATIONS};
use crate::core::{AgentError, AgentResult};
use crate::llm::{GenerationSettings, ProviderKind, ProviderSettings};
use crate::logging::LogFormat;
use crate::service::DEFAULT_HISTORY_WINDOW;
use crate::session::DEFAULT_MESSAGE_TABLE;
use crate::sql::PoolSettings;
use crate::tools::sql::DEFAULT_MAX_ROWS;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "sql-chat-agent",
    version,
    about = "Chat backend answering business questions from a SQL database"
)]
pub struct ServiceConfig {
    /// Address the HTTP API listens on
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:8000")]
    pub bind_addr: SocketAddr,

    /// SQLite database holding the analytic tables and the chat history
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://bi.db")]
    pub database_url: String,

    /// Maximum pooled connections per pool
    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 5)]
    pub db_max_connections: u32,

    /// Language model backend
    #[arg(long, env = "MODEL_PROVIDER", value_enum, default_value = "vertexai")]
    pub model_provider: ProviderKind,

    /// Model name (provider default when unset)
    #[arg(long, env = "MODEL_NAME")]
    pub model_name: Option<String>,

    /// Legacy name of MODEL_NAME
    #[arg(long, env = "VERTEX_MODEL_NAME", hide = true)]
    pub vertex_model_name: Option<String>,

    #[arg(long, env = "VERTEX_PROJECT_ID")]
    pub vertex_project_id: Option<String>,

    #[arg(long, env = "VERTEX_LOCATION", default_value = "us-central1")]
    pub vertex_location: String,

    /// OAuth bearer token for Vertex AI
    #[arg(long, env = "VERTEX_ACCESS_TOKEN", hide_env_values = true)]
    pub vertex_access_token: Option<String>,

    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub anthropic_api_key: Option<String>,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Override of the provider base URL (proxies, compatible servers)
    #[arg(long, env = "LLM_BASE_URL")]
    pub llm_base_url: Option<String>,

    /// Seconds before a model call is abandoned
    #[arg(long, env = "LLM_TIMEOUT_SECS", default_value_t = 60)]
    pub llm_timeout_secs: u64,

    #[arg(long, env = "MAX_OUTPUT_TOKENS", default_value_t = 1024)]
    pub max_output_tokens: u32,

    #[arg(long, env = "TEMPERATURE", default_value_t = 0.2)]
    pub temperature: f32,

    /// Maximum model calls per question
    #[arg(long, env = "AGENT_MAX_ITERATIONS", default_value_t = DEFAULT_MAX_ITERATIONS)]
    pub max_iterations: usize,

    /// What to answer when the iteration bound is reached
    #[arg(long, env = "AGENT_EARLY_STOPPING", value_enum, default_value = "stop")]
    pub early_stopping: EarlyStopping,

    /// Past messages given to the model as context
    #[arg(long, env = "HISTORY_WINDOW", default_value_t = DEFAULT_HISTORY_WINDOW)]
    pub history_window: usize,

    /// Table holding the chat messages
    #[arg(long, env = "CHAT_HISTORY_TABLE", default_value = DEFAULT_MESSAGE_TABLE)]
    pub chat_history_table: String,

    #[arg(long, env = "SQL_STATEMENT_TIMEOUT_SECS", default_value_t = 15)]
    pub statement_timeout_secs: u64,

    /// Rows shown to the model per query
    #[arg(long, env = "SQL_MAX_ROWS", default_value_t = DEFAULT_MAX_ROWS)]
    pub max_rows: usize,

    /// Comma-separated tables visible to the model (all when empty)
    #[arg(long, env = "SQL_INCLUDE_TABLES", value_delimiter = ',')]
    pub include_tables: Vec<String>,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "pretty")]
    pub log_format: LogFormat,
}

impl ServiceConfig {
    /// Reject settings that cannot work together
    pub fn validate(&self) -> AgentResult<()> {
        self.planner_config().validate()?;

        if self.max_rows == 0 {
            return Err(AgentError::InvalidConfig(
                "SQL_MAX_ROWS must be at least 1".to_string(),
            ));
        }
        if self.statement_timeout_secs == 0 {
            return Err(AgentError::InvalidConfig(
                "SQL_STATEMENT_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }
        if self.db_max_connections == 0 {
            return Err(AgentError::InvalidConfig(
                "DB_MAX_CONNECTIONS must be at least 1".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(AgentError::InvalidConfig(
                "TEMPERATURE must be between 0 and 2".to_string(),
            ));
        }
        if self.max_output_tokens == 0 {
            return Err(AgentError::InvalidConfig(
                "MAX_OUTPUT_TOKENS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn planner_config(&self) -> PlannerConfig {
        PlannerConfig::new()
            .with_max_iterations(self.max_iterations)
            .with_early_stopping(self.early_stopping)
            .with_llm_timeout(self.llm_timeout())
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.db_max_connections,
            ..PoolSettings::default()
        }
    }

    pub fn statement_timeout(&self) -> Duration {
        Duration::from_secs(self.statement_timeout_secs)
    }

    /// Table allow-list with blanks removed
    pub fn include_tables(&self) -> Vec<String> {
        self.include_tables
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }

    pub fn provider_settings(&self) -> ProviderSettings {
        let api_key = match self.model_provider {
            ProviderKind::Gemini => self.gemini_api_key.clone(),
            ProviderKind::Anthropic => self.anthropic_api_key.clone(),
            ProviderKind::Openai => self.openai_api_key.clone(),
            ProviderKind::VertexAi | ProviderKind::Fake => None,
        };

        ProviderSettings {
            kind: self.model_provider,
            model: self.model_name.clone().or_else(|| self.vertex_model_name.clone()),
            api_key,
            vertex_project_id: self.vertex_project_id.clone(),
            vertex_location: self.vertex_location.clone(),
            vertex_access_token: self.vertex_access_token.clone(),
            base_url: self.llm_base_url.clone(),
            generation: GenerationSettings {
                max_output_tokens: self.max_output_tokens,
                temperature: self.temperature,
            },
            request_timeout: self.llm_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ServiceConfig {
        let mut argv = vec!["sql-chat-agent"];
        argv.extend_from_slice(args);
        ServiceConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_flags_map_to_settings() {
        let config = parse(&[
            "--model-provider",
            "anthropic",
            "--anthropic-api-key",
            "sk-test",
            "--max-iterations",
            "4",
            "--early-stopping",
            "generate",
            "--include-tables",
            "core_agent, core_indicator,",
        ]);
        assert!(config.validate().is_ok());

        let provider = config.provider_settings();
        assert_eq!(provider.kind, ProviderKind::Anthropic);
        assert_eq!(provider.api_key.as_deref(), Some("sk-test"));
        assert_eq!(provider.generation.max_output_tokens, 1024);

        let planner = config.planner_config();
        assert_eq!(planner.max_iterations, 4);
        assert_eq!(planner.early_stopping, EarlyStopping::Generate);
        assert_eq!(config.include_tables(), vec!["core_agent", "core_indicator"]);
    }

    #[test]
    fn test_legacy_model_name_is_used() {
        let config = parse(&["--model-provider", "vertex", "--vertex-model-name", "gemini-2.0-flash"]);
        assert_eq!(config.model_provider, ProviderKind::VertexAi);
        assert_eq!(
            config.provider_settings().model.as_deref(),
            Some("gemini-2.0-flash")
        );
    }

    #[test]
    fn test_validate_rejects_zero_bounds() {
        let config = parse(&["--model-provider", "fake", "--max-iterations", "0"]);
        assert!(matches!(config.validate(), Err(AgentError::InvalidConfig(_))));

        let config = parse(&["--model-provider", "fake", "--max-rows", "0"]);
        assert!(matches!(config.validate(), Err(AgentError::InvalidConfig(_))));

        let config = parse(&["--model-provider", "fake", "--llm-timeout-secs", "0"]);
        assert!(matches!(config.validate(), Err(AgentError::InvalidConfig(_))));
    }

    #[test]
    fn test_llm_timeout_reaches_planner_and_provider() {
        let config = parse(&["--model-provider", "fake", "--llm-timeout-secs", "20"]);
        assert_eq!(config.planner_config().llm_timeout, Duration::from_secs(20));
        assert_eq!(config.provider_settings().request_timeout, Duration::from_secs(20));
    }
}
