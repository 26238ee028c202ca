//! Configuration management for crewline.
//!
//! Built once at startup and passed by reference into the LLM client, the
//! tool registry and the pipeline factory. Nothing below the binaries reads
//! the process environment.
//!
//! Environment variables read by [`Config::from_env`]:
//! - `LLM_API_KEY` (or `OPENAI_API_KEY`) - Required. Key for the chat-completions backend.
//! - `LLM_BASE_URL` - Optional. Defaults to `https://api.openai.com/v1`.
//! - `LLM_MODEL` - Optional. Defaults to `gpt-4o-mini`.
//! - `LLM_TEMPERATURE` - Optional. Defaults to `0.7`.
//! - `LLM_MAX_TOKENS` - Optional. No limit when unset.
//! - `SERPAPI_KEY` - Optional. Enables `web_search`.
//! - `REDDIT_CLIENT_ID`, `REDDIT_CLIENT_SECRET`, `REDDIT_USER_AGENT` - Optional. Enable `reddit_search`.
//! - `OPENALEX_MAILTO` - Optional. Polite-pool address for `scholar_search`.
//! - `TOOL_TIMEOUT_SECS` - Optional. Per-call tool timeout. Defaults to `30`.
//! - `TOOL_MAX_RETRIES` - Optional. Retries for transient tool errors. Defaults to `1`.
//! - `PLAN_IMPACT_TOLERANCE` - Optional. Allowed drift of the plan impact sum from 100. Defaults to `5`.
//! - `HOST` / `PORT` - Optional. HTTP bind address. Defaults to `127.0.0.1:8000`.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::planning::PlanRules;
use crate::tools::ToolPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Chat-completions backend settings.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`)
    pub base_url: String,
    pub model: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
}

impl LlmConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.into(),
            temperature: Some(0.7),
            max_tokens: None,
        }
    }
}

/// Reddit script-app credentials.
#[derive(Debug, Clone)]
pub struct RedditCredentials {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub user_agent: String,
}

impl RedditCredentials {
    /// `(client_id, client_secret)` when both are present and non-empty.
    pub fn pair(&self) -> Option<(&str, &str)> {
        match (self.client_id.as_deref(), self.client_secret.as_deref()) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => Some((id, secret)),
            _ => None,
        }
    }
}

impl Default for RedditCredentials {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            user_agent: "crewline/0.1".to_string(),
        }
    }
}

/// Credentials and limits for the information-retrieval tools.
#[derive(Debug, Clone)]
pub struct ToolsConfig {
    pub serpapi_key: Option<String>,
    pub reddit: RedditCredentials,
    pub openalex_mailto: String,
    /// Upper bound for a single tool call
    pub timeout: Duration,
    /// Retries for transient tool errors (timeouts, rate limits)
    pub max_retries: u32,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            serpapi_key: None,
            reddit: RedditCredentials::default(),
            openalex_mailto: "anonymous@example.com".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 1,
        }
    }
}

impl ToolsConfig {
    /// Invocation policy applied by the tool registry.
    pub fn policy(&self) -> ToolPolicy {
        ToolPolicy {
            timeout: self.timeout,
            max_retries: self.max_retries,
            ..ToolPolicy::default()
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub tools: ToolsConfig,
    pub plan: PlanRules,
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if no LLM API key is set and
    /// `ConfigError::InvalidValue` for unparseable numeric values.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env_opt("LLM_API_KEY")
            .or_else(|| env_opt("OPENAI_API_KEY"))
            .ok_or_else(|| ConfigError::MissingEnvVar("LLM_API_KEY".to_string()))?;

        let mut llm = LlmConfig::new(
            api_key,
            env_opt("LLM_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
        );
        if let Some(base_url) = env_opt("LLM_BASE_URL") {
            llm.base_url = base_url;
        }
        if let Some(temperature) = env_parse::<f64>("LLM_TEMPERATURE")? {
            llm.temperature = Some(temperature);
        }
        llm.max_tokens = env_parse::<u64>("LLM_MAX_TOKENS")?;

        let defaults = ToolsConfig::default();
        let tools = ToolsConfig {
            serpapi_key: env_opt("SERPAPI_KEY"),
            reddit: RedditCredentials {
                client_id: env_opt("REDDIT_CLIENT_ID"),
                client_secret: env_opt("REDDIT_CLIENT_SECRET"),
                user_agent: env_opt("REDDIT_USER_AGENT").unwrap_or(defaults.reddit.user_agent),
            },
            openalex_mailto: env_opt("OPENALEX_MAILTO").unwrap_or(defaults.openalex_mailto),
            timeout: env_parse::<u64>("TOOL_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_retries: env_parse::<u32>("TOOL_MAX_RETRIES")?.unwrap_or(defaults.max_retries),
        };

        let mut plan = PlanRules::default();
        if let Some(tolerance) = env_parse::<f64>("PLAN_IMPACT_TOLERANCE")? {
            if !tolerance.is_finite() || tolerance < 0.0 {
                return Err(ConfigError::InvalidValue(
                    "PLAN_IMPACT_TOLERANCE".to_string(),
                    format!("{} is not a non-negative number", tolerance),
                ));
            }
            plan.impact_tolerance = tolerance;
        }

        Ok(Self {
            llm,
            tools,
            plan,
            host: env_opt("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: env_parse::<u16>("PORT")?.unwrap_or(8000),
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            llm: LlmConfig::new(api_key, model),
            tools: ToolsConfig::default(),
            plan: PlanRules::default(),
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Non-empty value of an environment variable.
fn env_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(name)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
        })
        .transpose()
}
