//! Tool system for the agents.
//!
//! Tools are the external information-retrieval capabilities an agent may
//! call. Every call goes through [`ToolRegistry::invoke`], which is the
//! single boundary where failures are normalized:
//!
//! - unknown tool names, tool errors, timeouts, panics and bodies that do not
//!   match the tool's success schema all become a [`ToolPayload::Error`]
//! - nothing is ever raised past the registry
//!
//! Agents hold capability *names*; the registry resolves them at call time.

pub mod fanout;
mod http;
mod reddit;
mod scholar;
mod types;
mod web;

pub use reddit::RedditSearch;
pub use scholar::ScholarSearch;
pub use types::{
    count_arg, optional_str, required_str, ToolArgs, ToolError, ToolErrorKind, ToolInvocation,
    ToolPayload,
};
pub use web::WebSearch;

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;

use crate::config::ToolsConfig;
use crate::llm::{FunctionDefinition, ToolDefinition};

/// Information about a tool for display purposes.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

/// Trait for implementing tools.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool.
    fn name(&self) -> &str;

    /// A description of what this tool does.
    fn description(&self) -> &str;

    /// JSON schema for the tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Perform the call. Errors are normalized by the registry.
    async fn call(&self, args: &ToolArgs) -> Result<Value, ToolError>;

    /// Whether `body` is a recognizable success response.
    ///
    /// Default: a JSON object carrying a `results` array.
    fn accepts(&self, body: &Value) -> bool {
        body.get("results").map_or(false, Value::is_array)
    }
}

/// Limits applied to every tool call.
#[derive(Debug, Clone)]
pub struct ToolPolicy {
    /// Upper bound for one attempt
    pub timeout: Duration,
    /// Extra attempts for transient errors (timeout, rate limit)
    pub max_retries: u32,
    /// Backoff before the first retry, doubled on each further retry
    pub retry_base_delay: Duration,
}

impl Default for ToolPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 1,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

impl ToolPolicy {
    fn retry_delay(&self, attempt: u32) -> Duration {
        self.retry_base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(Duration::from_secs(30))
    }
}

/// Registry of available tools.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    policy: ToolPolicy,
}

impl ToolRegistry {
    /// Create an empty registry with the given invocation policy.
    pub fn new(policy: ToolPolicy) -> Self {
        Self {
            tools: HashMap::new(),
            policy,
        }
    }

    /// Create a registry with the built-in search tools.
    ///
    /// Tools whose credentials are missing are still registered; calling
    /// them yields a `missing_credentials` error body.
    pub fn with_defaults(config: &ToolsConfig) -> Self {
        let mut registry = Self::new(config.policy());
        registry.register(Arc::new(WebSearch::new(config)));
        registry.register(Arc::new(ScholarSearch::new(config)));
        registry.register(Arc::new(RedditSearch::new(config)));

        tracing::info!(
            "Tool registry ready with {} tools: {}",
            registry.tools.len(),
            registry.names().join(", ")
        );
        registry
    }

    /// Register (or replace) a tool under its own name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!("Tool '{}' registered twice, keeping the latest", name);
        }
    }

    pub fn policy(&self) -> &ToolPolicy {
        &self.policy
    }

    /// Check if a tool exists by name.
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// List all available tools.
    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.names()
            .into_iter()
            .filter_map(|name| self.tools.get(&name))
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect()
    }

    /// Tool schemas in LLM-compatible format, restricted to `names`.
    ///
    /// Unknown names are skipped.
    pub fn schemas_for<'a>(&self, names: impl IntoIterator<Item = &'a String>) -> Vec<ToolDefinition> {
        names
            .into_iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| ToolDefinition {
                tool_type: "function".to_string(),
                function: FunctionDefinition {
                    name: t.name().to_string(),
                    description: t.description().to_string(),
                    parameters: t.parameters_schema(),
                },
            })
            .collect()
    }

    /// Describe the tools in `names` for a system prompt.
    pub fn describe<'a>(&self, names: impl IntoIterator<Item = &'a String>) -> Vec<ToolInfo> {
        names
            .into_iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect()
    }

    /// Invoke a tool by name.
    ///
    /// Always returns a payload: either the tool's success body or an error
    /// body. Transient errors are retried up to `policy.max_retries` times.
    pub async fn invoke(&self, name: &str, args: &ToolArgs) -> ToolPayload {
        let Some(tool) = self.tools.get(name) else {
            return ToolPayload::error(
                ToolErrorKind::UnknownTool,
                format!("unknown tool: {}", name),
            );
        };

        let mut attempt = 0;
        loop {
            let payload = self.invoke_once(tool.as_ref(), args).await;
            match payload.error_kind() {
                Some(kind) if kind.is_transient() && attempt < self.policy.max_retries => {
                    let delay = self.policy.retry_delay(attempt);
                    tracing::warn!(
                        "Tool '{}' attempt {} failed with {}, retrying in {:?}",
                        name,
                        attempt + 1,
                        kind,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                _ => return payload,
            }
        }
    }

    async fn invoke_once(&self, tool: &dyn Tool, args: &ToolArgs) -> ToolPayload {
        let call = AssertUnwindSafe(tool.call(args)).catch_unwind();

        match tokio::time::timeout(self.policy.timeout, call).await {
            Err(_) => {
                tracing::warn!(
                    "Tool '{}' timed out after {:?}",
                    tool.name(),
                    self.policy.timeout
                );
                ToolPayload::error(ToolErrorKind::UpstreamTimeout, "upstream timeout")
            }
            Ok(Err(_)) => {
                tracing::error!("Tool '{}' panicked", tool.name());
                ToolPayload::error(
                    ToolErrorKind::Internal,
                    format!("tool '{}' failed unexpectedly", tool.name()),
                )
            }
            Ok(Ok(Err(e))) => {
                tracing::warn!("Tool '{}' failed: {}", tool.name(), e);
                e.into()
            }
            Ok(Ok(Ok(body))) if tool.accepts(&body) => ToolPayload::Success(body),
            Ok(Ok(Ok(_))) => {
                tracing::warn!("Tool '{}' returned an unrecognized body", tool.name());
                ToolPayload::error(
                    ToolErrorKind::MalformedResponse,
                    "malformed upstream response",
                )
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new(ToolPolicy::default())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted tools for unit tests.

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Tool that replays a fixed outcome and counts its calls.
    pub struct FakeTool {
        pub name: String,
        pub outcome: Result<Value, ToolError>,
        pub delay: Option<Duration>,
        pub calls: AtomicUsize,
    }

    impl FakeTool {
        pub fn ok(name: &str, body: Value) -> Self {
            Self {
                name: name.to_string(),
                outcome: Ok(body),
                delay: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing(name: &str, error: ToolError) -> Self {
            Self {
                outcome: Err(error),
                ..Self::ok(name, Value::Null)
            }
        }

        pub fn slow(name: &str, delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::ok(name, serde_json::json!({"results": []}))
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Tool for FakeTool {
        fn name(&self) -> &str {
            &self.name
        }

        fn description(&self) -> &str {
            "scripted test tool"
        }

        fn parameters_schema(&self) -> Value {
            serde_json::json!({"type": "object", "properties": {"query": {"type": "string"}}})
        }

        async fn call(&self, _args: &ToolArgs) -> Result<Value, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.outcome.clone()
        }
    }
}
