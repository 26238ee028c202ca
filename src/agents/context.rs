//! Agent execution context - the collaborators shared by every task of a run.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::llm::LlmClient;
use crate::planning::PlanRules;
use crate::tools::ToolRegistry;

/// Shared context passed to the orchestrator and its agents.
///
/// # Thread Safety
/// Cheap to clone: the client and registry are shared behind `Arc`, so one
/// context can serve concurrent runs. Each run carries its own
/// cancellation token.
#[derive(Clone)]
pub struct AgentContext {
    /// LLM client for model calls
    pub llm: Arc<dyn LlmClient>,

    /// Tool registry every call is dispatched through
    pub tools: Arc<ToolRegistry>,

    /// Model name passed to the client
    pub model: String,

    /// Limits applied when scoring plans
    pub plan_rules: PlanRules,

    /// Optional cancellation token, checked at task boundaries.
    pub cancel_token: Option<CancellationToken>,
}

impl AgentContext {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>, model: impl Into<String>) -> Self {
        Self {
            llm,
            tools,
            model: model.into(),
            plan_rules: PlanRules::default(),
            cancel_token: None,
        }
    }

    /// Context using the model and plan rules from `config`.
    pub fn from_config(config: &Config, llm: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            plan_rules: config.plan.clone(),
            ..Self::new(llm, tools, config.llm.model.clone())
        }
    }

    pub fn with_plan_rules(mut self, rules: PlanRules) -> Self {
        self.plan_rules = rules;
        self
    }

    /// Copy of this context bound to `token`.
    pub fn with_cancel_token(&self, token: CancellationToken) -> Self {
        Self {
            cancel_token: Some(token),
            ..self.clone()
        }
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token
            .as_ref()
            .map_or(false, CancellationToken::is_cancelled)
    }
}
