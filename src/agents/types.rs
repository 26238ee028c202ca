//! Core types for the agent system.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::context::ContextError;
use crate::task::TemplateError;
use crate::tools::ToolInvocation;

/// A role-bound worker.
///
/// # Invariants
/// - `max_iterations >= 1` (checked when an orchestrator is built)
/// - `allow_delegation == false` (checked when an orchestrator is built)
/// - `tools` holds capability names, resolved through the registry at
///   call time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Agent {
    name: String,
    role: String,
    goal: String,
    backstory: String,
    tools: BTreeSet<String>,
    max_iterations: usize,
    allow_delegation: bool,
}

impl Agent {
    /// Create an agent allowed one round and no tools.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: String::new(),
            goal: String::new(),
            backstory: String::new(),
            tools: BTreeSet::new(),
            max_iterations: 1,
            allow_delegation: false,
        }
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = goal.into();
        self
    }

    pub fn backstory(mut self, backstory: impl Into<String>) -> Self {
        self.backstory = backstory.into();
        self
    }

    /// Grant one tool capability.
    pub fn tool(mut self, name: impl Into<String>) -> Self {
        self.tools.insert(name.into());
        self
    }

    pub fn tools<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools.extend(names.into_iter().map(Into::into));
        self
    }

    /// Maximum LLM rounds per task.
    pub fn max_iterations(mut self, limit: usize) -> Self {
        self.max_iterations = limit;
        self
    }

    /// Delegation is not supported; an orchestrator refuses agents with
    /// this set.
    pub fn allow_delegation(mut self, allow: bool) -> Self {
        self.allow_delegation = allow;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role_text(&self) -> &str {
        &self.role
    }

    pub fn goal_text(&self) -> &str {
        &self.goal
    }

    pub fn backstory_text(&self) -> &str {
        &self.backstory
    }

    pub fn capabilities(&self) -> &BTreeSet<String> {
        &self.tools
    }

    /// Whether the agent may call `tool`.
    pub fn can_use(&self, tool: &str) -> bool {
        self.tools.contains(tool)
    }

    pub fn iteration_limit(&self) -> usize {
        self.max_iterations
    }

    pub fn delegates(&self) -> bool {
        self.allow_delegation
    }
}

/// Result of an agent completing a task.
#[derive(Debug, Clone)]
pub struct AgentOutput {
    /// Final answer text, trimmed
    pub content: String,
    /// LLM rounds used, including the final one
    pub iterations: usize,
    /// Every tool call issued, in order, with its payload
    pub tool_calls: Vec<ToolInvocation>,
}

/// Errors that end an agent's task.
///
/// Tool failures are absent on purpose: they are fed back to the model as
/// data.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AgentError {
    #[error("iteration budget exhausted: no final answer within {limit} rounds")]
    IterationBudgetExhausted { limit: usize },

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("LLM returned an empty response")]
    EmptyResponse,

    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    #[error("context error: {0}")]
    Context(#[from] ContextError),
}
