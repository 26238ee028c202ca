//! Per-task execution output.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::TaskId;
use crate::tools::ToolInvocation;

/// Output of one completed task.
///
/// Built by the orchestrator and then moved into the run's
/// [`ContextStore`](crate::context::ContextStore), which only hands out
/// shared references, so a record is never modified after it is written.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRecord {
    task: TaskId,
    agent: String,
    completed_at: DateTime<Utc>,
    raw: String,
    structured: Option<Value>,
    contract_note: Option<String>,
    iterations: usize,
    tool_calls: Vec<ToolInvocation>,
}

impl ExecutionRecord {
    /// Create a record stamped with the current time.
    pub fn new(task: TaskId, agent: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            task,
            agent: agent.into(),
            completed_at: Utc::now(),
            raw: raw.into(),
            structured: None,
            contract_note: None,
            iterations: 0,
            tool_calls: Vec::new(),
        }
    }

    pub fn with_structured(mut self, value: Value) -> Self {
        self.structured = Some(value);
        self
    }

    /// Explain why the task's structured contract was not satisfied.
    pub fn with_contract_note(mut self, note: impl Into<String>) -> Self {
        self.contract_note = Some(note.into());
        self
    }

    pub fn with_execution(mut self, iterations: usize, tool_calls: Vec<ToolInvocation>) -> Self {
        self.iterations = iterations;
        self.tool_calls = tool_calls;
        self
    }

    pub fn task(&self) -> &TaskId {
        &self.task
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn structured(&self) -> Option<&Value> {
        self.structured.as_ref()
    }

    pub fn contract_note(&self) -> Option<&str> {
        self.contract_note.as_deref()
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn tool_calls(&self) -> &[ToolInvocation] {
        &self.tool_calls
    }

    /// Text a downstream task is shown for this record: the structured
    /// value when there is one, the raw output otherwise.
    pub fn context_text(&self) -> String {
        match &self.structured {
            Some(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| self.raw.clone())
            }
            None => self.raw.clone(),
        }
    }
}
