//! Core Task type.
//!
//! # Invariants
//! - `id` is unique within an orchestrator
//! - `context` lists upstream ids in the order their outputs are presented

use std::fmt;

use serde::{Deserialize, Serialize};

use super::template;

/// Identifier of a task within a pipeline.
///
/// Tasks are addressed by identity, never by position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Shape the task's output is post-processed into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Free text, recorded as-is
    #[default]
    Text,
    /// A JSON object is extracted into the record's structured value
    Json,
    /// A plan is extracted, validated and scored
    Plan,
}

/// A unit of pipeline work bound to exactly one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    description: String,
    expected_output: String,
    agent: String,
    context: Vec<TaskId>,
    output_format: OutputFormat,
}

impl Task {
    /// Create a task bound to `agent` with an empty instruction.
    pub fn new(id: impl Into<TaskId>, agent: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            expected_output: String::new(),
            agent: agent.into(),
            context: Vec::new(),
            output_format: OutputFormat::Text,
        }
    }

    /// Set the instruction template.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the expected-output contract shown to the agent.
    pub fn expected_output(mut self, expected_output: impl Into<String>) -> Self {
        self.expected_output = expected_output.into();
        self
    }

    /// Declare upstream dependencies, in presentation order.
    pub fn context<I, T>(mut self, upstream: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TaskId>,
    {
        self.context = upstream.into_iter().map(Into::into).collect();
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn instruction(&self) -> &str {
        &self.description
    }

    pub fn expected(&self) -> &str {
        &self.expected_output
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn dependencies(&self) -> &[TaskId] {
        &self.context
    }

    pub fn format(&self) -> OutputFormat {
        self.output_format
    }

    /// Placeholder names used by the instruction template.
    pub fn placeholders(&self) -> Vec<String> {
        template::placeholders(&self.description)
    }
}
