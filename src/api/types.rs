//! API request and response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::orchestrator::PipelineOutput;
use crate::task::{ExecutionRecord, TaskId};

/// Request to answer one user message.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// The user's message (the pipeline seed)
    pub message: String,
}

/// Request for a topic report.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportRequest {
    /// Topic to research (the crew's seed)
    pub topic: String,
}

/// One completed pipeline stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageSummary {
    pub task: TaskId,
    pub agent: String,
    pub completed_at: DateTime<Utc>,
}

impl From<&ExecutionRecord> for StageSummary {
    fn from(record: &ExecutionRecord) -> Self {
        Self {
            task: record.task().clone(),
            agent: record.agent().to_string(),
            completed_at: record.completed_at(),
        }
    }
}

/// Response to a chat or report request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    /// Final output of the last task (the reply or the report)
    pub reply: String,

    pub run_id: Uuid,

    /// Stages in execution order
    pub stages: Vec<StageSummary>,
}

impl From<PipelineOutput> for ChatReply {
    fn from(output: PipelineOutput) -> Self {
        Self {
            stages: output.records.records().map(StageSummary::from).collect(),
            reply: output.final_output,
            run_id: output.run_id,
        }
    }
}

/// Error body for failed requests.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,

    /// Task that failed or was about to run, if any
    pub task: Option<TaskId>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            task: None,
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}
