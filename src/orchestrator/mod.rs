//! Orchestrator - runs a validated task list, one task at a time.
//!
//! # Guarantees
//! - each task runs at most once, in list order (which validation has
//!   proven consistent with every dependency)
//! - a task sees exactly its declared upstream records plus the seed
//! - a failed task aborts the run; nothing is skipped or defaulted
//! - cancellation is honoured only between tasks

mod builder;

pub use builder::OrchestratorBuilder;

use tracing::Instrument;
use uuid::Uuid;

use crate::agents::{Agent, AgentContext, AgentError, AgentExecutor, TaskInput};
use crate::context::{ContextError, ContextStore};
use crate::planning;
use crate::task::{template, ExecutionRecord, OutputFormat, Task, TaskId, INPUT_PLACEHOLDER};
use crate::tools::ToolRegistry;

/// Invalid agent or task definitions, reported before execution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineConfigError {
    #[error("pipeline has no tasks")]
    NoTasks,

    #[error("agent '{0}' is defined more than once")]
    DuplicateAgent(String),

    #[error("task '{0}' is defined more than once")]
    DuplicateTask(TaskId),

    #[error("task id '{0}' is reserved for the seed input")]
    ReservedTaskId(TaskId),

    #[error("task id '{0}' must be non-empty and use only letters, digits, '_' or '-'")]
    InvalidTaskId(TaskId),

    #[error("agent '{0}' has an iteration limit of 0")]
    ZeroIterations(String),

    #[error("agent '{0}' enables delegation, which is not supported")]
    DelegationEnabled(String),

    #[error("agent '{agent}' references unavailable tool '{tool}'")]
    UnknownTool { agent: String, tool: String },

    #[error("task '{task}' is bound to unknown agent '{agent}'")]
    UnknownAgent { task: TaskId, agent: String },

    #[error("task '{0}' depends on itself")]
    SelfDependency(TaskId),

    #[error("task '{task}' lists dependency '{dependency}' twice")]
    DuplicateDependency { task: TaskId, dependency: TaskId },

    #[error("task '{task}' depends on '{dependency}', which runs later")]
    ForwardReference { task: TaskId, dependency: TaskId },

    #[error("task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency { task: TaskId, dependency: TaskId },

    #[error("task '{task}' uses placeholder '{placeholder}', which is neither 'input' nor a declared dependency")]
    UnknownPlaceholder { task: TaskId, placeholder: String },
}

/// Why a run did not produce a result.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("task '{task}' (agent '{agent}') failed: {source}")]
    TaskFailed {
        task: TaskId,
        agent: String,
        source: AgentError,
    },

    #[error("run cancelled before task '{before}'")]
    Cancelled { before: TaskId },

    #[error(transparent)]
    Context(#[from] ContextError),
}

impl PipelineError {
    /// Task the run stopped at, when there is one.
    pub fn task(&self) -> Option<&TaskId> {
        match self {
            Self::TaskFailed { task, .. } => Some(task),
            Self::Cancelled { before } => Some(before),
            Self::Context(_) => None,
        }
    }
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub run_id: Uuid,
    /// Raw output of the terminal task
    pub final_output: String,
    /// Every task's record, in completion order
    pub records: ContextStore,
}

/// A validated, reusable pipeline.
///
/// Holds static configuration only; every run gets its own context store,
/// so one orchestrator can serve concurrent runs behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    agents: Vec<Agent>,
    tasks: Vec<Task>,
    /// Index into `agents` for each task
    bindings: Vec<usize>,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// Validate and build from ordered collections.
    pub fn new(
        agents: Vec<Agent>,
        tasks: Vec<Task>,
        tools: &ToolRegistry,
    ) -> Result<Self, PipelineConfigError> {
        OrchestratorBuilder::new().agents(agents).tasks(tasks).build(tools)
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Task ids in the order they run.
    pub fn execution_order(&self) -> impl Iterator<Item = &TaskId> {
        self.tasks.iter().map(Task::id)
    }

    /// Run every task against `seed`.
    pub async fn run(&self, seed: &str, ctx: &AgentContext) -> Result<PipelineOutput, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("pipeline_run", %run_id);
        self.run_tasks(run_id, seed, ctx).instrument(span).await
    }

    async fn run_tasks(
        &self,
        run_id: Uuid,
        seed: &str,
        ctx: &AgentContext,
    ) -> Result<PipelineOutput, PipelineError> {
        tracing::info!("Starting run with {} tasks", self.tasks.len());
        let mut store = ContextStore::new();

        for (task, &binding) in self.tasks.iter().zip(&self.bindings) {
            if ctx.is_cancelled() {
                tracing::warn!("Run cancelled before task '{}'", task.id());
                return Err(PipelineError::Cancelled {
                    before: task.id().clone(),
                });
            }

            let agent = &self.agents[binding];
            tracing::info!("Task '{}' started (agent '{}')", task.id(), agent.name());

            let record = self
                .run_task(task, agent, seed, &store, ctx)
                .await
                .map_err(|source| {
                    tracing::error!("Task '{}' failed: {}", task.id(), source);
                    PipelineError::TaskFailed {
                        task: task.id().clone(),
                        agent: agent.name().to_string(),
                        source,
                    }
                })?;

            tracing::info!(
                "Task '{}' finished in {} rounds with {} tool calls",
                task.id(),
                record.iterations(),
                record.tool_calls().len()
            );
            store.record(record)?;
        }

        let final_output = store
            .last()
            .map(|record| record.raw().to_string())
            .unwrap_or_default();
        tracing::info!("Run finished");

        Ok(PipelineOutput {
            run_id,
            final_output,
            records: store,
        })
    }

    async fn run_task(
        &self,
        task: &Task,
        agent: &Agent,
        seed: &str,
        store: &ContextStore,
        ctx: &AgentContext,
    ) -> Result<ExecutionRecord, AgentError> {
        let upstream = store.bundle(task.dependencies())?;
        let instruction = template::render(task.instruction(), |name| {
            if name == INPUT_PLACEHOLDER {
                Some(seed)
            } else {
                upstream
                    .iter()
                    .copied()
                    .find(|record| record.task().as_str() == name)
                    .map(ExecutionRecord::raw)
            }
        })?;

        let input = TaskInput {
            instruction,
            expected_output: task.expected(),
            upstream,
            seed,
        };
        let output = AgentExecutor::new(agent, ctx).execute(&input).await?;

        let record = ExecutionRecord::new(task.id().clone(), agent.name(), output.content)
            .with_execution(output.iterations, output.tool_calls);
        Ok(apply_format(record, task, ctx))
    }
}

/// Attach the structured value a task's output format asks for.
///
/// Never fails: when the contract cannot be met the raw output stays the
/// record's content and the note says why.
fn apply_format(record: ExecutionRecord, task: &Task, ctx: &AgentContext) -> ExecutionRecord {
    let outcome = match task.format() {
        OutputFormat::Text => return record,
        OutputFormat::Json => planning::extract_json(record.raw())
            .ok_or_else(|| "no JSON object found in output".to_string()),
        OutputFormat::Plan => planning::score_output(record.raw(), &ctx.plan_rules)
            .map_err(|e| format!("plan rejected: {}", e))
            .and_then(|scored| {
                serde_json::to_value(&scored).map_err(|e| format!("plan not serializable: {}", e))
            }),
    };

    match outcome {
        Ok(value) => record.with_structured(value),
        Err(note) => {
            tracing::warn!("Task '{}' output contract not met: {}", task.id(), note);
            record.with_contract_note(note)
        }
    }
}
