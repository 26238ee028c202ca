//! Task module - tasks, their instruction templates and execution records.
//!
//! Tasks are plain values: constructed once when a pipeline is assembled,
//! validated by the orchestrator, and reused across runs. Records are
//! created fresh per run.

mod record;
pub mod task;
pub mod template;

pub use record::ExecutionRecord;
pub use task::{OutputFormat, Task, TaskId};
pub use template::{TemplateError, INPUT_PLACEHOLDER};
