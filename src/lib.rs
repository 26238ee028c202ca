//! # crewline
//!
//! A sequential multi-agent pipeline that turns one user message into a
//! researched, prioritized plan.
//!
//! ## Architecture
//!
//! ```text
//!   seed ──▶ clarify ──▶ research ──▶ plan ──▶ respond ──▶ reply
//!              │            │           │          │
//!              └────────────┴─────┬─────┴──────────┘
//!                                 ▼
//!                          ┌──────────────┐
//!                          │ ContextStore │  one record per task
//!                          └──────────────┘
//! ```
//!
//! ## Task Flow
//! 1. The orchestrator validates agents and tasks before any run
//! 2. Each task gets its rendered instruction and its declared upstream records
//! 3. The bound agent loops over the LLM and its permitted tools
//! 4. `Json` and `Plan` outputs are extracted, plans are scored and ranked
//!
//! ## Modules
//! - `orchestrator`: validation and sequential execution
//! - `agents`: agent definitions and the bounded tool-calling executor
//! - `tools`: web, scholarly and Reddit search behind one registry
//! - `planning`: plan validation and priority scoring
//! - `pipeline`: the default four-stage chatbot and the topic report crew

pub mod agents;
pub mod api;
pub mod config;
pub mod context;
pub mod llm;
pub mod orchestrator;
pub mod pipeline;
pub mod planning;
pub mod task;
pub mod tools;

pub use config::Config;
pub use orchestrator::{Orchestrator, PipelineError, PipelineOutput};
pub use pipeline::{ChatPipeline, TopicReport};
