//! Agents module - role-bound workers and their bounded execution loop.
//!
//! # Design Principles
//! - Agents are plain values: persona, capability names, iteration limit
//! - Capabilities are resolved through the tool registry at call time
//! - No delegation: every task is resolved by its single bound agent
//! - Tool failures are data for the model, never task failures

mod context;
mod executor;
mod types;

pub use context::AgentContext;
pub use executor::{AgentExecutor, TaskInput};
pub use types::{Agent, AgentError, AgentOutput};
