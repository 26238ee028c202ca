//! HTTP API for the chat pipeline.
//!
//! ## Endpoints
//!
//! - `POST /api/chat` - Answer one message through the full pipeline
//! - `POST /api/report` - Research a topic and write a report
//! - `GET /api/health` - Health check

mod routes;
pub mod types;

pub use routes::{router, serve, AppState};
pub use types::*;
