//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::orchestrator::{PipelineError, PipelineOutput};
use crate::pipeline::{ChatPipeline, TopicReport};

use super::types::*;

/// Shared application state.
pub struct AppState {
    /// Validated pipelines; each request gets its own run
    pub pipeline: Arc<ChatPipeline>,
    pub report: Arc<TopicReport>,
}

type ApiError = (StatusCode, Json<ErrorBody>);

/// Build the router with CORS and request tracing.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/report", post(report))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(
    config: &Config,
    pipeline: ChatPipeline,
    report: TopicReport,
) -> anyhow::Result<()> {
    let state = Arc::new(AppState {
        pipeline: Arc::new(pipeline),
        report: Arc::new(report),
    });
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Run the pipeline on one message.
async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    let message = non_empty(&req.message, "message")?;
    respond("Chat", state.pipeline.chat(message).await)
}

/// Run the topic report crew.
async fn report(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReportRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    let topic = non_empty(&req.topic, "topic")?;
    respond("Report", state.report.report(topic).await)
}

fn non_empty<'a>(value: &'a str, field: &str) -> Result<&'a str, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorBody::new(format!("{} must not be empty", field))),
        ));
    }
    Ok(value)
}

fn respond(
    label: &str,
    result: Result<PipelineOutput, PipelineError>,
) -> Result<Json<ChatReply>, ApiError> {
    match result {
        Ok(output) => {
            tracing::info!("{} run {} answered", label, output.run_id);
            Ok(Json(ChatReply::from(output)))
        }
        Err(e) => {
            tracing::error!("{} run failed: {}", label, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: e.to_string(),
                    task: e.task().cloned(),
                }),
            ))
        }
    }
}
