//! crewline - HTTP Server Entry Point
//!
//! Starts the HTTP server that exposes the chat and topic report pipelines.

use std::sync::Arc;

use crewline::{
    agents::AgentContext,
    api,
    config::Config,
    llm::OpenAiClient,
    pipeline::{ChatPipeline, TopicReport},
    tools::ToolRegistry,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crewline=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Loaded configuration: model={}, base_url={}",
        config.llm.model, config.llm.base_url
    );

    let llm = Arc::new(OpenAiClient::new(&config.llm)?);
    let tools = Arc::new(ToolRegistry::with_defaults(&config.tools));

    let ctx = AgentContext::from_config(&config, llm, tools);
    let pipeline = ChatPipeline::new(ctx.clone())?;
    let report = TopicReport::new(ctx)?;

    info!("Starting server on {}:{}", config.host, config.port);
    api::serve(&config, pipeline, report).await?;

    Ok(())
}
