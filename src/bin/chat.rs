//! crewline-chat - interactive REPL over the preset pipelines.
//!
//! Each input line is one pipeline run: a chat message by default, a topic
//! with `--report`. Ctrl-C during a run cancels it at the next stage
//! boundary; Ctrl-C at the prompt, a second Ctrl-C or EOF exits.

use std::io::Write;
use std::sync::Arc;

use clap::Parser;
use crewline::{
    agents::AgentContext,
    config::Config,
    llm::OpenAiClient,
    orchestrator::{PipelineError, PipelineOutput},
    pipeline::{current_year, ChatPipeline, TopicReport},
    tools::ToolRegistry,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "crewline-chat")]
#[command(about = "Chat with the clarify/research/plan/respond pipeline, or write topic reports")]
struct Args {
    /// Treat each line as a topic and run the research/analysis/report crew
    #[arg(short, long)]
    report: bool,

    /// Year the report research focuses on (default: current year)
    #[arg(short, long)]
    year: Option<i32>,
}

enum Preset {
    Chat(ChatPipeline),
    Report(TopicReport),
}

impl Preset {
    async fn run(&self, line: &str, token: CancellationToken) -> Result<PipelineOutput, PipelineError> {
        match self {
            Self::Chat(pipeline) => pipeline.chat_with_cancel(line, token).await,
            Self::Report(crew) => crew.report_with_cancel(line, token).await,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    // Logs go to stderr so replies stay readable on stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crewline=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env()?;
    let llm = Arc::new(OpenAiClient::new(&config.llm)?);
    let tools = Arc::new(ToolRegistry::with_defaults(&config.tools));
    let ctx = AgentContext::from_config(&config, llm, tools);

    let preset = if args.report {
        let year = args.year.unwrap_or_else(current_year);
        println!("crewline report (model {}, year {}). One topic per line; Ctrl-C or EOF to quit.", config.llm.model, year);
        Preset::Report(TopicReport::for_year(ctx, year)?)
    } else {
        println!("crewline chat (model {}). Ctrl-C or EOF to quit.", config.llm.model);
        Preset::Chat(ChatPipeline::new(ctx)?)
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let token = CancellationToken::new();
        let run = preset.run(input, token.clone());
        tokio::pin!(run);

        let result = loop {
            tokio::select! {
                result = &mut run => break result,
                _ = tokio::signal::ctrl_c() => {
                    if token.is_cancelled() {
                        return Ok(());
                    }
                    eprintln!("Cancelling after the current stage (Ctrl-C again to quit)...");
                    token.cancel();
                }
            }
        };

        match result {
            Ok(output) => println!("\n{}\n", output.final_output),
            Err(PipelineError::Cancelled { before }) => {
                println!("Cancelled before '{}'.", before)
            }
            Err(e) => eprintln!("Error: {}", e),
        }
    }

    Ok(())
}
