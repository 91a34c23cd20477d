//! tool-agent
//!
//! Runs one prompt through the agent loop against the selected backend,
//! prints the final answer on stdout and logs progress on stderr.

mod cli;
mod history;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{
    AgentBuilder, FileTranscriptStore, GenerationOptions, LlmProvider, TerminationReason,
    ToolRegistry, Transcript, TranscriptStore,
};
use agent_runtime::{
    AnthropicConfig, AnthropicProvider, ChatCompletionConfig, ChatCompletionProvider, GeminiConfig,
    GeminiProvider,
};
use agent_tools::DuckDbCli;

use crate::cli::{Cli, ProviderKind};
use crate::history::HistoryQuery;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing; stdout is reserved for the answer
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    run(cli).await
}

/// Construct the backend; missing credentials fail here, before any loop
fn build_provider(cli: &Cli) -> anyhow::Result<Arc<dyn LlmProvider>> {
    let provider: Arc<dyn LlmProvider> = match cli.provider {
        ProviderKind::Anthropic => {
            Arc::new(AnthropicProvider::from_config(AnthropicConfig::from_env()?)?)
        }
        ProviderKind::OpenAi => {
            Arc::new(ChatCompletionProvider::from_config(ChatCompletionConfig::openai_from_env()?)?)
        }
        ProviderKind::Ollama => Arc::new(ChatCompletionProvider::from_config(
            ChatCompletionConfig::ollama(&cli.ollama_base_url),
        )?),
        ProviderKind::Gemini => Arc::new(GeminiProvider::from_config(GeminiConfig::from_env()?)?),
    };
    Ok(provider)
}

fn build_tools(cli: &Cli) -> anyhow::Result<ToolRegistry> {
    let mut tools = ToolRegistry::new();

    if cli.delegate() {
        agent_tools::register_delegator_tools(&mut tools, &cli.ollama_base_url)?;
    }
    if let Some(db) = &cli.db {
        if !db.exists() {
            tracing::warn!(db = %db.display(), "Database file does not exist; duckdb will create it");
        }
        agent_tools::register_duckdb_tools(&mut tools, Arc::new(DuckDbCli::new(db)))?;
    }

    tracing::info!("Registered {} tools:", tools.len());
    for name in tools.names() {
        tracing::info!("  • {}", name);
    }
    Ok(tools)
}

/// Print past runs from the transcript directory
fn show_history(cli: &Cli, query: &HistoryQuery) -> anyhow::Result<ExitCode> {
    let dir = cli
        .transcript_dir
        .as_ref()
        .context("--transcript-dir is required to read transcripts")?;
    let store = FileTranscriptStore::new(dir)?;
    match history::render(&store, query) {
        Ok(text) => {
            println!("{text}");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{}", e.user_message());
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    if let Some(query) = cli.history_query() {
        return show_history(&cli, &query);
    }
    let prompt = cli.prompt.clone().context("--prompt is required")?;

    let provider = build_provider(&cli).context("failed to configure the LLM provider")?;
    let tools = build_tools(&cli)?;
    let model = cli.model();

    let mut builder = AgentBuilder::new()
        .provider(provider)
        .tools(tools)
        .max_iterations(cli.compute)
        .generation(GenerationOptions {
            model: model.clone(),
            max_tokens: cli.max_tokens,
            temperature: cli.temperature,
        });
    if let Some(system) = cli.resolved_system_prompt() {
        builder = builder.system_prompt(system);
    }
    let agent = builder.build()?;

    tracing::info!(
        provider = agent.provider().name(),
        %model,
        max_loops = cli.compute,
        "Starting agent"
    );

    let started_at = chrono::Utc::now();
    let (conversation, outcome) = agent.ask(&prompt).await;

    if let Some(dir) = &cli.transcript_dir {
        let transcript =
            Transcript::record(agent.provider().name(), &model, started_at, &conversation, &outcome);
        // a failed write must not hide the run's own result
        if let Err(e) = FileTranscriptStore::new(dir).and_then(|store| store.save(&transcript)) {
            tracing::error!(error = %e, "Failed to write transcript");
        }
    }

    match outcome {
        Ok(run) => {
            if let Some(answer) = &run.answer {
                println!("{answer}");
            }
            if run.reason() == Some(TerminationReason::NoOpTurn) {
                tracing::warn!("Agent ended without delivering a final answer");
            } else {
                tracing::info!(iterations = run.state.iteration_count, "Agent run completed successfully");
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            tracing::error!(error = %e, "Agent run failed");
            eprintln!("{}", e.user_message());
            Ok(ExitCode::FAILURE)
        }
    }
}
