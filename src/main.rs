//! Parley CLI entry point.
//!
//! Provides `prompt`, for assembling (or reading back) the cached system
//! prompt, and `chat`, for a console session that exercises the full
//! conversation loop with stdin standing in for the data channel.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing::{info, warn};

use parley::bridge::{ReplySettings, StdoutChannel, TextBridge};
use parley::config::ParleyConfig;
use parley::context::HistoryWindow;
use parley::documents::DocumentExtractor;
use parley::prompt::template::load_instructions;
use parley::prompt::{
    FilePromptCache, MemoryPromptCache, PromptAssembler, PromptCache, PromptOrigin, SystemPrompt,
};
use parley::providers::azure::AzureOpenAiProvider;
use parley::realtime::{RealtimeSession, GREETING};
use parley::session::{
    spawn_sync_worker, Conversation, InMemoryRemoteSession, SessionEvent, Synchronizer,
};

/// Parley: document-grounded realtime voice agent.
#[derive(Parser)]
#[command(name = "parley", version, about)]
struct Cli {
    /// Config file path (overrides `PARLEY_CONFIG_PATH`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Print the system prompt, assembling and caching it if needed.
    Prompt {
        /// Print the realtime `session.update` event instead of the raw text.
        #[arg(long)]
        session: bool,
        /// Assemble from the documents without reading or writing the cache.
        #[arg(long)]
        no_cache: bool,
    },
    /// Start a console chat session backed by the chat model.
    Chat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ParleyConfig::load_from(path),
        None => ParleyConfig::load(),
    }
    .context("failed to load configuration")?;

    match cli.command {
        Command::Prompt { session, no_cache } => handle_prompt(config, session, no_cache).await,
        Command::Chat => handle_chat(config).await,
    }
}

/// Resolve the system prompt through the configured file cache.
async fn resolve_prompt(config: &ParleyConfig) -> anyhow::Result<SystemPrompt> {
    assemble_with(config, FilePromptCache::new(&config.paths.cache_file)).await
}

/// Run assembly off the async runtime; extraction is blocking file I/O.
async fn assemble_with<C>(config: &ParleyConfig, cache: C) -> anyhow::Result<SystemPrompt>
where
    C: PromptCache + 'static,
{
    let instructions = load_instructions(config.paths.instructions_file.as_deref())?;
    let assembler = PromptAssembler::new(
        cache,
        DocumentExtractor::with_defaults(),
        &config.paths.documents_dir,
        instructions,
    );
    let prompt = tokio::task::spawn_blocking(move || assembler.system_prompt())
        .await
        .context("prompt assembly task failed")??;
    Ok(prompt)
}

/// Print the system prompt or the realtime session event carrying it.
async fn handle_prompt(config: ParleyConfig, session: bool, no_cache: bool) -> anyhow::Result<()> {
    parley::logging::init_cli(&config.logging.level);

    let prompt = if no_cache {
        assemble_with(&config, MemoryPromptCache::new()).await?
    } else {
        resolve_prompt(&config).await?
    };
    if prompt.origin == PromptOrigin::Assembled && !no_cache {
        info!(path = %config.paths.cache_file.display(), "system prompt cached");
    }

    if session {
        let realtime = RealtimeSession::new(&config.realtime, prompt.text);
        match realtime.websocket_url() {
            Some(url) => info!(%url, "realtime endpoint"),
            None => warn!("no realtime endpoint configured"),
        }
        let event = serde_json::to_string_pretty(&realtime.session_update_event())
            .context("failed to serialize session event")?;
        println!("{event}");
    } else {
        println!("{}", prompt.text);
    }
    Ok(())
}

/// Run a console session until EOF or Ctrl-C.
async fn handle_chat(config: ParleyConfig) -> anyhow::Result<()> {
    let logs_dir = config.paths.resolve_logs_dir()?;
    let _logging_guard = parley::logging::init_production(&logs_dir, &config.logging.level)?;

    let endpoint = config
        .llm
        .endpoint
        .clone()
        .context("AZURE_OPENAI_ENDPOINT is not set")?;
    let api_key = config
        .llm
        .api_key
        .clone()
        .context("AZURE_OPENAI_API_KEY is not set")?;
    let provider = Arc::new(AzureOpenAiProvider::new(
        &endpoint,
        &config.llm.deployment,
        &config.llm.api_version,
        api_key,
    ));

    let prompt = resolve_prompt(&config).await?;
    info!(
        origin = ?prompt.origin,
        chars = prompt.text.len(),
        "system prompt ready"
    );

    let (tx, rx) = mpsc::channel(config.context.event_buffer.max(1));

    let remote = Arc::new(InMemoryRemoteSession::new());
    let (sync, worker) = spawn_sync_worker(Synchronizer::new(remote), Some(tx.downgrade()));

    let window = HistoryWindow::with_system(config.context.max_messages, prompt.text);
    let bridge = TextBridge::new(
        provider,
        Arc::new(StdoutChannel),
        ReplySettings {
            max_tokens: Some(config.llm.max_tokens),
            temperature: Some(config.llm.temperature),
        },
    );
    let conversation = Conversation::new(window, sync).with_bridge(bridge, tx.downgrade());

    println!("{GREETING}");

    let reader = tokio::spawn(read_console(tx));
    let window = conversation.run(rx).await;
    reader.abort();

    if let Err(e) = worker.await {
        warn!(error = %e, "sync worker task failed");
    }
    info!(messages = window.len(), "chat session finished");
    Ok(())
}

/// Forward stdin lines as data-channel packets.
async fn read_console(tx: mpsc::Sender<SessionEvent>) {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => {
                    if tx.send(SessionEvent::DataReceived(line.into_bytes())).await.is_err() {
                        return;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "failed to read stdin");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("received Ctrl-C");
                break;
            }
        }
    }
    let _ = tx.send(SessionEvent::Shutdown).await;
}
