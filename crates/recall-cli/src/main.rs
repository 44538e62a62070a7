use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use recall_core::{Memory, Message};
use recall_memory::{
    load_messages, resolve_memory_path, trim_messages, MemoryAssistant, MemoryConfig,
    MemoryStrategy, PersistedLog, SizeCounter,
};

#[derive(Parser)]
#[command(name = "recall", version, about = "Inspect and append to conversation memory logs")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print every message in a log
    Show {
        log: PathBuf,
        /// Only print the last N messages
        #[arg(short, long)]
        limit: Option<usize>,
        /// Print raw JSON records
        #[arg(long)]
        json: bool,
    },
    /// Print the recent-history window a memory would hold after loading the log
    Window {
        log: PathBuf,
        #[arg(short, long, default_value_t = 10)]
        max: usize,
    },
    /// Append one turn to a log
    Add {
        log: PathBuf,
        #[arg(short, long)]
        prompt: String,
        #[arg(short, long)]
        answer: String,
        /// Memory config (YAML); strategy and path are overridden
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the history file location for an agent, creating it if needed
    Resolve { agent: String },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_messages(messages: &[Message]) {
    for message in messages {
        println!("[{}] {}: {}", message.id(), message.role(), message.content());
    }
}

async fn show(log: &Path, limit: Option<usize>, json: bool) -> Result<()> {
    if !log.exists() {
        bail!("log not found: {}", log.display());
    }
    let messages = PersistedLog::new(log).read_all().await;
    let start = limit.map_or(0, |n| messages.len().saturating_sub(n));
    let messages = &messages[start..];

    if json {
        println!("{}", serde_json::to_string_pretty(messages)?);
    } else {
        print_messages(messages);
    }
    Ok(())
}

async fn window(log: &Path, max: usize) -> Result<()> {
    if max == 0 {
        bail!("--max must be greater than zero");
    }
    let messages = load_messages(log).await;
    let kept = trim_messages(messages, max, &SizeCounter::Count);
    print_messages(&kept);
    Ok(())
}

async fn add(
    log: PathBuf,
    prompt: &str,
    answer: &str,
    config: Option<PathBuf>,
    verbose: bool,
) -> Result<()> {
    let config = match config {
        Some(path) => MemoryConfig::from_file(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => MemoryConfig::default(),
    };
    let debug = config.debug || verbose;
    let mut config = config.with_debug(debug);
    config.strategy = MemoryStrategy::History;
    config.memory_path = Some(log.clone());
    // one-shot process: the final flush in stop() is the only save needed
    config.auto_save_interval_secs = 0;

    let memory = MemoryAssistant::builder(config).build()?;
    memory.load(&log).await;
    memory.add_message(prompt, answer).await;
    memory.stop().await;

    tracing::info!(path = %log.display(), "Turn appended");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Show { log, limit, json } => show(&log, limit, json).await,
        Command::Window { log, max } => window(&log, max).await,
        Command::Add {
            log,
            prompt,
            answer,
            config,
        } => add(log, &prompt, &answer, config, cli.verbose).await,
        Command::Resolve { agent } => {
            let path = resolve_memory_path(&agent)?;
            println!("{}", path.display());
            Ok(())
        }
    }
}
