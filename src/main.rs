//! AgentFlow - turn project briefs into tracked, routed tasks.
//!
//! `agentflow serve` runs the HTTP/websocket service; the other subcommands
//! are one-shot helpers around the same components.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use agentflow::ai::OpenAICompatProvider;
use agentflow::app::embedder_from_config;
use agentflow::core::Config;
use agentflow::index::{ContextRetriever, FileIndexStore};
use agentflow::workflow::Decomposer;
use agentflow::App;

/// Decompose project briefs into tasks routed between AI workers and humans
#[derive(Parser)]
#[command(name = "agentflow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of the discovered one
    #[arg(short, long, global = true, env = "AGENTFLOW_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP and websocket service
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Decompose a brief without creating or running any task
    Decompose {
        /// Brief file (text, markdown or PDF text)
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Search the index of a project run
    Query {
        /// Project id
        project: Uuid,

        /// Free-text query
        text: String,

        /// Number of matches
        #[arg(short, default_value_t = 3)]
        k: usize,
    },

    /// Show configuration
    Config {
        /// Show config directory path
        #[arg(long)]
        path: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry().with(fmt::layer().with_target(false)).with(filter).init();

    match cli.command {
        Commands::Serve { host, port } => cmd_serve(cli.config.as_deref(), host, port).await,
        Commands::Decompose { file, format } => {
            cmd_decompose(cli.config.as_deref(), &file, format).await
        }
        Commands::Query { project, text, k } => {
            cmd_query(cli.config.as_deref(), project, &text, k).await
        }
        Commands::Config { path } => cmd_config(cli.config.as_deref(), path),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_with_overrides(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Config::load(),
    }
}

/// Run the service.
async fn cmd_serve(
    config_path: Option<&Path>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    App::new(config)?.serve().await
}

/// Dry-run decomposition of a brief file.
async fn cmd_decompose(
    config_path: Option<&Path>,
    file: &Path,
    format: OutputFormat,
) -> Result<()> {
    let config = load_config(config_path)?;
    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let brief = String::from_utf8_lossy(&bytes);

    let completion = Arc::new(OpenAICompatProvider::from_config(&config.llm)?);
    let decomposer = Decomposer::new(
        completion,
        config.llm.decompose_temperature,
        config.llm.decompose_max_tokens,
    );
    let decomposition = decomposer.decompose(Uuid::new_v4(), &brief).await?;

    match format {
        OutputFormat::Json => {
            let items: Vec<_> = decomposition
                .items
                .iter()
                .map(|item| {
                    json!({
                        "title": item.title,
                        "routed_to": item.executor_kind,
                        "why": item.rationale,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        OutputFormat::Text => {
            for item in &decomposition.items {
                match &item.rationale {
                    Some(why) => println!("[{}] {} - {}", item.executor_kind, item.title, why),
                    None => println!("[{}] {}", item.executor_kind, item.title),
                }
            }
            println!("\nTotal: {} tasks", decomposition.items.len());
        }
    }

    Ok(())
}

/// Query a persisted project index.
async fn cmd_query(config_path: Option<&Path>, project: Uuid, text: &str, k: usize) -> Result<()> {
    let config = load_config(config_path)?;
    let retriever = ContextRetriever::new(
        Arc::new(FileIndexStore::new(&config.storage.data_dir)),
        embedder_from_config(&config.embeddings)?,
    );

    let matches = retriever.query_records(project, text, k).await?;
    println!("{}", serde_json::to_string_pretty(&json!({ "matches": matches }))?);
    Ok(())
}

/// Show configuration.
fn cmd_config(config_path: Option<&Path>, show_path: bool) -> Result<()> {
    if show_path {
        if let Some(path) = Config::config_dir() {
            println!("{}", path.display());
        }
        return Ok(());
    }

    let config = load_config(config_path)?;
    println!("{}", config.to_toml()?);
    Ok(())
}
