use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use rag_chat::commands::{chat, ingest, rag_chat, search, show_status};
use rag_chat::config::{Config, DEFAULT_CONFIG_PATH};
use rag_chat::rag::DEFAULT_TOP_K;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Parser)]
#[command(name = "rag-chat")]
#[command(about = "Streaming chat assistant with retrieval over a local knowledge base")]
#[command(version)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recreate the text table, load a source file and build the index
    Ingest {
        /// SQL script creating the text table
        #[arg(long)]
        schema: PathBuf,
        /// Text file with one record per line
        #[arg(long)]
        source: PathBuf,
        /// Where to save the index (defaults to the configured path)
        #[arg(long)]
        index: Option<PathBuf>,
        /// Texts per embedding request (defaults to the configured size)
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Chat with the model without retrieval
    Chat,
    /// Chat with answers grounded in the knowledge base
    Rag {
        #[arg(long)]
        index: Option<PathBuf>,
    },
    /// Print the texts nearest to a query
    Search {
        query: String,
        /// Number of results
        #[arg(short, default_value_t = DEFAULT_TOP_K)]
        k: usize,
        #[arg(long)]
        index: Option<PathBuf>,
    },
    /// Show store and index statistics
    Status {
        #[arg(long)]
        index: Option<PathBuf>,
    },
}

fn index_path(config: &Config, index: Option<PathBuf>) -> PathBuf {
    index.unwrap_or_else(|| config.index.path.clone())
}

fn load_config(path: &Path) -> Result<Config> {
    let config = Config::load(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n{}", style("Interrupted, exiting.").yellow());
            std::process::exit(0);
        }
    });

    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Ingest {
            schema,
            source,
            index,
            batch_size,
        } => {
            let batch_size = batch_size.unwrap_or(config.index.batch_size);
            let index = index_path(&config, index);
            ingest(&config, &schema, &source, &index, batch_size).await?;
        }
        Commands::Chat => {
            chat(&config).await?;
        }
        Commands::Rag { index } => {
            rag_chat(&config, &index_path(&config, index)).await?;
        }
        Commands::Search { query, k, index } => {
            search(&config, &index_path(&config, index), &query, k).await?;
        }
        Commands::Status { index } => {
            show_status(&config, &index_path(&config, index)).await?;
        }
    }

    Ok(())
}
