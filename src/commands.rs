use anyhow::{Context, Result};
use console::style;
use std::io::{self, BufReader};
use std::path::Path;
use tracing::{info, warn};

use crate::chat::ChatSession;
use crate::config::Config;
use crate::openai::OpenAiClient;
use crate::rag::RagOrchestrator;
use crate::vectorizer::{BuildReport, SearchResult, Vectorizer};

/// Recreate the text table, load the source file and build a fresh index
#[inline]
pub async fn ingest(
    config: &Config,
    schema_file: &Path,
    source_file: &Path,
    index_path: &Path,
    batch_size: usize,
) -> Result<BuildReport> {
    let mut vectorizer = Vectorizer::new(config).context("Failed to initialize vectorizer")?;

    vectorizer
        .setup_schema(schema_file)
        .await
        .with_context(|| format!("Failed to set up schema from {}", schema_file.display()))?;
    println!("{}", style("✓ Schema created").green());

    let records = vectorizer
        .ingest_from_file(source_file)
        .await
        .with_context(|| format!("Failed to ingest {}", source_file.display()))?;
    println!(
        "{} {} records from {}",
        style("✓ Ingested").green(),
        records.len(),
        source_file.display()
    );

    if records.is_empty() {
        warn!("Source file {} contained no records", source_file.display());
    }

    let report = vectorizer
        .build_index(&records, batch_size)
        .await
        .context("Failed to build index")?;

    vectorizer
        .save_index(index_path)
        .with_context(|| format!("Failed to save index to {}", index_path.display()))?;

    println!(
        "{} {} vectors in {} batches",
        style("✓ Indexed").green(),
        report.vectors_added,
        report.batches
    );
    if report.batches_skipped > 0 {
        println!(
            "{}",
            style(format!(
                "⚠ {} batches were skipped because embedding failed",
                report.batches_skipped
            ))
            .yellow()
        );
    }
    println!("Index saved to {}", style(index_path.display()).cyan());

    Ok(report)
}

/// Plain streaming chat on stdin/stdout
#[inline]
pub async fn chat(config: &Config) -> Result<()> {
    let client = OpenAiClient::new(&config.openai).context("Failed to create API client")?;
    let mut session = ChatSession::new(client);

    let end = session
        .run(BufReader::new(io::stdin()), io::stdout())
        .await
        .context("Chat session failed")?;
    info!("Chat finished: {:?}", end);

    Ok(())
}

/// Chat whose questions are answered from the indexed knowledge base
#[inline]
pub async fn rag_chat(config: &Config, index_path: &Path) -> Result<()> {
    let vectorizer = open_vectorizer(config, index_path)?;
    let client = OpenAiClient::new(&config.openai).context("Failed to create API client")?;
    let mut session = ChatSession::with_rag(client, RagOrchestrator::new(vectorizer));

    let end = session
        .run(BufReader::new(io::stdin()), io::stdout())
        .await
        .context("Chat session failed")?;
    info!("RAG chat finished: {:?}", end);

    Ok(())
}

/// Search the index and print the hits
#[inline]
pub async fn search(
    config: &Config,
    index_path: &Path,
    query: &str,
    k: usize,
) -> Result<Vec<SearchResult>> {
    let vectorizer = open_vectorizer(config, index_path)?;
    let results = vectorizer
        .search(query, k)
        .await
        .context("Search failed")?;

    if results.is_empty() {
        println!("No results found for: {}", style(query).cyan());
        return Ok(results);
    }

    println!("Results for: {}", style(query).cyan());
    for (rank, result) in results.iter().enumerate() {
        println!(
            "{}. {} {}",
            rank + 1,
            result.text,
            style(format!("(id {}, distance {:.4})", result.id, result.distance)).dim()
        );
    }

    Ok(results)
}

/// Row count of the store and size of the saved index
#[inline]
pub async fn show_status(config: &Config, index_path: &Path) -> Result<()> {
    let mut vectorizer = Vectorizer::new(config).context("Failed to initialize vectorizer")?;

    println!("{}", style("Knowledge Base Status").bold().cyan());

    match vectorizer.store().count().await {
        Ok(count) => println!("  Stored texts: {}", style(count).cyan()),
        Err(e) => println!("  Stored texts: {} ({})", style("unavailable").red(), e),
    }

    match vectorizer.load_index(index_path) {
        Ok(()) => println!(
            "  Indexed vectors: {} (dimension {})",
            style(vectorizer.index().len()).cyan(),
            vectorizer.index().dimension()
        ),
        Err(e) => println!("  Indexed vectors: {} ({})", style("no index").yellow(), e),
    }

    println!("  Index file: {}", style(index_path.display()).dim());
    println!("  Chat model: {}", style(&config.openai.chat_model).cyan());
    println!(
        "  Embedding model: {}",
        style(&config.openai.embedding_model).cyan()
    );

    Ok(())
}

fn open_vectorizer(config: &Config, index_path: &Path) -> Result<Vectorizer> {
    let mut vectorizer = Vectorizer::new(config).context("Failed to initialize vectorizer")?;
    vectorizer.load_index(index_path).with_context(|| {
        format!(
            "Failed to load index from {} (run `rag-chat ingest` first)",
            index_path.display()
        )
    })?;
    Ok(vectorizer)
}
