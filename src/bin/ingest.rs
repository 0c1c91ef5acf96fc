//! Ingestion entrypoint.
//!
//! Embeds every PDF in a folder and appends the vectors to the configured Qdrant collection.
//! Uses the same environment configuration as the HTTP server.
use anyhow::{Context, Result};
use clap::Parser;
use itgenie::{config, ingest::IngestionPipeline, logging};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "ingest",
    about = "Embed local PDF documents into the Qdrant collection"
)]
struct Cli {
    /// Folder containing the PDF files (defaults to `DOCUMENTS_FOLDER` or `downloaded_docs`).
    #[arg(long)]
    folder: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Arc::new(config::load().context("failed to load configuration")?);
    logging::init_tracing(config.log_file.as_deref());

    let folder = cli
        .folder
        .unwrap_or_else(|| config.documents_folder.clone());
    let pipeline =
        IngestionPipeline::new(config.clone()).context("failed to initialize ingestion")?;
    let report = pipeline
        .ingest(&folder)
        .await
        .with_context(|| format!("failed to ingest documents from {}", folder.display()))?;

    println!(
        "Embedded {} document(s) into Qdrant collection '{}'",
        report.documents_indexed, report.collection
    );
    Ok(())
}
