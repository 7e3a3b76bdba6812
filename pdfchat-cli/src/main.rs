use anyhow::{Context, Result};
use clap::Parser;
use pdfchat_rag::{ChatService, IngestReport};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;
mod repl;
mod staging;

use cli::{Cli, Command, SourceArgs};
use staging::StagedUploads;

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("info"),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

/// Ingest the documents named by `source`. Uploaded files are staged for the
/// duration of the ingestion and removed afterwards, whatever the outcome.
async fn ingest(service: &ChatService, source: &SourceArgs) -> Result<IngestReport> {
    let report = match &source.docs {
        Some(dir) => service.ingest_directory(dir).await,
        None => {
            let staged = StagedUploads::stage(&source.uploads_root, &source.upload)?;
            service.ingest_directory(staged.path()).await
        }
    }
    .context("ingestion failed")?;

    info!(
        document_count = report.document_count,
        chunk_count = report.chunk_count,
        dimensions = report.handle.dimensions,
        collection = %report.handle.namespace,
        "documents ready"
    );
    Ok(report)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.retrieval.to_config()?;
    let backend = cli.backend.to_config();
    let service = ChatService::from_config(config, &backend)?;

    let outcome = run(&service, &cli.command).await;
    let closed = service.close().await.context("failed to tear down the index");
    outcome.and(closed)
}

async fn run(service: &ChatService, command: &Command) -> Result<()> {
    match command {
        Command::Chat(source) => {
            let report = ingest(service, source).await?;
            println!(
                "Indexed {} pages as {} passages.",
                report.document_count, report.chunk_count
            );
            repl::run(service).await
        }
        Command::Ask { source, question } => {
            ingest(service, source).await?;
            let response = service.ask(question).await?;
            repl::print_answer(&response);
            Ok(())
        }
    }
}
