//! Process entry point: load configuration, wire the workbook reader,
//! embedding client, generator, and worker pool into a [`tablerag::pipeline::Pipeline`],
//! then serve the HTTP edge. Grounded on the teacher's `#[tokio::main]`
//! demo-program shape (`aquental-rust-rag/rag/src/main.rs`), generalized
//! into a long-running server per spec.md §6.

use std::sync::Arc;

use clap::Parser;
use tablerag::config::AppConfig;
use tablerag::generator::{Generator, OpenAiGenerator};
use tablerag::pipeline::Pipeline;
use tablerag::retrieval::embeddings::{EmbeddingClient, RustBertEmbedder};
use tablerag::worker_pool::WorkerPool;
use tablerag::workbook::{CalamineWorkbookReader, WorkbookReader};

#[derive(Parser, Debug)]
#[command(name = "tablerag", about = "Hybrid retrieval-and-answerability engine over spreadsheet workbooks")]
struct Cli {
    /// Override the configured bind address (e.g. 127.0.0.1:9000).
    #[arg(long)]
    bind: Option<String>,

    /// Disable the local sentence-embedding model, running BM25+Jaccard only.
    #[arg(long)]
    no_embeddings: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load()?;
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }

    let workbook_reader: Arc<dyn WorkbookReader> = Arc::new(CalamineWorkbookReader);

    let embedder: Option<Arc<dyn EmbeddingClient>> = if cli.no_embeddings {
        None
    } else {
        match RustBertEmbedder::new() {
            Ok(embedder) => Some(Arc::new(embedder)),
            Err(e) => {
                tracing::warn!(error = %e, "failed to load local embedding model; falling back to BM25+Jaccard only");
                None
            }
        }
    };

    let generator: Arc<tokio::sync::Mutex<Box<dyn Generator>>> =
        Arc::new(tokio::sync::Mutex::new(Box::new(OpenAiGenerator::new(
            config.generator_model.clone(),
        )?)));

    let worker_pool = Arc::new(WorkerPool::new());
    let bind_addr = config.bind_addr.clone();
    let pipeline = Arc::new(Pipeline::new(config, workbook_reader, embedder, generator, worker_pool.clone()));

    let app = tablerag::http::router(pipeline);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "tablerag listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(worker_pool))
        .await?;

    Ok(())
}

async fn shutdown_signal(worker_pool: Arc<WorkerPool>) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received, draining worker pool");
    worker_pool.shutdown().await;
}
