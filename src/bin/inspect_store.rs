use anyhow::Result;
use clap::Parser;

use doc_qa::config::{self, DEFAULT_COLLECTION};
use doc_qa::pipeline::{RetrievedContext, TOP_K};
use doc_qa::rag::RagEngine;
use doc_qa::telemetry::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "inspect-store")]
#[command(about = "Inspect the document vector store and run a sample search")]
struct Args {
    /// Query to run against the store
    #[arg(short, long, default_value = "can you summarize")]
    query: String,

    /// Number of chunks to retrieve
    #[arg(short, default_value_t = TOP_K)]
    k: usize,

    /// Print every stored chunk instead of searching
    #[arg(long)]
    list: bool,

    /// Qdrant server URL; the local vector_db/ store is used when unset
    #[arg(long, env = "QDRANT_URL")]
    qdrant_url: Option<String>,

    /// Qdrant collection name
    #[arg(long, env = "QDRANT_COLLECTION", default_value = DEFAULT_COLLECTION)]
    collection: String,
}

const PREVIEW_CHARS: usize = 80;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing("warn");

    let args = Args::parse();
    let location = config::store_location(args.qdrant_url.as_deref(), &args.collection);

    println!("Vector store: {}", location);
    let engine = RagEngine::open(&location).await?;
    println!("Stored chunks: {}", engine.store().count().await?);

    if args.list {
        for (id, text) in engine.store().list_chunks().await? {
            let preview: String = text.chars().take(PREVIEW_CHARS).collect();
            println!("{}\t{}", id, preview.replace('\n', " "));
        }
        return Ok(());
    }

    let results = engine.search_scored(&args.query, args.k).await?;
    for (rank, hit) in results.iter().enumerate() {
        tracing::debug!("#{} score {:.4}", rank + 1, hit.score);
    }

    let context = RetrievedContext::new(results.into_iter().map(|hit| hit.text).collect());
    println!("Retrieved documents: {}", context.joined());

    Ok(())
}
