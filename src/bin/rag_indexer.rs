use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use doc_qa::config::{self, DEFAULT_COLLECTION};
use doc_qa::indexer::chunker::TextSplitter;
use doc_qa::indexer::extractor::extract_text;
use doc_qa::indexer::walker::{walk_directory, DocumentFormat};
use doc_qa::indexer::{
    chunk_id, file_id, file_id_of, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, EMBED_BATCH_SIZE,
};
use doc_qa::rag::embeddings::EmbeddingGenerator;
use doc_qa::rag::StoreBackend;
use doc_qa::telemetry::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "rag-indexer")]
#[command(about = "Index documents into the RAG vector store")]
struct Args {
    /// Directory to recursively index
    #[arg(short, long)]
    dir: PathBuf,

    /// Qdrant server URL; the local vector_db/ store is used when unset
    #[arg(long, env = "QDRANT_URL")]
    qdrant_url: Option<String>,

    /// Qdrant collection name
    #[arg(long, env = "QDRANT_COLLECTION", default_value = DEFAULT_COLLECTION)]
    collection: String,

    /// Maximum chunk size in characters
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Overlap between chunks in characters
    #[arg(long, default_value_t = DEFAULT_CHUNK_OVERLAP)]
    chunk_overlap: usize,

    /// Keep chunks of files that are no longer on disk
    #[arg(long)]
    keep_stale: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing("warn");

    let args = Args::parse();

    if !args.dir.is_dir() {
        anyhow::bail!("Directory does not exist: {}", args.dir.display());
    }

    println!("Initializing embedding model...");
    let embeddings = EmbeddingGenerator::new()?;

    let location = config::store_location(args.qdrant_url.as_deref(), &args.collection);
    println!("Opening vector store at {}...", location);
    let store = StoreBackend::open_for_write(&location).await?;

    println!("Scanning directory: {}", args.dir.display());
    let files = walk_directory(&args.dir);
    println!("Found {} supported files", files.len());

    let splitter = TextSplitter::new(args.chunk_size, args.chunk_overlap);

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let mut written: HashSet<String> = HashSet::new();
    let mut failed_files: Vec<(PathBuf, String)> = Vec::new();
    let mut success_count = 0usize;

    for (path, format) in &files {
        pb.set_message(path.file_name().unwrap_or_default().to_string_lossy().to_string());

        match index_file(path, *format, &splitter, &embeddings, &store).await {
            Ok(ids) => {
                success_count += 1;
                written.extend(ids);
            }
            Err(e) => {
                tracing::warn!("Failed to process {}: {:#}", path.display(), e);
                failed_files.push((path.clone(), format!("{:#}", e)));
            }
        }

        pb.inc(1);
    }

    pb.finish_with_message("done");

    let mut removed = 0;
    if !args.keep_stale {
        // A file that failed this run keeps whatever it had before.
        let failed_ids: HashSet<String> = failed_files.iter().map(|(p, _)| file_id(p)).collect();
        removed = store
            .remove_unless(|id| written.contains(id) || failed_ids.contains(file_id_of(id)))
            .await?;
    }

    println!("\nIndexing complete!");
    println!("  Files processed: {}/{}", success_count, files.len());
    println!("  Files failed:    {}", failed_files.len());
    println!("  Chunks written:  {}", written.len());
    println!("  Stale removed:   {}", removed);
    println!("  Chunks stored:   {}", store.count().await?);
    println!("  Store:           {}", location);

    if !failed_files.is_empty() {
        println!("\nFailed files:");
        for (path, err) in &failed_files {
            println!("  {}: {}", path.display(), err);
        }
    }

    Ok(())
}

/// Chunk, embed and store one file. Returns the ids written.
async fn index_file(
    path: &Path,
    format: DocumentFormat,
    splitter: &TextSplitter,
    embeddings: &EmbeddingGenerator,
    store: &StoreBackend,
) -> Result<Vec<String>> {
    let text = extract_text(path, format)?;
    let chunks = splitter.split(&text);
    if chunks.is_empty() {
        return Ok(Vec::new());
    }

    let path_id = file_id(path);
    let mut ids = Vec::with_capacity(chunks.len());

    for batch in chunks.chunks(EMBED_BATCH_SIZE) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = embeddings.generate(texts)?;

        for (chunk, embedding) in batch.iter().zip(vectors) {
            let id = chunk_id(&path_id, chunk.chunk_index);
            let metadata = serde_json::json!({
                "source": path.to_string_lossy(),
                "chunk_index": chunk.chunk_index,
                "format": format.as_str(),
            });

            store.upsert(&id, &chunk.text, embedding, metadata).await?;
            ids.push(id);
        }
    }

    Ok(ids)
}
