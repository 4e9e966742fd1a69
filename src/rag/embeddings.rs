use anyhow::{anyhow, Result};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

/// Name stored next to persisted vectors so a store is never queried with another model.
pub const EMBEDDING_MODEL_NAME: &str = "bge-small-en-v1.5";
pub const EMBEDDING_DIM: usize = 384;

pub struct EmbeddingGenerator {
    model: TextEmbedding,
}

impl EmbeddingGenerator {
    pub fn new() -> Result<Self> {
        tracing::info!("Initializing embedding model {}...", EMBEDDING_MODEL_NAME);

        let model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::BGESmallENV15).with_show_download_progress(true),
        )
        .map_err(|e| anyhow!("Failed to initialize embedding model: {}", e))?;

        tracing::info!("Embedding model initialized successfully");
        Ok(Self { model })
    }

    pub fn generate(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let embeddings = self.model.embed(texts, None)?;
        Ok(embeddings)
    }

    pub fn generate_single(&self, text: &str) -> Result<Vec<f32>> {
        self.generate(vec![text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Embedding model returned no vector"))
    }
}
