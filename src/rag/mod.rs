pub mod embeddings;
pub mod local_store;
pub mod vector_store;

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;

use self::embeddings::{EmbeddingGenerator, EMBEDDING_DIM, EMBEDDING_MODEL_NAME};
use self::local_store::SqliteVectorStore;
use self::vector_store::VectorStore;

/// A chunk returned by a similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub text: String,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreLocation {
    Local(PathBuf),
    Qdrant { url: String, collection: String },
}

impl std::fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreLocation::Local(dir) => write!(f, "{}", dir.display()),
            StoreLocation::Qdrant { url, collection } => write!(f, "{} (collection {})", url, collection),
        }
    }
}

/// Similarity search over the document collection.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Texts of the `k` chunks nearest to `query`, most similar first.
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<String>>;
}

pub enum StoreBackend {
    Local(SqliteVectorStore),
    Qdrant(VectorStore),
}

impl StoreBackend {
    /// Open an existing store built with the current embedding model; nothing is created.
    pub async fn open(location: &StoreLocation) -> Result<Self> {
        let backend = match location {
            StoreLocation::Local(dir) => Self::Local(SqliteVectorStore::open(dir).await?),
            StoreLocation::Qdrant { url, collection } => {
                Self::Qdrant(VectorStore::open(url, collection).await?)
            }
        };
        backend.ensure_embedding_model().await?;
        Ok(backend)
    }

    /// Open or initialise a store for writing.
    pub async fn open_for_write(location: &StoreLocation) -> Result<Self> {
        let backend = match location {
            StoreLocation::Local(dir) => Self::Local(
                SqliteVectorStore::open_or_create(dir, EMBEDDING_MODEL_NAME, EMBEDDING_DIM).await?,
            ),
            StoreLocation::Qdrant { url, collection } => Self::Qdrant(
                VectorStore::open_or_create(url, collection, EMBEDDING_DIM as u64).await?,
            ),
        };
        backend.ensure_embedding_model().await?;
        Ok(backend)
    }

    /// Qdrant records no model name, so only its vector size is compared.
    async fn ensure_embedding_model(&self) -> Result<()> {
        match self {
            Self::Local(store) => {
                check_embeddings(Some(store.embedding_model()), store.dimension() as u64)
            }
            Self::Qdrant(store) => check_embeddings(None, store.vector_size().await?),
        }
    }

    pub async fn search(&self, query_vector: Vec<f32>, limit: usize) -> Result<Vec<ScoredChunk>> {
        match self {
            Self::Local(store) => store.search(&query_vector, limit).await,
            Self::Qdrant(store) => store.search(query_vector, limit as u64).await,
        }
    }

    pub async fn count(&self) -> Result<u64> {
        match self {
            Self::Local(store) => store.count().await,
            Self::Qdrant(store) => store.count().await,
        }
    }

    /// Every stored chunk as `(id, text)`.
    pub async fn list_chunks(&self) -> Result<Vec<(String, String)>> {
        match self {
            Self::Local(store) => store.list().await,
            Self::Qdrant(store) => store.scroll_all().await,
        }
    }

    pub async fn upsert(
        &self,
        id: &str,
        text: &str,
        embedding: Vec<f32>,
        metadata: serde_json::Value,
    ) -> Result<()> {
        match self {
            Self::Local(store) => store.upsert(id, text, &embedding, &metadata).await,
            Self::Qdrant(store) => store.add_document(id, text, embedding, metadata).await,
        }
    }

    /// Drop every chunk whose id `keep` rejects. Returns how many went.
    pub async fn remove_unless(&self, keep: impl Fn(&str) -> bool) -> Result<usize> {
        match self {
            Self::Local(store) => store.retain(keep).await,
            Self::Qdrant(store) => {
                let stale: Vec<String> = store
                    .scroll_all()
                    .await?
                    .into_iter()
                    .map(|(id, _)| id)
                    .filter(|id| !keep(id))
                    .collect();
                let removed = stale.len();
                store.delete_points(stale).await?;
                Ok(removed)
            }
        }
    }
}

/// Fails unless the stored vectors come from the query embedding model.
fn check_embeddings(stored_model: Option<&str>, stored_dim: u64) -> Result<()> {
    if let Some(model) = stored_model {
        if model != EMBEDDING_MODEL_NAME {
            anyhow::bail!(
                "Store was built with embedding model {}, queries use {}; rebuild it with rag-indexer",
                model,
                EMBEDDING_MODEL_NAME
            );
        }
    }
    if stored_dim != EMBEDDING_DIM as u64 {
        anyhow::bail!(
            "Store holds {}-dimensional vectors, {} produces {}; rebuild it with rag-indexer",
            stored_dim,
            EMBEDDING_MODEL_NAME,
            EMBEDDING_DIM
        );
    }
    Ok(())
}

/// Embeds queries and searches the configured store.
pub struct RagEngine {
    embeddings: EmbeddingGenerator,
    store: StoreBackend,
}

impl RagEngine {
    pub async fn open(location: &StoreLocation) -> Result<Self> {
        let store = StoreBackend::open(location)
            .await
            .with_context(|| format!("Failed to open vector store at {}", location))?;
        let embeddings = EmbeddingGenerator::new()?;

        Ok(Self { embeddings, store })
    }

    pub fn store(&self) -> &StoreBackend {
        &self.store
    }

    pub async fn search_scored(&self, query: &str, top_k: usize) -> Result<Vec<ScoredChunk>> {
        let query_embedding = self.embeddings.generate_single(query)?;
        self.store.search(query_embedding, top_k).await
    }
}

#[async_trait]
impl Retriever for RagEngine {
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<String>> {
        let results = self.search_scored(query, k).await?;
        tracing::debug!(
            "Similarity search returned {} chunks (best score {:?})",
            results.len(),
            results.first().map(|r| r.score)
        );
        Ok(results.into_iter().map(|r| r.text).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_store_location_display() {
        let qdrant = StoreLocation::Qdrant {
            url: "http://localhost:6334".to_string(),
            collection: "documents".to_string(),
        };
        assert_eq!(qdrant.to_string(), "http://localhost:6334 (collection documents)");
    }

    fn vector(x: f32) -> Vec<f32> {
        let mut v = vec![0.0; EMBEDDING_DIM];
        v[0] = x;
        v[1] = 1.0 - x;
        v
    }

    #[tokio::test]
    async fn test_local_backend_round_trip() {
        let tmp = TempDir::new().unwrap();
        let location = StoreLocation::Local(tmp.path().to_path_buf());

        let local = SqliteVectorStore::open_or_create(tmp.path(), EMBEDDING_MODEL_NAME, EMBEDDING_DIM)
            .await
            .unwrap();
        local.upsert("a_0", "alpha", &vector(1.0), &json!({})).await.unwrap();
        local.upsert("a_1", "beta", &vector(0.0), &json!({})).await.unwrap();
        drop(local);

        let backend = StoreBackend::open(&location).await.unwrap();
        assert_eq!(backend.count().await.unwrap(), 2);

        let hits = backend.search(vector(0.1), 1).await.unwrap();
        assert_eq!(hits[0].text, "beta");

        let listed = backend.list_chunks().await.unwrap();
        assert_eq!(listed[0], ("a_0".to_string(), "alpha".to_string()));
    }

    #[tokio::test]
    async fn test_backend_writes_and_removes_stale() {
        let tmp = TempDir::new().unwrap();
        let location = StoreLocation::Local(tmp.path().join("vector_db"));

        let backend = StoreBackend::open_for_write(&location).await.unwrap();
        backend.upsert("keep_0", "kept", vector(1.0), json!({})).await.unwrap();
        backend.upsert("gone_0", "stale", vector(0.5), json!({})).await.unwrap();

        let removed = backend.remove_unless(|id| id.starts_with("keep")).await.unwrap();
        assert_eq!(removed, 1);

        let reopened = StoreBackend::open(&location).await.unwrap();
        let listed = reopened.list_chunks().await.unwrap();
        assert_eq!(listed, vec![("keep_0".to_string(), "kept".to_string())]);
    }

    #[tokio::test]
    async fn test_open_missing_local_store_fails() {
        let tmp = TempDir::new().unwrap();
        let location = StoreLocation::Local(tmp.path().join("vector_db"));
        assert!(StoreBackend::open(&location).await.is_err());
    }

    #[tokio::test]
    async fn test_open_rejects_store_from_other_embedding_model() {
        let tmp = TempDir::new().unwrap();
        let location = StoreLocation::Local(tmp.path().to_path_buf());
        drop(
            SqliteVectorStore::open_or_create(tmp.path(), "all-minilm-l6-v2", EMBEDDING_DIM)
                .await
                .unwrap(),
        );

        let err = StoreBackend::open(&location).await.err().unwrap();
        assert!(err.to_string().contains("all-minilm-l6-v2"));
        assert!(StoreBackend::open_for_write(&location).await.is_err());
    }

    #[test]
    fn test_check_embeddings() {
        assert!(check_embeddings(Some(EMBEDDING_MODEL_NAME), EMBEDDING_DIM as u64).is_ok());
        assert!(check_embeddings(None, EMBEDDING_DIM as u64).is_ok());
        assert!(check_embeddings(Some("other"), EMBEDDING_DIM as u64).is_err());

        let err = check_embeddings(None, 768).unwrap_err();
        assert!(err.to_string().contains("768-dimensional"));
    }
}
