//! SQLite-backed vector store kept in a single directory.
//!
//! `chunks.db` holds a `rag_chunks` table (text, JSON metadata and the
//! embedding as a little-endian `f32` blob) and a `rag_meta` table recording
//! which embedding model and dimension built it. Search is brute-force
//! cosine similarity over every row.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::ScoredChunk;

const DB_FILE_NAME: &str = "chunks.db";

const META_EMBEDDING_MODEL: &str = "embedding_model";
const META_DIMENSION: &str = "dimension";

pub struct SqliteVectorStore {
    pool: SqlitePool,
    embedding_model: String,
    dimension: usize,
}

impl SqliteVectorStore {
    /// Open an existing store. A missing database or missing metadata is an error.
    pub async fn open(dir: &Path) -> Result<Self> {
        let db_path = dir.join(DB_FILE_NAME);
        if !db_path.is_file() {
            anyhow::bail!(
                "No vector index at {}; run rag-indexer to build it",
                db_path.display()
            );
        }

        let pool = connect(&db_path, false).await?;
        let meta = read_meta(&pool)
            .await
            .with_context(|| format!("Malformed vector index {}", db_path.display()))?;
        let Some((embedding_model, dimension)) = meta else {
            anyhow::bail!(
                "Vector index {} has no embedding metadata; rebuild it with rag-indexer",
                db_path.display()
            );
        };

        let store = Self {
            pool,
            embedding_model,
            dimension,
        };
        tracing::info!(
            "Opened local vector store {} ({} chunks, model {})",
            dir.display(),
            store.count().await?,
            store.embedding_model
        );
        Ok(store)
    }

    /// Open the store, or initialise an empty one if the directory has none yet.
    pub async fn open_or_create(dir: &Path, embedding_model: &str, dimension: usize) -> Result<Self> {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        let db_path = dir.join(DB_FILE_NAME);

        let pool = connect(&db_path, true).await?;
        init_schema(&pool).await?;

        match read_meta(&pool).await? {
            Some((stored_model, stored_dim)) => {
                if stored_model != embedding_model || stored_dim != dimension {
                    anyhow::bail!(
                        "Store {} was built with {} ({} dims), not {} ({} dims)",
                        dir.display(),
                        stored_model,
                        stored_dim,
                        embedding_model,
                        dimension
                    );
                }
            }
            None => {
                let mut tx = pool.begin().await?;
                for (key, value) in [
                    (META_EMBEDDING_MODEL, embedding_model.to_string()),
                    (META_DIMENSION, dimension.to_string()),
                ] {
                    sqlx::query("INSERT INTO rag_meta (key, value) VALUES (?1, ?2)")
                        .bind(key)
                        .bind(value)
                        .execute(&mut *tx)
                        .await?;
                }
                tx.commit().await?;
            }
        }

        Ok(Self {
            pool,
            embedding_model: embedding_model.to_string(),
            dimension,
        })
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rag_chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    /// Every chunk as `(id, text)` in insertion order.
    pub async fn list(&self) -> Result<Vec<(String, String)>> {
        let rows = sqlx::query("SELECT chunk_id, content FROM rag_chunks ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;

        let mut chunks = Vec::with_capacity(rows.len());
        for row in &rows {
            chunks.push((row.try_get("chunk_id")?, row.try_get("content")?));
        }
        Ok(chunks)
    }

    /// Insert or replace a chunk by id. A replaced chunk keeps its position.
    pub async fn upsert(&self, id: &str, text: &str, embedding: &[f32], metadata: &serde_json::Value) -> Result<()> {
        if embedding.len() != self.dimension {
            anyhow::bail!(
                "Embedding for {} has dimension {}, store expects {}",
                id,
                embedding.len(),
                self.dimension
            );
        }

        sqlx::query(
            "INSERT INTO rag_chunks (chunk_id, content, metadata, embedding)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(chunk_id) DO UPDATE SET
                content = excluded.content,
                metadata = excluded.metadata,
                embedding = excluded.embedding",
        )
        .bind(id)
        .bind(text)
        .bind(metadata.to_string())
        .bind(serialize_embedding(embedding))
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to write chunk {}", id))?;

        Ok(())
    }

    /// Delete every chunk whose id does not satisfy `keep`. Returns the number removed.
    pub async fn retain(&self, keep: impl Fn(&str) -> bool) -> Result<usize> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT chunk_id FROM rag_chunks")
            .fetch_all(&self.pool)
            .await?;
        let stale: Vec<&String> = ids.iter().filter(|id| !keep(id.as_str())).collect();
        if stale.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        for id in &stale {
            sqlx::query("DELETE FROM rag_chunks WHERE chunk_id = ?1")
                .bind(id.as_str())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(stale.len())
    }

    /// The `limit` chunks most similar to `query`, best first.
    ///
    /// Ties keep insertion order so repeated queries rank identically.
    pub async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<ScoredChunk>> {
        if query.len() != self.dimension {
            anyhow::bail!(
                "Query vector has dimension {}, store expects {}",
                query.len(),
                self.dimension
            );
        }

        let rows = sqlx::query("SELECT content, embedding FROM rag_chunks ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in &rows {
            let bytes: Vec<u8> = row.try_get("embedding")?;
            scored.push(ScoredChunk {
                text: row.try_get("content")?,
                score: cosine_similarity(query, &deserialize_embedding(&bytes)),
            });
        }

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);
        Ok(scored)
    }
}

async fn connect(db_path: &Path, create: bool) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(create)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal);

    SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(4)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open {}", db_path.display()))
}

async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS rag_chunks (
            chunk_id TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}',
            embedding BLOB NOT NULL,
            created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS rag_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// The stored `(embedding_model, dimension)` pair, if both keys are present.
async fn read_meta(pool: &SqlitePool) -> Result<Option<(String, usize)>> {
    let rows = sqlx::query("SELECT key, value FROM rag_meta").fetch_all(pool).await?;
    let mut meta = HashMap::new();
    for row in &rows {
        let key: String = row.try_get("key")?;
        let value: String = row.try_get("value")?;
        meta.insert(key, value);
    }

    let (Some(model), Some(dimension)) = (meta.remove(META_EMBEDDING_MODEL), meta.remove(META_DIMENSION)) else {
        return Ok(None);
    };
    let dimension = dimension
        .parse::<usize>()
        .with_context(|| format!("Stored dimension {:?} is not a number", dimension))?;
    Ok(Some((model, dimension)))
}

fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
