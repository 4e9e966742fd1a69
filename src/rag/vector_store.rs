use anyhow::Result;
use qdrant_client::qdrant::{
    point_id::PointIdOptions, vectors_config::Config as VectorsConfigKind, CollectionInfo,
    CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance, PointId,
    PointStruct, PointsIdsList, ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder,
    VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use serde_json::{Map as JsonMap, Value as JsonValue};

use super::ScoredChunk;

/// Qdrant-backed chunk store. Each point carries the chunk under the `text` payload key.
pub struct VectorStore {
    client: Qdrant,
    collection_name: String,
}

impl VectorStore {
    /// Connect and require the collection to exist.
    pub async fn open(url: &str, collection_name: &str) -> Result<Self> {
        let store = Self::connect(url, collection_name)?;
        if !store.client.collection_exists(&store.collection_name).await? {
            anyhow::bail!(
                "Qdrant collection '{}' does not exist at {}; run rag-indexer first",
                collection_name,
                url
            );
        }
        tracing::info!("Qdrant collection '{}' ready", collection_name);
        Ok(store)
    }

    /// Connect and create the collection if needed (used when building the store).
    pub async fn open_or_create(url: &str, collection_name: &str, dimension: u64) -> Result<Self> {
        let store = Self::connect(url, collection_name)?;
        store.ensure_collection(dimension).await?;
        Ok(store)
    }

    fn connect(url: &str, collection_name: &str) -> Result<Self> {
        tracing::info!("Building Qdrant client for URL: {}", url);
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| anyhow::anyhow!("Qdrant client build failed: {}", e))?;

        Ok(Self {
            client,
            collection_name: collection_name.to_string(),
        })
    }

    async fn ensure_collection(&self, dimension: u64) -> Result<()> {
        if !self.client.collection_exists(&self.collection_name).await? {
            tracing::info!("Creating Qdrant collection '{}'", self.collection_name);
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection_name)
                        .vectors_config(VectorParamsBuilder::new(dimension, Distance::Cosine)),
                )
                .await?;
        }
        Ok(())
    }

    /// Size of the collection's unnamed vector.
    pub async fn vector_size(&self) -> Result<u64> {
        let response = self.client.collection_info(&self.collection_name).await?;
        response
            .result
            .as_ref()
            .and_then(single_vector_size)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Qdrant collection '{}' has no single unnamed vector",
                    self.collection_name
                )
            })
    }

    pub async fn add_document(
        &self,
        id: &str,
        text: &str,
        embedding: Vec<f32>,
        metadata: JsonValue,
    ) -> Result<()> {
        let mut payload_map = JsonMap::new();
        payload_map.insert("chunk_id".to_string(), JsonValue::String(id.to_string()));
        payload_map.insert("text".to_string(), JsonValue::String(text.to_string()));
        payload_map.insert("metadata".to_string(), metadata);
        let point = PointStruct::new(point_uuid(id), embedding, payload_map);

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection_name, vec![point]))
            .await?;

        Ok(())
    }

    /// Nearest neighbours in score order; points without a `text` payload are skipped.
    pub async fn search(&self, query_vector: Vec<f32>, limit: u64) -> Result<Vec<ScoredChunk>> {
        let search_result = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection_name, query_vector, limit)
                    .with_payload(true),
            )
            .await?;

        let mut results = Vec::new();
        for point in search_result.result {
            if let Some(text) = point.payload.get("text").and_then(|v| v.as_str()) {
                results.push(ScoredChunk {
                    text: text.to_string(),
                    score: point.score,
                });
            }
        }

        Ok(results)
    }

    pub async fn count(&self) -> Result<u64> {
        let response = self
            .client
            .count(CountPointsBuilder::new(&self.collection_name).exact(true))
            .await?;
        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }

    /// All chunk ids with their text, in scroll order.
    pub async fn scroll_all(&self) -> Result<Vec<(String, String)>> {
        let mut all = Vec::new();
        let mut offset: Option<PointId> = None;

        loop {
            let mut builder = ScrollPointsBuilder::new(&self.collection_name)
                .limit(100)
                .with_payload(true);

            if let Some(ref off) = offset {
                builder = builder.offset(off.clone());
            }

            let result = self.client.scroll(builder).await?;

            for point in &result.result {
                let text = point
                    .payload
                    .get("text")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_default();
                let chunk_id = point
                    .payload
                    .get("chunk_id")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .or_else(|| point.id.as_ref().and_then(point_id_string));
                if let Some(chunk_id) = chunk_id {
                    all.push((chunk_id, text));
                }
            }

            offset = result.next_page_offset;
            if offset.is_none() {
                break;
            }
        }

        Ok(all)
    }

    pub async fn delete_points(&self, ids: Vec<String>) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let point_ids: Vec<PointId> = ids.iter().map(|id| point_uuid(id).into()).collect();

        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection_name).points(PointsIdsList { ids: point_ids }),
            )
            .await?;

        Ok(())
    }
}

/// Qdrant only accepts integer or UUID ids, so chunk ids are mapped to a stable UUID.
fn point_uuid(chunk_id: &str) -> String {
    uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, chunk_id.as_bytes()).to_string()
}

fn single_vector_size(info: &CollectionInfo) -> Option<u64> {
    let vectors = info.config.as_ref()?.params.as_ref()?.vectors_config.as_ref()?;
    match vectors.config.as_ref()? {
        VectorsConfigKind::Params(params) => Some(params.size),
        VectorsConfigKind::ParamsMap(_) => None,
    }
}

fn point_id_string(id: &PointId) -> Option<String> {
    match id.point_id_options.as_ref()? {
        PointIdOptions::Uuid(uuid) => Some(uuid.clone()),
        PointIdOptions::Num(num) => Some(num.to_string()),
    }
}
