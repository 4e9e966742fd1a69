//! Start-up wiring shared by every front end.

use std::sync::Arc;

use crate::agent::PrimaryAgent;
use crate::config::{AppConfig, LOCAL_MODEL_BASE_URL};
use crate::error::{QaError, Result};
use crate::llm::local_model;
use crate::pipeline::RagPipeline;
use crate::rag::RagEngine;

/// Everything a front end needs, built once per process.
pub struct Components {
    pub agent: Arc<PrimaryAgent>,
}

impl Components {
    /// Open the store and build both model handles.
    ///
    /// Fails when the store is missing or unreadable; nothing is created here.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let location = config.store_location();
        tracing::info!("Opening vector store: {}", location);
        let engine = RagEngine::open(&location).await.map_err(QaError::Store)?;
        tracing::info!("Vector store holds {} chunks", engine.store().count().await.map_err(QaError::Store)?);

        tracing::info!("Model endpoint: {}", LOCAL_MODEL_BASE_URL);
        tracing::info!("Reasoning model: {}", config.reasoning_model_id);
        tracing::info!("Tool model: {}", config.tool_model_id);

        let reasoner = Arc::new(local_model(&config.reasoning_model_id));
        let tool_model = Arc::new(local_model(&config.tool_model_id));

        let pipeline = RagPipeline::new(Arc::new(engine), reasoner);
        let agent = Arc::new(PrimaryAgent::new(tool_model, pipeline));

        Ok(Self { agent })
    }
}
