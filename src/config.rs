use std::path::{Path, PathBuf};

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment};
use serde::Deserialize;

use crate::error::{QaError, Result};
use crate::rag::StoreLocation;

/// OpenAI-compatible endpoint of the local model server (Ollama).
pub const LOCAL_MODEL_BASE_URL: &str = "http://localhost:11434/v1";
pub const LOCAL_MODEL_API_KEY: &str = "ollama";

pub const VECTOR_DB_DIR_NAME: &str = "vector_db";
pub const DEFAULT_COLLECTION: &str = "documents";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Inner model that writes grounded answers.
    pub reasoning_model_id: String,
    /// Outer model that decides whether to call the RAG tool.
    pub tool_model_id: String,
    #[serde(default)]
    pub qdrant_url: Option<String>,
    #[serde(default = "default_collection")]
    pub qdrant_collection: String,
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

impl AppConfig {
    /// Load from the process environment, honouring a `.env` file.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_builder(Config::builder().add_source(Environment::default()))
    }

    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.reasoning_model_id.trim().is_empty() {
            return Err(QaError::Config("REASONING_MODEL_ID is empty".to_string()));
        }
        if self.tool_model_id.trim().is_empty() {
            return Err(QaError::Config("TOOL_MODEL_ID is empty".to_string()));
        }
        Ok(())
    }

    pub fn store_location(&self) -> StoreLocation {
        store_location(self.qdrant_url.as_deref(), &self.qdrant_collection)
    }
}

/// The local vector store always lives next to the crate sources.
pub fn vector_db_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join(VECTOR_DB_DIR_NAME)
}

pub fn store_location(qdrant_url: Option<&str>, collection: &str) -> StoreLocation {
    match qdrant_url.map(str::trim).filter(|url| !url.is_empty()) {
        Some(url) => StoreLocation::Qdrant {
            url: url.to_string(),
            collection: collection.to_string(),
        },
        None => StoreLocation::Local(vector_db_dir()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder_with(pairs: &[(&str, &str)]) -> ConfigBuilder<DefaultState> {
        pairs
            .iter()
            .fold(Config::builder(), |builder, (key, value)| {
                builder.set_override(*key, *value).unwrap()
            })
    }

    #[test]
    fn test_loads_both_model_ids() {
        let config = AppConfig::from_builder(builder_with(&[
            ("reasoning_model_id", "deepseek-r1:7b"),
            ("tool_model_id", "qwen2.5:14b"),
        ]))
        .unwrap();

        assert_eq!(config.reasoning_model_id, "deepseek-r1:7b");
        assert_eq!(config.tool_model_id, "qwen2.5:14b");
        assert_eq!(config.qdrant_collection, "documents");
        assert!(config.qdrant_url.is_none());
    }

    #[test]
    fn test_missing_tool_model_fails_fast() {
        let err = AppConfig::from_builder(builder_with(&[("reasoning_model_id", "deepseek-r1:7b")]))
            .unwrap_err();
        assert!(matches!(err, QaError::Config(_)));
        assert!(err.to_string().contains("tool_model_id"));
    }

    #[test]
    fn test_blank_model_id_rejected() {
        let err = AppConfig::from_builder(builder_with(&[
            ("reasoning_model_id", "  "),
            ("tool_model_id", "qwen2.5:14b"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("REASONING_MODEL_ID"));
    }

    #[test]
    fn test_local_store_is_fixed_subdirectory() {
        match store_location(None, DEFAULT_COLLECTION) {
            StoreLocation::Local(dir) => {
                assert!(dir.ends_with(VECTOR_DB_DIR_NAME));
                assert!(dir.starts_with(env!("CARGO_MANIFEST_DIR")));
            }
            other => panic!("expected local store, got {:?}", other),
        }
    }

    #[test]
    fn test_qdrant_url_selects_qdrant_backend() {
        match store_location(Some("http://localhost:6334"), "manuals") {
            StoreLocation::Qdrant { url, collection } => {
                assert_eq!(url, "http://localhost:6334");
                assert_eq!(collection, "manuals");
            }
            other => panic!("expected qdrant store, got {:?}", other),
        }

        assert!(matches!(store_location(Some(""), "manuals"), StoreLocation::Local(_)));
    }
}
