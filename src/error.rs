use thiserror::Error;

#[derive(Error, Debug)]
pub enum QaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Vector store error: {0:#}")]
    Store(anyhow::Error),

    /// Embedding or similarity search failed while answering a query.
    #[error("Retrieval failed: {0:#}")]
    Retrieval(anyhow::Error),

    #[error("Model '{model}' request failed: {cause:#}")]
    Model {
        model: String,
        cause: anyhow::Error,
    },

    #[error("Executor setup failed: {0}")]
    Bridge(#[from] std::io::Error),

    #[error("Tool-calling model did not produce an answer after {0} rounds")]
    ToolLoop(usize),
}

impl QaError {
    pub fn model(model: impl Into<String>, cause: anyhow::Error) -> Self {
        QaError::Model {
            model: model.into(),
            cause,
        }
    }
}

impl From<config::ConfigError> for QaError {
    fn from(err: config::ConfigError) -> Self {
        QaError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, QaError>;
