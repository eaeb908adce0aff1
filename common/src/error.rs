use async_openai::error::OpenAIError;
use thiserror::Error;

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("OpenAI error: {0}")]
    OpenAI(#[from] OpenAIError),
    #[error("Vector store error: {0}")]
    Qdrant(#[from] qdrant_client::QdrantError),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Engine error: {0}")]
    Engine(String),
    #[error("Ingestion error: {0}")]
    Ingestion(String),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Short machine-friendly label for the error family, safe to embed in
    /// user-facing fallback text.
    pub fn category(&self) -> &'static str {
        match self {
            Self::OpenAI(_) => "model",
            Self::Qdrant(_) => "vector-store",
            Self::Config(_) => "config",
            Self::NotFound(_) => "not-found",
            Self::Validation(_) => "validation",
            Self::Engine(_) => "engine",
            Self::Ingestion(_) => "ingestion",
            Self::Serde(_) => "serialization",
            Self::Io(_) => "io",
            Self::Anyhow(_) | Self::InternalError(_) => "internal",
        }
    }
}
