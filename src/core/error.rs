

use thiserror::Error;

use crate::db::{HelixClientError, ServiceError};
use crate::llm::{EmbeddingError, ExtractionError};


#[derive(Error, Debug)]
pub enum AtlasError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("HelixDB connection error: {0}")]
    Connection(String),

    #[error("Query execution error: {0}")]
    Query(String),

    #[error("Embedding generation error: {0}")]
    Embedding(String),

    #[error("LLM provider error: {0}")]
    LlmProvider(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<config::ConfigError> for AtlasError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<HelixClientError> for AtlasError {
    fn from(e: HelixClientError) -> Self {
        match e {
            HelixClientError::Connection(msg) => Self::Connection(msg),
            HelixClientError::Serialization(e) => Self::Serialization(e),
            other => Self::Query(other.to_string()),
        }
    }
}

impl From<ServiceError> for AtlasError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Unreachable(msg) => Self::Connection(msg),
            ServiceError::Embedding(e) => e.into(),
            other => Self::Query(other.to_string()),
        }
    }
}

impl From<EmbeddingError> for AtlasError {
    fn from(e: EmbeddingError) -> Self {
        Self::Embedding(e.to_string())
    }
}

impl From<ExtractionError> for AtlasError {
    fn from(e: ExtractionError) -> Self {
        Self::LlmProvider(e.to_string())
    }
}


pub type Result<T> = std::result::Result<T, AtlasError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_errors_map_to_connection_or_query() {
        let err: AtlasError = ServiceError::Unreachable("refused".into()).into();
        assert!(matches!(err, AtlasError::Connection(msg) if msg == "refused"));

        let err: AtlasError = ServiceError::Query("bad params".into()).into();
        assert!(matches!(err, AtlasError::Query(_)));

        let err: AtlasError = ServiceError::Embedding(EmbeddingError::EmptyText).into();
        assert!(matches!(err, AtlasError::Embedding(msg) if msg == "Empty text"));
    }

    #[test]
    fn test_client_connection_error_keeps_message() {
        let err: AtlasError = HelixClientError::Connection("no route".into()).into();
        assert_eq!(err.to_string(), "HelixDB connection error: no route");
    }
}
