//! Error types shared across CityPulse services

use thiserror::Error;

/// Top-level error type for CityPulse operations
#[derive(Debug, Error)]
pub enum CityPulseError {
    /// Invalid or missing configuration
    #[error("configuration error: {message}")]
    Configuration {
        message: String,
        /// Environment variable the error refers to, when known
        key: Option<String>,
    },

    /// Message-bus connection or protocol failure
    #[error("message bus error: {0}")]
    Bus(String),

    /// Vector index (qdrant) failure
    #[error("vector store error: {0}")]
    VectorStore(String),

    /// Behavior log (clickhouse) failure
    #[error("behavior store error: {0}")]
    BehaviorStore(String),

    /// Event catalog (postgres) failure
    #[error("catalog error: {0}")]
    Catalog(String),

    /// Embedding provider failure
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Payload did not match the expected schema
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CityPulseError {
    /// Shorthand for a keyed configuration error
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}
