//! # CityPulse Core
//!
//! Shared building blocks for the CityPulse event-recommendation platform:
//! domain models, configuration loading, error types, vector math, and the
//! clients for the external stores (vector index, behavior log, event
//! catalog, embedding provider).

pub mod clients;
pub mod config;
pub mod error;
pub mod math;
pub mod models;
pub mod observability;
pub mod retry;

pub use clients::behavior::{BehaviorStore, ClickHouseBehaviorLog};
pub use clients::catalog::{CatalogStore, PostgresCatalog};
pub use clients::embedding::{Embedder, HttpEmbedder, EMBEDDING_DIM};
pub use clients::vector::{QdrantVectorStore, ScoredEvent, VectorStore};
pub use config::{
    BehaviorDbConfig, BusConfig, CatalogDbConfig, ConfigLoader, EmbeddingConfig, VectorDbConfig,
};
pub use error::CityPulseError;
pub use math::{cosine_similarity, dot_product, mean_vector, normalize_vector};
pub use models::event::{EventData, EventSource, Picture, Price, Venue};
pub use models::interaction::{InteractionKind, UserInteraction};
pub use models::recommendation::{RecItem, RecSubsystem, RecommendedEvent};
pub use observability::init_logging;
pub use retry::{retry_with_backoff, RetryPolicy};

/// Result type alias for CityPulse operations
pub type Result<T> = std::result::Result<T, CityPulseError>;
