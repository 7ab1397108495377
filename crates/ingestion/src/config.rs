//! Ingestion service configuration

use citypulse_core::config::{
    BusConfig, CatalogDbConfig, ConfigLoader, EmbeddingConfig, VectorDbConfig,
};
use citypulse_core::error::CityPulseError;

/// Full configuration of the ingestion service
#[derive(Debug, Clone)]
pub struct IngestionConfig {
    pub bus: BusConfig,
    pub vector: VectorDbConfig,
    pub catalog: CatalogDbConfig,
    pub embedding: EmbeddingConfig,
}

impl IngestionConfig {
    /// Load and validate everything from the environment.
    pub fn load() -> Result<Self, CityPulseError> {
        let config = Self {
            bus: BusConfig::from_env()?,
            vector: VectorDbConfig::from_env()?,
            catalog: CatalogDbConfig::from_env()?,
            embedding: EmbeddingConfig::from_env()?,
        };
        config.bus.validate()?;
        config.vector.validate()?;
        config.catalog.validate()?;
        config.embedding.validate()?;
        Ok(config)
    }
}
