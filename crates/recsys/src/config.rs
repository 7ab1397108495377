//! Recsys service configuration

use citypulse_core::config::{
    BehaviorDbConfig, BusConfig, CatalogDbConfig, ConfigLoader, EmbeddingConfig, VectorDbConfig,
};
use citypulse_core::error::CityPulseError;

/// Tuning knobs for candidate generation and blending.
///
/// Defaults are the production values; each can be overridden through the
/// environment for experiments.
#[derive(Debug, Clone)]
pub struct RecommendConfig {
    /// Final list size, and the per-generator candidate bound
    pub limit: usize,
    /// Minimum items each subsystem is entitled to in the blended list
    pub min_by_group: usize,
    /// How far back interactions are considered, in days
    pub interaction_window_days: i64,
    /// Most recent interactions considered per user
    pub user_interactions_limit: u64,
    /// Most recent interactions considered per event when looking for
    /// neighbors
    pub event_interactions_limit: u64,
    /// Weight multiplier for explicit feedback (likes and dislikes) over
    /// implicit clicks
    pub explicit_coefficient: usize,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            min_by_group: 2,
            interaction_window_days: 7,
            user_interactions_limit: 100,
            event_interactions_limit: 10,
            explicit_coefficient: 5,
        }
    }
}

impl RecommendConfig {
    fn from_env() -> Result<Self, CityPulseError> {
        let default = Self::default();
        Ok(Self {
            limit: parse_env("CITYPULSE_REC_LIMIT", default.limit)?,
            min_by_group: parse_env("CITYPULSE_REC_MIN_BY_GROUP", default.min_by_group)?,
            interaction_window_days: parse_env(
                "CITYPULSE_REC_WINDOW_DAYS",
                default.interaction_window_days,
            )?,
            user_interactions_limit: parse_env(
                "CITYPULSE_REC_USER_INTERACTIONS",
                default.user_interactions_limit,
            )?,
            event_interactions_limit: parse_env(
                "CITYPULSE_REC_EVENT_INTERACTIONS",
                default.event_interactions_limit,
            )?,
            explicit_coefficient: parse_env(
                "CITYPULSE_REC_EXPLICIT_COEFFICIENT",
                default.explicit_coefficient,
            )?,
        })
    }

    fn validate(&self) -> Result<(), CityPulseError> {
        if self.limit == 0 {
            return Err(CityPulseError::config(
                "recommendation limit must be greater than 0",
                "CITYPULSE_REC_LIMIT",
            ));
        }
        if self.explicit_coefficient == 0 {
            return Err(CityPulseError::config(
                "explicit coefficient must be greater than 0",
                "CITYPULSE_REC_EXPLICIT_COEFFICIENT",
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, CityPulseError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| CityPulseError::config(format!("cannot parse {}={}", key, raw), key)),
        Err(_) => Ok(default),
    }
}

/// Full configuration of the recsys service
#[derive(Debug, Clone)]
pub struct RecsysConfig {
    pub bus: BusConfig,
    pub vector: VectorDbConfig,
    pub behavior: BehaviorDbConfig,
    pub catalog: CatalogDbConfig,
    pub embedding: EmbeddingConfig,
    pub recommend: RecommendConfig,
}

impl RecsysConfig {
    /// Load and validate everything from the environment.
    pub fn load() -> Result<Self, CityPulseError> {
        let config = Self {
            bus: BusConfig::from_env()?,
            vector: VectorDbConfig::from_env()?,
            behavior: BehaviorDbConfig::from_env()?,
            catalog: CatalogDbConfig::from_env()?,
            embedding: EmbeddingConfig::from_env()?,
            recommend: RecommendConfig::from_env()?,
        };
        config.bus.validate()?;
        config.vector.validate()?;
        config.behavior.validate()?;
        config.catalog.validate()?;
        config.embedding.validate()?;
        config.recommend.validate()?;
        Ok(config)
    }
}
