//! Profile-text candidates (BASIC)

use std::sync::Arc;

use chrono::{DateTime, Utc};
use citypulse_core::clients::embedding::Embedder;
use citypulse_core::clients::vector::VectorStore;
use citypulse_core::models::recommendation::{RecItem, RecSubsystem};
use citypulse_core::Result;
use tracing::debug;

/// Generates candidates by embedding the user's profile description and
/// searching the event collection with it.
pub struct ProfileCandidates {
    embedder: Arc<dyn Embedder>,
    vector: Arc<dyn VectorStore>,
    limit: u64,
}

impl ProfileCandidates {
    pub fn new(embedder: Arc<dyn Embedder>, vector: Arc<dyn VectorStore>, limit: u64) -> Self {
        Self {
            embedder,
            vector,
            limit,
        }
    }

    /// Up to `limit` BASIC items. An absent or empty description yields an
    /// empty list without touching the stores.
    pub async fn generate(
        &self,
        description: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Vec<RecItem>> {
        let query = match description {
            Some(text) if !text.is_empty() => text,
            _ => return Ok(Vec::new()),
        };

        let embedding = self.embedder.embed(query).await?;
        let hits = self.vector.search_events(&embedding, self.limit, now).await?;

        debug!(hits = hits.len(), "Profile-text candidates generated");
        Ok(hits
            .into_iter()
            .map(|hit| RecItem::new(RecSubsystem::Basic, hit.event, hit.score))
            .collect())
    }
}
