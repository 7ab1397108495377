//! Neighbor-taste candidates (COLLABORATIVE)

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use citypulse_core::clients::behavior::BehaviorStore;
use citypulse_core::clients::vector::VectorStore;
use citypulse_core::math::mean_vector;
use citypulse_core::models::recommendation::{RecItem, RecSubsystem};
use citypulse_core::Result;
use futures::future::try_join_all;
use tracing::debug;

/// Generates candidates from the taste of users who touched the same
/// events recently.
///
/// Neighbor taste vectors are averaged element-wise with equal weight and
/// without normalization; the mean is then used as a plain similarity
/// query.
pub struct NeighborCandidates {
    vector: Arc<dyn VectorStore>,
    behavior: Arc<dyn BehaviorStore>,
    limit: u64,
    window_days: i64,
    user_interactions_limit: u64,
    event_interactions_limit: u64,
}

impl NeighborCandidates {
    pub fn new(
        vector: Arc<dyn VectorStore>,
        behavior: Arc<dyn BehaviorStore>,
        limit: u64,
        window_days: i64,
        user_interactions_limit: u64,
        event_interactions_limit: u64,
    ) -> Self {
        Self {
            vector,
            behavior,
            limit,
            window_days,
            user_interactions_limit,
            event_interactions_limit,
        }
    }

    /// Up to `limit` COLLABORATIVE items. Empty when no neighbor has an
    /// embedding.
    pub async fn generate(&self, user_id: i64, now: DateTime<Utc>) -> Result<Vec<RecItem>> {
        let after = now - Duration::days(self.window_days);
        let interactions = self
            .behavior
            .get_interactions_by_user(user_id, after, self.user_interactions_limit)
            .await?;

        let interacted: HashSet<_> = interactions.iter().map(|i| i.event_id).collect();
        if interacted.is_empty() {
            return Ok(Vec::new());
        }

        // Everyone who touched the same events inside the window is a
        // neighbor, except the requesting user.
        let per_event = try_join_all(interacted.iter().map(|event_id| {
            self.behavior
                .get_interactions_by_event(*event_id, after, self.event_interactions_limit)
        }))
        .await?;

        let neighbor_ids: HashSet<i64> = per_event
            .into_iter()
            .flatten()
            .map(|interaction| interaction.user_id)
            .filter(|id| *id != user_id)
            .collect();

        let neighbor_vectors = self.vector.get_user_vectors(&neighbor_ids).await?;
        let Some(taste) = mean_vector(&neighbor_vectors) else {
            return Ok(Vec::new());
        };

        let hits = self.vector.search_events(&taste, self.limit, now).await?;

        debug!(
            user_id,
            neighbors = neighbor_ids.len(),
            items = hits.len(),
            "Neighbor-taste candidates generated"
        );
        Ok(hits
            .into_iter()
            .map(|hit| RecItem::new(RecSubsystem::Collaborative, hit.event, hit.score))
            .collect())
    }
}
