//! Recent-feedback candidates (DYNAMIC)

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use citypulse_core::clients::behavior::BehaviorStore;
use citypulse_core::clients::vector::VectorStore;
use citypulse_core::models::interaction::InteractionKind;
use citypulse_core::models::recommendation::{RecItem, RecSubsystem};
use citypulse_core::Result;
use tracing::debug;
use uuid::Uuid;

/// Generates candidates from the user's recent signed feedback.
///
/// Clicks act as weak positive anchors, likes as strong positive anchors
/// and dislikes as strong negative anchors for the index's best-score
/// recommend API. Events the user already touched never come back as
/// candidates.
pub struct FeedbackCandidates {
    vector: Arc<dyn VectorStore>,
    behavior: Arc<dyn BehaviorStore>,
    limit: usize,
    window_days: i64,
    interactions_limit: u64,
    explicit_coefficient: usize,
}

impl FeedbackCandidates {
    pub fn new(
        vector: Arc<dyn VectorStore>,
        behavior: Arc<dyn BehaviorStore>,
        limit: usize,
        window_days: i64,
        interactions_limit: u64,
        explicit_coefficient: usize,
    ) -> Self {
        Self {
            vector,
            behavior,
            limit,
            window_days,
            interactions_limit,
            explicit_coefficient,
        }
    }

    /// Up to `limit` DYNAMIC items the user has not interacted with.
    /// Empty when the user has no qualifying recent feedback.
    pub async fn generate(&self, user_id: i64, now: DateTime<Utc>) -> Result<Vec<RecItem>> {
        let after = now - Duration::days(self.window_days);
        let interactions = self
            .behavior
            .get_interactions_by_user(user_id, after, self.interactions_limit)
            .await?;

        let interacted: HashSet<Uuid> = interactions.iter().map(|i| i.event_id).collect();
        if interacted.is_empty() {
            return Ok(Vec::new());
        }

        // Anchors must exist in the index: an interacted event whose
        // description was too short to embed has no vector and cannot be
        // used as an example point.
        let indexed = self.vector.get_event_vectors(&interacted).await?;

        let mut positive: Vec<Uuid> = Vec::new();
        let mut negative: Vec<Uuid> = Vec::new();
        for interaction in &interactions {
            if !indexed.contains_key(&interaction.event_id) {
                continue;
            }
            match interaction.kind {
                InteractionKind::Click => positive.push(interaction.event_id),
                InteractionKind::Like => {
                    positive.extend(std::iter::repeat(interaction.event_id).take(
                        self.explicit_coefficient,
                    ));
                }
                InteractionKind::Dislike => {
                    negative.extend(std::iter::repeat(interaction.event_id).take(
                        self.explicit_coefficient,
                    ));
                }
            }
        }

        if positive.is_empty() && negative.is_empty() {
            return Ok(Vec::new());
        }

        // The index may hand back events the user already touched; fetch
        // enough extra to still fill the quota after dropping them.
        let fetch_limit = (interacted.len() + self.limit) as u64;
        let hits = self
            .vector
            .recommend_events(&positive, &negative, fetch_limit, now)
            .await?;

        let mut items: Vec<RecItem> = hits
            .into_iter()
            .filter(|hit| !interacted.contains(&hit.event.id))
            .map(|hit| RecItem::new(RecSubsystem::Dynamic, hit.event, hit.score))
            .collect();
        items.truncate(self.limit);

        debug!(
            user_id,
            positive = positive.len(),
            negative = negative.len(),
            items = items.len(),
            "Feedback candidates generated"
        );
        Ok(items)
    }
}
