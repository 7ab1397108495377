//! Request orchestration
//!
//! One [`RecommendationService`] instance serves the whole process. It holds
//! the store handles created at startup and owns no other state; everything
//! per-request lives on the task.

use std::sync::Arc;

use chrono::Utc;
use citypulse_core::clients::behavior::BehaviorStore;
use citypulse_core::clients::catalog::CatalogStore;
use citypulse_core::clients::embedding::Embedder;
use citypulse_core::clients::vector::VectorStore;
use citypulse_core::models::recommendation::RecItem;
use citypulse_core::models::user::is_indexable_description;
use tracing::{info, instrument, warn};

use crate::blend::blend_groups;
use crate::candidates::feedback::FeedbackCandidates;
use crate::candidates::neighbors::NeighborCandidates;
use crate::candidates::profile::ProfileCandidates;
use crate::config::RecommendConfig;
use crate::rescore::rescore;

/// The recommender: three generators, rescoring, blending, audit.
pub struct RecommendationService {
    behavior: Arc<dyn BehaviorStore>,
    catalog: Arc<dyn CatalogStore>,
    vector: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    profile: ProfileCandidates,
    feedback: FeedbackCandidates,
    neighbors: NeighborCandidates,
    config: RecommendConfig,
}

impl RecommendationService {
    pub fn new(
        vector: Arc<dyn VectorStore>,
        behavior: Arc<dyn BehaviorStore>,
        catalog: Arc<dyn CatalogStore>,
        embedder: Arc<dyn Embedder>,
        config: RecommendConfig,
    ) -> Self {
        let profile = ProfileCandidates::new(
            Arc::clone(&embedder),
            Arc::clone(&vector),
            config.limit as u64,
        );
        let feedback = FeedbackCandidates::new(
            Arc::clone(&vector),
            Arc::clone(&behavior),
            config.limit,
            config.interaction_window_days,
            config.user_interactions_limit,
            config.explicit_coefficient,
        );
        let neighbors = NeighborCandidates::new(
            Arc::clone(&vector),
            Arc::clone(&behavior),
            config.limit as u64,
            config.interaction_window_days,
            config.user_interactions_limit,
            config.event_interactions_limit,
        );

        Self {
            behavior,
            catalog,
            vector,
            embedder,
            profile,
            feedback,
            neighbors,
            config,
        }
    }

    /// Build the blended recommendation list for one user.
    ///
    /// Individual subsystem failures degrade to empty groups; the audit
    /// write failing is logged and does not lose the response. This method
    /// never fails the request.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn recommend_for_user(&self, user_id: i64) -> Vec<RecItem> {
        let now = Utc::now();

        let description = match self.catalog.fetch_description_by_user_id(user_id).await {
            Ok(description) => description,
            Err(e) => {
                warn!(error = %e, "User description lookup failed, running without it");
                None
            }
        };

        let (basic, dynamic, collaborative) = tokio::join!(
            self.profile.generate(description.as_deref(), now),
            self.feedback.generate(user_id, now),
            self.neighbors.generate(user_id, now),
        );

        let basic = basic.unwrap_or_else(|e| {
            warn!(error = %e, "Profile-text generator failed");
            Vec::new()
        });
        let dynamic = dynamic.unwrap_or_else(|e| {
            warn!(error = %e, "Feedback generator failed");
            Vec::new()
        });
        let collaborative = collaborative.unwrap_or_else(|e| {
            warn!(error = %e, "Neighbor-taste generator failed");
            Vec::new()
        });

        let groups = vec![
            rescore(&basic, now),
            rescore(&dynamic, now),
            rescore(&collaborative, now),
        ];
        let recommendation = blend_groups(groups, self.config.min_by_group, self.config.limit);

        if let Err(e) = self
            .behavior
            .insert_given_recommendation(user_id, &recommendation, now)
            .await
        {
            warn!(error = %e, "Failed to record given recommendation");
        }

        info!(items = recommendation.len(), "Recommendation composed");
        recommendation
    }

    /// Store a user's description in the catalog and, when it is long
    /// enough to embed, its vector in the index.
    ///
    /// Returns `true` only when both writes succeeded.
    #[instrument(skip(self, description), fields(user_id = %user_id))]
    pub async fn set_user_description(&self, user_id: i64, description: &str) -> bool {
        let catalog_ok = match self.catalog.set_user_description(user_id, description).await {
            Ok(ok) => ok,
            Err(e) => {
                warn!(error = %e, "Description write failed");
                false
            }
        };

        let vector_ok = if is_indexable_description(description) {
            match self.embed_and_upsert_user(user_id, description).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "User vector write failed");
                    false
                }
            }
        } else {
            info!("Description below embed threshold, vector upsert skipped");
            false
        };

        catalog_ok && vector_ok
    }

    async fn embed_and_upsert_user(
        &self,
        user_id: i64,
        description: &str,
    ) -> citypulse_core::Result<()> {
        let embedding = self.embedder.embed(description).await?;
        self.vector.upsert_user(user_id, embedding).await
    }
}
