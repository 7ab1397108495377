//! Per-event ingestion pipeline
//!
//! Catalog first, index second: an event is embedded and written to the
//! vector index only after its catalog row was inserted, so the index never
//! references an event the catalog does not know. Re-delivered events are
//! detected by the catalog's `service_id` uniqueness and skip the index
//! write entirely.

use std::sync::Arc;

use citypulse_core::clients::catalog::CatalogStore;
use citypulse_core::clients::embedding::Embedder;
use citypulse_core::clients::vector::VectorStore;
use citypulse_core::models::event::EventData;
use citypulse_core::Result;
use tracing::{debug, info};

/// What happened to one ingested event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// New catalog row, vector indexed
    Indexed,
    /// New catalog row, description below the embed threshold
    StoredWithoutVector,
    /// An event with this `service_id` already exists
    Duplicate,
}

/// Stages an event through catalog persistence and vector indexing
pub struct EventPipeline {
    catalog: Arc<dyn CatalogStore>,
    vector: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl EventPipeline {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        vector: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            catalog,
            vector,
            embedder,
        }
    }

    pub async fn ingest(&self, event: &EventData) -> Result<IngestOutcome> {
        let inserted = self.catalog.add_event(event).await?;
        if !inserted {
            debug!(service_id = %event.service_id, "Event already known, skipping");
            return Ok(IngestOutcome::Duplicate);
        }

        if !event.is_indexable() {
            debug!(
                event_id = %event.id,
                "Description below embed threshold, not indexing"
            );
            return Ok(IngestOutcome::StoredWithoutVector);
        }

        let description = event.description.as_deref().unwrap_or_default();
        let embedding = self.embedder.embed(description).await?;
        self.vector.upsert_event(event, embedding).await?;

        info!(event_id = %event.id, service_id = %event.service_id, "Event indexed");
        Ok(IngestOutcome::Indexed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use citypulse_core::clients::vector::ScoredEvent;
    use citypulse_core::models::event::{EventSource, Picture, Venue};
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct FakeCatalog {
        known_service_ids: Mutex<HashSet<String>>,
    }

    #[async_trait]
    impl CatalogStore for FakeCatalog {
        async fn add_event(&self, event: &EventData) -> Result<bool> {
            Ok(self
                .known_service_ids
                .lock()
                .unwrap()
                .insert(event.service_id.clone()))
        }

        async fn fetch_description_by_user_id(&self, _user_id: i64) -> Result<Option<String>> {
            Ok(None)
        }

        async fn set_user_description(&self, _user_id: i64, _description: &str) -> Result<bool> {
            Ok(false)
        }
    }

    #[derive(Default)]
    struct FakeVectorStore {
        events: Mutex<HashMap<Uuid, Vec<f32>>>,
    }

    #[async_trait]
    impl VectorStore for FakeVectorStore {
        async fn upsert_event(&self, event: &EventData, vector: Vec<f32>) -> Result<()> {
            self.events.lock().unwrap().insert(event.id, vector);
            Ok(())
        }

        async fn upsert_user(&self, _user_id: i64, _vector: Vec<f32>) -> Result<()> {
            Ok(())
        }

        async fn search_events(
            &self,
            _query: &[f32],
            _limit: u64,
            _now: DateTime<Utc>,
        ) -> Result<Vec<ScoredEvent>> {
            Ok(Vec::new())
        }

        async fn recommend_events(
            &self,
            _positive: &[Uuid],
            _negative: &[Uuid],
            _limit: u64,
            _now: DateTime<Utc>,
        ) -> Result<Vec<ScoredEvent>> {
            Ok(Vec::new())
        }

        async fn get_event_vectors(
            &self,
            _ids: &HashSet<Uuid>,
        ) -> Result<HashMap<Uuid, Vec<f32>>> {
            Ok(HashMap::new())
        }

        async fn get_user_vectors(&self, _ids: &HashSet<i64>) -> Result<Vec<Vec<f32>>> {
            Ok(Vec::new())
        }
    }

    struct FakeEmbedder;

    #[async_trait]
    impl Embedder for FakeEmbedder {
        fn dimension(&self) -> usize {
            4
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.5, 0.5, 0.5, 0.5])
        }
    }

    fn event(service_id: &str, description: Option<&str>) -> EventData {
        EventData {
            id: Uuid::new_v4(),
            title: "Street food festival".to_string(),
            description: description.map(str::to_string),
            datetime_from: Utc::now(),
            datetime_to: None,
            city: Some("Tallinn".to_string()),
            venue: Venue::default(),
            picture: Picture::default(),
            price: None,
            tags: Vec::new(),
            contact: None,
            service_id: service_id.to_string(),
            service_type: EventSource::Kudago,
            service_data: serde_json::Value::Null,
        }
    }

    fn pipeline(vector: Arc<FakeVectorStore>) -> EventPipeline {
        EventPipeline::new(Arc::new(FakeCatalog::default()), vector, Arc::new(FakeEmbedder))
    }

    #[tokio::test]
    async fn test_indexable_event_gets_vector() {
        let vector = Arc::new(FakeVectorStore::default());
        let pipeline = pipeline(Arc::clone(&vector));

        let event = event("KUDAGO-1", Some("two weeks of street food and live music"));
        let outcome = pipeline.ingest(&event).await.unwrap();

        assert_eq!(outcome, IngestOutcome::Indexed);
        assert!(vector.events.lock().unwrap().contains_key(&event.id));
    }

    #[tokio::test]
    async fn test_short_description_skips_index() {
        let vector = Arc::new(FakeVectorStore::default());
        let pipeline = pipeline(Arc::clone(&vector));

        let outcome = pipeline
            .ingest(&event("KUDAGO-2", Some("too short")))
            .await
            .unwrap();

        assert_eq!(outcome, IngestOutcome::StoredWithoutVector);
        assert!(vector.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_service_id_skips_index() {
        let vector = Arc::new(FakeVectorStore::default());
        let pipeline = pipeline(Arc::clone(&vector));

        let first = event("KUDAGO-3", Some("two weeks of street food and live music"));
        let second = event("KUDAGO-3", Some("two weeks of street food and live music"));

        assert_eq!(
            pipeline.ingest(&first).await.unwrap(),
            IngestOutcome::Indexed
        );
        assert_eq!(
            pipeline.ingest(&second).await.unwrap(),
            IngestOutcome::Duplicate
        );
        assert_eq!(vector.events.lock().unwrap().len(), 1);
    }
}
