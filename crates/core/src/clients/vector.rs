//! Vector index client (qdrant)
//!
//! Two collections back the recommender: `events_collection` keyed by event
//! UUID with the full event JSON as payload, and `users_collection` keyed by
//! the numeric user id with no payload. Both are cosine-distance,
//! 384-dimensional, stored on disk, and created on startup if absent.
//!
//! Every event query carries the recency filter: only events starting within
//! the next 180 days are candidates. The filter works on a mirrored
//! `datetime_from_ts` payload field (unix seconds) written at upsert time,
//! while the RFC 3339 `datetime_from` inside the payload stays authoritative
//! for the round-tripped event record.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use qdrant_client::qdrant::{
    point_id::PointIdOptions, vectors::VectorsOptions, vectors_config::Config, Condition,
    CreateCollection, Distance, Filter, GetPoints, PointId, PointStruct, Range, RecommendPoints,
    RecommendStrategy, SearchPoints, UpsertPoints, VectorParams, VectorsConfig,
};
use qdrant_client::{Payload, Qdrant};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::VectorDbConfig;
use crate::error::CityPulseError;
use crate::models::event::EventData;
use crate::Result;

pub const EVENTS_COLLECTION: &str = "events_collection";
pub const USERS_COLLECTION: &str = "users_collection";

/// Embedding dimension of both collections
pub const VECTOR_DIM: u64 = 384;

/// Only events starting within this many days from "now" are candidates.
pub const RECOMMENDATION_PERIOD_DAYS: i64 = 180;

/// Payload field mirroring `datetime_from` as unix seconds, used by the
/// recency filter.
const DATETIME_FROM_TS_KEY: &str = "datetime_from_ts";

/// An event hit returned by the index, with its similarity score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEvent {
    pub score: f32,
    pub event: EventData,
}

/// Vector index operations used by the recommender and the ingestion
/// pipeline.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Store an event vector keyed by the event id, with the event JSON as
    /// payload. At most one vector per event.
    async fn upsert_event(&self, event: &EventData, vector: Vec<f32>) -> Result<()>;

    /// Store a user vector keyed by the user id. At most one vector per user.
    async fn upsert_user(&self, user_id: i64, vector: Vec<f32>) -> Result<()>;

    /// Similarity search over upcoming events.
    async fn search_events(
        &self,
        query: &[f32],
        limit: u64,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScoredEvent>>;

    /// Signed recommend over upcoming events: positive and negative anchor
    /// event ids, best-score strategy. Returns an empty list when both
    /// anchor lists are empty.
    async fn recommend_events(
        &self,
        positive: &[Uuid],
        negative: &[Uuid],
        limit: u64,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScoredEvent>>;

    /// Fetch stored event vectors. Ids without a vector are absent from the
    /// result.
    async fn get_event_vectors(&self, ids: &HashSet<Uuid>) -> Result<HashMap<Uuid, Vec<f32>>>;

    /// Fetch stored user vectors. Ids without a vector are skipped.
    async fn get_user_vectors(&self, ids: &HashSet<i64>) -> Result<Vec<Vec<f32>>>;
}

/// Qdrant-backed [`VectorStore`]
pub struct QdrantVectorStore {
    client: Qdrant,
}

impl QdrantVectorStore {
    pub fn new(config: &VectorDbConfig) -> Result<Self> {
        let client = Qdrant::from_url(&config.url)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                CityPulseError::VectorStore(format!("failed to create qdrant client: {}", e))
            })?;

        info!(url = %config.url, "Connected to qdrant");
        Ok(Self { client })
    }

    /// Create the two collections if they do not exist yet.
    pub async fn ensure_collections(&self) -> Result<()> {
        for name in [EVENTS_COLLECTION, USERS_COLLECTION] {
            let exists = self
                .client
                .collection_exists(name)
                .await
                .map_err(|e| CityPulseError::VectorStore(e.to_string()))?;
            if exists {
                debug!(collection = name, "Collection already exists");
                continue;
            }

            info!(collection = name, "Creating collection");
            self.client
                .create_collection(CreateCollection {
                    collection_name: name.to_string(),
                    vectors_config: Some(VectorsConfig {
                        config: Some(Config::Params(VectorParams {
                            size: VECTOR_DIM,
                            distance: Distance::Cosine.into(),
                            on_disk: Some(true),
                            ..Default::default()
                        })),
                    }),
                    ..Default::default()
                })
                .await
                .map_err(|e| {
                    CityPulseError::VectorStore(format!("failed to create {}: {}", name, e))
                })?;
        }
        Ok(())
    }

    /// Check the server is reachable.
    pub async fn is_healthy(&self) -> bool {
        self.client.health_check().await.is_ok()
    }

    fn recency_filter(now: DateTime<Utc>) -> Filter {
        let window_end = now + Duration::days(RECOMMENDATION_PERIOD_DAYS);
        Filter::must([Condition::range(
            DATETIME_FROM_TS_KEY,
            Range {
                gte: Some(now.timestamp() as f64),
                lte: Some(window_end.timestamp() as f64),
                ..Default::default()
            },
        )])
    }

    fn scored_events<I>(points: I) -> Result<Vec<ScoredEvent>>
    where
        I: IntoIterator<Item = (f32, HashMap<String, qdrant_client::qdrant::Value>)>,
    {
        points
            .into_iter()
            .map(|(score, payload)| {
                let event = event_from_payload(payload)?;
                Ok(ScoredEvent { score, event })
            })
            .collect()
    }
}

/// Build the qdrant payload for an event: the event JSON plus the mirrored
/// `datetime_from_ts` field the recency filter indexes.
fn event_payload(event: &EventData) -> Result<Payload> {
    let mut value = serde_json::to_value(event)?;
    let object = value
        .as_object_mut()
        .ok_or_else(|| CityPulseError::VectorStore("event did not serialize to an object".into()))?;
    object.insert(
        DATETIME_FROM_TS_KEY.to_string(),
        serde_json::json!(event.datetime_from.timestamp()),
    );
    Payload::try_from(value)
        .map_err(|e| CityPulseError::VectorStore(format!("payload conversion failed: {}", e)))
}

/// Decode a stored payload back into a typed event record, failing fast on
/// schema mismatch.
fn event_from_payload(payload: HashMap<String, qdrant_client::qdrant::Value>) -> Result<EventData> {
    let object: serde_json::Map<String, serde_json::Value> = payload
        .into_iter()
        .map(|(key, value)| (key, serde_json::Value::from(value)))
        .collect();
    Ok(serde_json::from_value(serde_json::Value::Object(object))?)
}

fn point_uuid(id: PointId) -> Option<Uuid> {
    match id.point_id_options? {
        PointIdOptions::Uuid(raw) => Uuid::parse_str(&raw).ok(),
        PointIdOptions::Num(_) => None,
    }
}

fn vector_data(vectors: qdrant_client::qdrant::Vectors) -> Option<Vec<f32>> {
    match vectors.vectors_options? {
        VectorsOptions::Vector(v) => Some(v.data),
        VectorsOptions::Vectors(_) => None,
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn upsert_event(&self, event: &EventData, vector: Vec<f32>) -> Result<()> {
        let point = PointStruct::new(event.id.to_string(), vector, event_payload(event)?);
        self.client
            .upsert_points(UpsertPoints {
                collection_name: EVENTS_COLLECTION.to_string(),
                points: vec![point],
                wait: Some(true),
                ..Default::default()
            })
            .await
            .map_err(|e| CityPulseError::VectorStore(format!("event upsert failed: {}", e)))?;

        debug!(event_id = %event.id, "Upserted event vector");
        Ok(())
    }

    async fn upsert_user(&self, user_id: i64, vector: Vec<f32>) -> Result<()> {
        let point = PointStruct::new(user_id as u64, vector, Payload::new());
        self.client
            .upsert_points(UpsertPoints {
                collection_name: USERS_COLLECTION.to_string(),
                points: vec![point],
                wait: Some(true),
                ..Default::default()
            })
            .await
            .map_err(|e| CityPulseError::VectorStore(format!("user upsert failed: {}", e)))?;

        debug!(user_id, "Upserted user vector");
        Ok(())
    }

    async fn search_events(
        &self,
        query: &[f32],
        limit: u64,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScoredEvent>> {
        let response = self
            .client
            .search_points(SearchPoints {
                collection_name: EVENTS_COLLECTION.to_string(),
                vector: query.to_vec(),
                limit,
                with_payload: Some(true.into()),
                filter: Some(Self::recency_filter(now)),
                ..Default::default()
            })
            .await
            .map_err(|e| CityPulseError::VectorStore(format!("event search failed: {}", e)))?;

        Self::scored_events(response.result.into_iter().map(|p| (p.score, p.payload)))
    }

    async fn recommend_events(
        &self,
        positive: &[Uuid],
        negative: &[Uuid],
        limit: u64,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScoredEvent>> {
        if positive.is_empty() && negative.is_empty() {
            return Ok(Vec::new());
        }

        let to_point_ids = |ids: &[Uuid]| -> Vec<PointId> {
            ids.iter().map(|id| PointId::from(id.to_string())).collect()
        };

        let response = self
            .client
            .recommend(RecommendPoints {
                collection_name: EVENTS_COLLECTION.to_string(),
                positive: to_point_ids(positive),
                negative: to_point_ids(negative),
                strategy: Some(RecommendStrategy::BestScore.into()),
                limit,
                with_payload: Some(true.into()),
                filter: Some(Self::recency_filter(now)),
                ..Default::default()
            })
            .await
            .map_err(|e| CityPulseError::VectorStore(format!("event recommend failed: {}", e)))?;

        Self::scored_events(response.result.into_iter().map(|p| (p.score, p.payload)))
    }

    async fn get_event_vectors(&self, ids: &HashSet<Uuid>) -> Result<HashMap<Uuid, Vec<f32>>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let response = self
            .client
            .get_points(GetPoints {
                collection_name: EVENTS_COLLECTION.to_string(),
                ids: ids
                    .iter()
                    .map(|id| PointId::from(id.to_string()))
                    .collect(),
                with_payload: Some(false.into()),
                with_vectors: Some(true.into()),
                ..Default::default()
            })
            .await
            .map_err(|e| {
                CityPulseError::VectorStore(format!("event vector retrieval failed: {}", e))
            })?;

        Ok(response
            .result
            .into_iter()
            .filter_map(|point| {
                let id = point.id.and_then(point_uuid)?;
                let vector = point.vectors.and_then(vector_data)?;
                Some((id, vector))
            })
            .collect())
    }

    async fn get_user_vectors(&self, ids: &HashSet<i64>) -> Result<Vec<Vec<f32>>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .get_points(GetPoints {
                collection_name: USERS_COLLECTION.to_string(),
                ids: ids.iter().map(|id| PointId::from(*id as u64)).collect(),
                with_payload: Some(false.into()),
                with_vectors: Some(true.into()),
                ..Default::default()
            })
            .await
            .map_err(|e| {
                CityPulseError::VectorStore(format!("user vector retrieval failed: {}", e))
            })?;

        Ok(response
            .result
            .into_iter()
            .filter_map(|point| point.vectors.and_then(vector_data))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::{EventSource, Picture, Venue};

    fn sample_event() -> EventData {
        EventData {
            id: Uuid::new_v4(),
            title: "Jazz evening".to_string(),
            description: Some("An evening of improvised jazz in the old town".to_string()),
            datetime_from: Utc::now() + Duration::days(3),
            datetime_to: None,
            city: Some("Riga".to_string()),
            venue: Venue::default(),
            picture: Picture::default(),
            price: None,
            tags: vec!["jazz".to_string(), "music".to_string()],
            contact: None,
            service_id: "KUDAGO-77".to_string(),
            service_type: EventSource::Kudago,
            service_data: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_payload_round_trip() {
        let event = sample_event();
        let payload = event_payload(&event).unwrap();
        let back = event_from_payload(payload.into()).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_payload_carries_timestamp_mirror() {
        let event = sample_event();
        let payload = event_payload(&event).unwrap();
        let map: HashMap<String, qdrant_client::qdrant::Value> = payload.into();
        let ts = map
            .get(DATETIME_FROM_TS_KEY)
            .and_then(|v| v.as_integer())
            .unwrap();
        assert_eq!(ts, event.datetime_from.timestamp());
    }

    #[test]
    fn test_recency_filter_window() {
        let now = Utc::now();
        let filter = QdrantVectorStore::recency_filter(now);
        assert_eq!(filter.must.len(), 1);
    }
}
