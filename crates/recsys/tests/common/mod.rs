//! In-memory fakes for the external stores, shared by the integration
//! tests. The fakes model just enough of the real stores' contracts: the
//! vector fakes rank by cosine similarity and honor the 180-day recency
//! window, the behavior fake honors ordering and limits.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use citypulse_core::clients::behavior::BehaviorStore;
use citypulse_core::clients::catalog::CatalogStore;
use citypulse_core::clients::embedding::Embedder;
use citypulse_core::clients::vector::{
    ScoredEvent, VectorStore, RECOMMENDATION_PERIOD_DAYS,
};
use citypulse_core::math::cosine_similarity;
use citypulse_core::models::event::{EventData, EventSource, Picture, Venue};
use citypulse_core::models::interaction::{InteractionKind, UserInteraction};
use citypulse_core::models::recommendation::{RecItem, RecommendedEvent};
use citypulse_core::{CityPulseError, Result};
use uuid::Uuid;

/// Arguments of one signed recommend call, for asserting on anchor lists
pub struct RecordedRecommendCall {
    pub positive: Vec<Uuid>,
    pub negative: Vec<Uuid>,
    pub limit: u64,
}

#[derive(Default)]
pub struct InMemoryVectorStore {
    pub events: Mutex<HashMap<Uuid, (EventData, Vec<f32>)>>,
    pub users: Mutex<HashMap<i64, Vec<f32>>>,
    pub recommend_calls: Mutex<Vec<RecordedRecommendCall>>,
    pub user_upserts: Mutex<Vec<i64>>,
    /// When set, similarity searches fail (recommend keeps working)
    pub fail_search: AtomicBool,
}

impl InMemoryVectorStore {
    pub fn insert_event(&self, event: EventData, vector: Vec<f32>) {
        self.events
            .lock()
            .unwrap()
            .insert(event.id, (event, vector));
    }

    pub fn insert_user(&self, user_id: i64, vector: Vec<f32>) {
        self.users.lock().unwrap().insert(user_id, vector);
    }

    fn in_window(event: &EventData, now: DateTime<Utc>) -> bool {
        let end = now + Duration::days(RECOMMENDATION_PERIOD_DAYS);
        event.datetime_from >= now && event.datetime_from <= end
    }

    fn ranked(&self, mut scored: Vec<ScoredEvent>, limit: u64) -> Vec<ScoredEvent> {
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit as usize);
        scored
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert_event(&self, event: &EventData, vector: Vec<f32>) -> Result<()> {
        self.insert_event(event.clone(), vector);
        Ok(())
    }

    async fn upsert_user(&self, user_id: i64, vector: Vec<f32>) -> Result<()> {
        self.user_upserts.lock().unwrap().push(user_id);
        self.insert_user(user_id, vector);
        Ok(())
    }

    async fn search_events(
        &self,
        query: &[f32],
        limit: u64,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScoredEvent>> {
        if self.fail_search.load(Ordering::SeqCst) {
            return Err(CityPulseError::VectorStore("search unavailable".into()));
        }

        let scored = self
            .events
            .lock()
            .unwrap()
            .values()
            .filter(|(event, _)| Self::in_window(event, now))
            .map(|(event, vector)| ScoredEvent {
                score: cosine_similarity(query, vector),
                event: event.clone(),
            })
            .collect();
        Ok(self.ranked(scored, limit))
    }

    async fn recommend_events(
        &self,
        positive: &[Uuid],
        negative: &[Uuid],
        limit: u64,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScoredEvent>> {
        self.recommend_calls.lock().unwrap().push(RecordedRecommendCall {
            positive: positive.to_vec(),
            negative: negative.to_vec(),
            limit,
        });

        if positive.is_empty() && negative.is_empty() {
            return Ok(Vec::new());
        }

        let events = self.events.lock().unwrap();
        let anchor_vectors = |ids: &[Uuid]| -> Vec<Vec<f32>> {
            ids.iter()
                .filter_map(|id| events.get(id).map(|(_, v)| v.clone()))
                .collect()
        };
        let positive_vectors = anchor_vectors(positive);
        let negative_vectors = anchor_vectors(negative);

        let best = |anchors: &[Vec<f32>], candidate: &[f32]| -> f32 {
            anchors
                .iter()
                .map(|anchor| cosine_similarity(anchor, candidate))
                .fold(f32::MIN, f32::max)
        };

        let scored = events
            .values()
            .filter(|(event, _)| Self::in_window(event, now))
            .map(|(event, vector)| {
                let pos = if positive_vectors.is_empty() {
                    0.0
                } else {
                    best(&positive_vectors, vector)
                };
                let neg = if negative_vectors.is_empty() {
                    0.0
                } else {
                    best(&negative_vectors, vector)
                };
                ScoredEvent {
                    score: pos - neg,
                    event: event.clone(),
                }
            })
            .collect();
        Ok(self.ranked(scored, limit))
    }

    async fn get_event_vectors(&self, ids: &HashSet<Uuid>) -> Result<HashMap<Uuid, Vec<f32>>> {
        let events = self.events.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| events.get(id).map(|(_, v)| (*id, v.clone())))
            .collect())
    }

    async fn get_user_vectors(&self, ids: &HashSet<i64>) -> Result<Vec<Vec<f32>>> {
        let users = self.users.lock().unwrap();
        Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }
}

#[derive(Default)]
pub struct InMemoryBehaviorLog {
    pub interactions: Mutex<Vec<UserInteraction>>,
    pub given: Mutex<Vec<(i64, Vec<RecommendedEvent>)>>,
    /// When set, audit writes fail
    pub fail_writes: AtomicBool,
}

impl InMemoryBehaviorLog {
    pub fn record(&self, user_id: i64, event_id: Uuid, kind: InteractionKind, at: DateTime<Utc>) {
        self.interactions.lock().unwrap().push(UserInteraction {
            user_id,
            event_id,
            kind,
            at,
        });
    }
}

#[async_trait]
impl BehaviorStore for InMemoryBehaviorLog {
    async fn insert_interaction(&self, interaction: &UserInteraction) -> Result<()> {
        self.interactions.lock().unwrap().push(interaction.clone());
        Ok(())
    }

    async fn insert_given_recommendation(
        &self,
        user_id: i64,
        items: &[RecItem],
        _at: DateTime<Utc>,
    ) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CityPulseError::BehaviorStore("insert failed".into()));
        }
        self.given
            .lock()
            .unwrap()
            .push((user_id, items.iter().map(RecommendedEvent::from).collect()));
        Ok(())
    }

    async fn get_interactions_by_user(
        &self,
        user_id: i64,
        after: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<UserInteraction>> {
        let mut rows: Vec<UserInteraction> = self
            .interactions
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.user_id == user_id && i.at >= after)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.at.cmp(&a.at));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn get_interactions_by_event(
        &self,
        event_id: Uuid,
        after: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<UserInteraction>> {
        let mut rows: Vec<UserInteraction> = self
            .interactions
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.event_id == event_id && i.at >= after)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.at.cmp(&a.at));
        rows.truncate(limit as usize);
        Ok(rows)
    }
}

#[derive(Default)]
pub struct InMemoryCatalog {
    pub users: Mutex<HashMap<i64, Option<String>>>,
    pub description_writes: Mutex<Vec<(i64, String)>>,
}

impl InMemoryCatalog {
    pub fn with_user(self, user_id: i64, description: Option<&str>) -> Self {
        self.users
            .lock()
            .unwrap()
            .insert(user_id, description.map(str::to_string));
        self
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn add_event(&self, _event: &EventData) -> Result<bool> {
        Ok(true)
    }

    async fn fetch_description_by_user_id(&self, user_id: i64) -> Result<Option<String>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .flatten())
    }

    async fn set_user_description(&self, user_id: i64, description: &str) -> Result<bool> {
        self.description_writes
            .lock()
            .unwrap()
            .push((user_id, description.to_string()));

        let mut users = self.users.lock().unwrap();
        match users.get_mut(&user_id) {
            Some(slot) => {
                *slot = Some(description.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Deterministic embedder: known texts map to preset vectors, anything else
/// gets a stable vector derived from its bytes.
#[derive(Default)]
pub struct FakeEmbedder {
    pub known: HashMap<String, Vec<f32>>,
    pub fail: AtomicBool,
}

impl FakeEmbedder {
    pub fn with_text(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.known.insert(text.to_string(), vector);
        self
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn dimension(&self) -> usize {
        4
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CityPulseError::Embedding("model unavailable".into()));
        }
        if let Some(vector) = self.known.get(text) {
            return Ok(vector.clone());
        }
        let sum: u32 = text.bytes().map(u32::from).sum();
        Ok(citypulse_core::math::normalize_vector(&[
            (sum % 7) as f32 + 1.0,
            (sum % 11) as f32 + 1.0,
            (sum % 13) as f32 + 1.0,
            1.0,
        ]))
    }
}

/// Unit vector along one of the four test axes
pub fn axis(i: usize) -> Vec<f32> {
    let mut v = vec![0.0; 4];
    v[i] = 1.0;
    v
}

/// A vector whose cosine similarity to `axis(i)` is exactly `sim`, with the
/// remainder on the shared residual axis 3.
pub fn vector_with_similarity(i: usize, sim: f32) -> Vec<f32> {
    let mut v = vec![0.0; 4];
    v[i] = sim;
    v[3] = (1.0 - sim * sim).sqrt();
    v
}

/// An event starting `starts_in_days` from `now`
pub fn event_at(title: &str, starts_in_days: i64, now: DateTime<Utc>) -> EventData {
    EventData {
        id: Uuid::new_v4(),
        title: title.to_string(),
        description: Some(format!("{} with a long enough description", title)),
        datetime_from: now + Duration::days(starts_in_days),
        datetime_to: None,
        city: Some("Helsinki".to_string()),
        venue: Venue::default(),
        picture: Picture::default(),
        price: None,
        tags: Vec::new(),
        contact: None,
        service_id: format!("TEST-{}", Uuid::new_v4()),
        service_type: EventSource::Kudago,
        service_data: serde_json::Value::Null,
    }
}
