//! Behavior log client (clickhouse)
//!
//! Two append-only MergeTree tables: `users_interactions` records every
//! (user, event, kind, time) touch, `given_recommendations` audits every
//! recommendation list the service handed out. Rows are never updated or
//! deleted.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use clickhouse::{Client, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::BehaviorDbConfig;
use crate::error::CityPulseError;
use crate::models::interaction::{InteractionKind, UserInteraction};
use crate::models::recommendation::{RecItem, RecommendedEvent};
use crate::Result;

const CREATE_USERS_INTERACTIONS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS users_interactions (
    user_id UInt64,
    event_id UUID,
    interaction_type String,
    interaction_dt DateTime
)
ENGINE = MergeTree
ORDER BY interaction_dt
";

const CREATE_GIVEN_RECOMMENDATIONS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS given_recommendations (
    user_id UInt64,
    recommended_events Array(Tuple(event_id UUID, subsystem_kind String, score Float32)),
    recommendation_dt DateTime
)
ENGINE = MergeTree
ORDER BY recommendation_dt
";

/// Behavior-log operations used by the recommender
#[async_trait]
pub trait BehaviorStore: Send + Sync {
    /// Append one interaction.
    async fn insert_interaction(&self, interaction: &UserInteraction) -> Result<()>;

    /// Append the audit row for one handed-out recommendation list.
    async fn insert_given_recommendation(
        &self,
        user_id: i64,
        items: &[RecItem],
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Interactions of one user since `after`, most recent first, bounded.
    async fn get_interactions_by_user(
        &self,
        user_id: i64,
        after: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<UserInteraction>>;

    /// Interactions on one event since `after`, most recent first, bounded.
    async fn get_interactions_by_event(
        &self,
        event_id: Uuid,
        after: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<UserInteraction>>;
}

#[derive(Debug, Row, Serialize, Deserialize)]
struct InteractionRow {
    user_id: u64,
    #[serde(with = "clickhouse::serde::uuid")]
    event_id: Uuid,
    interaction_type: String,
    #[serde(with = "clickhouse::serde::time::datetime")]
    interaction_dt: OffsetDateTime,
}

#[derive(Debug, Serialize)]
struct RecommendedEventRow {
    #[serde(with = "clickhouse::serde::uuid")]
    event_id: Uuid,
    subsystem_kind: String,
    score: f32,
}

#[derive(Debug, Row, Serialize)]
struct GivenRecommendationRow {
    user_id: u64,
    recommended_events: Vec<RecommendedEventRow>,
    #[serde(with = "clickhouse::serde::time::datetime")]
    recommendation_dt: OffsetDateTime,
}

/// ClickHouse-backed [`BehaviorStore`]
pub struct ClickHouseBehaviorLog {
    client: Client,
    request_timeout: std::time::Duration,
}

impl ClickHouseBehaviorLog {
    pub fn new(config: &BehaviorDbConfig) -> Self {
        let client = Client::default()
            .with_url(&config.url)
            .with_database(&config.database)
            .with_user(&config.username)
            .with_password(&config.password);

        info!(url = %config.url, database = %config.database, "Connected to clickhouse");
        Self {
            client,
            request_timeout: config.request_timeout,
        }
    }

    /// Create the two log tables if they do not exist yet.
    pub async fn ensure_tables(&self) -> Result<()> {
        for ddl in [
            CREATE_USERS_INTERACTIONS_TABLE,
            CREATE_GIVEN_RECOMMENDATIONS_TABLE,
        ] {
            self.bounded(self.client.query(ddl).execute()).await?;
        }
        debug!("Behavior-log tables ready");
        Ok(())
    }

    async fn bounded<T, E>(
        &self,
        fut: impl std::future::Future<Output = std::result::Result<T, E>>,
    ) -> Result<T>
    where
        E: std::fmt::Display,
    {
        tokio::time::timeout(self.request_timeout, fut)
            .await
            .map_err(|_| CityPulseError::BehaviorStore("request timed out".to_string()))?
            .map_err(|e| CityPulseError::BehaviorStore(e.to_string()))
    }
}

fn to_offset(dt: DateTime<Utc>) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(dt.timestamp())
        .map_err(|e| CityPulseError::BehaviorStore(format!("timestamp out of range: {}", e)))
}

fn from_row(row: InteractionRow) -> Result<UserInteraction> {
    let kind = InteractionKind::parse(&row.interaction_type).ok_or_else(|| {
        CityPulseError::BehaviorStore(format!(
            "unknown interaction kind: {}",
            row.interaction_type
        ))
    })?;
    Ok(UserInteraction {
        user_id: row.user_id as i64,
        event_id: row.event_id,
        kind,
        at: Utc
            .timestamp_opt(row.interaction_dt.unix_timestamp(), 0)
            .single()
            .unwrap_or_else(Utc::now),
    })
}

#[async_trait]
impl BehaviorStore for ClickHouseBehaviorLog {
    async fn insert_interaction(&self, interaction: &UserInteraction) -> Result<()> {
        let row = InteractionRow {
            user_id: interaction.user_id as u64,
            event_id: interaction.event_id,
            interaction_type: interaction.kind.as_str().to_string(),
            interaction_dt: to_offset(interaction.at)?,
        };

        let mut insert = self
            .client
            .insert("users_interactions")
            .map_err(|e| CityPulseError::BehaviorStore(e.to_string()))?;
        self.bounded(async {
            insert.write(&row).await?;
            insert.end().await
        })
        .await
    }

    async fn insert_given_recommendation(
        &self,
        user_id: i64,
        items: &[RecItem],
        at: DateTime<Utc>,
    ) -> Result<()> {
        let row = GivenRecommendationRow {
            user_id: user_id as u64,
            recommended_events: items
                .iter()
                .map(RecommendedEvent::from)
                .map(|rec| RecommendedEventRow {
                    event_id: rec.event_id,
                    subsystem_kind: rec.subsystem.as_str().to_string(),
                    score: rec.score,
                })
                .collect(),
            recommendation_dt: to_offset(at)?,
        };

        let mut insert = self
            .client
            .insert("given_recommendations")
            .map_err(|e| CityPulseError::BehaviorStore(e.to_string()))?;
        self.bounded(async {
            insert.write(&row).await?;
            insert.end().await
        })
        .await?;

        debug!(user_id, items = items.len(), "Recorded given recommendation");
        Ok(())
    }

    async fn get_interactions_by_user(
        &self,
        user_id: i64,
        after: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<UserInteraction>> {
        let rows: Vec<InteractionRow> = self
            .bounded(
                self.client
                    .query(
                        "SELECT user_id, event_id, interaction_type, interaction_dt \
                         FROM users_interactions \
                         WHERE user_id = ? AND interaction_dt >= toDateTime(?) \
                         ORDER BY interaction_dt DESC \
                         LIMIT ?",
                    )
                    .bind(user_id as u64)
                    .bind(after.timestamp())
                    .bind(limit)
                    .fetch_all(),
            )
            .await?;

        rows.into_iter().map(from_row).collect()
    }

    async fn get_interactions_by_event(
        &self,
        event_id: Uuid,
        after: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<UserInteraction>> {
        let rows: Vec<InteractionRow> = self
            .bounded(
                self.client
                    .query(
                        "SELECT user_id, event_id, interaction_type, interaction_dt \
                         FROM users_interactions \
                         WHERE event_id = toUUID(?) AND interaction_dt >= toDateTime(?) \
                         ORDER BY interaction_dt DESC \
                         LIMIT ?",
                    )
                    .bind(event_id.to_string())
                    .bind(after.timestamp())
                    .bind(limit)
                    .fetch_all(),
            )
            .await?;

        rows.into_iter().map(from_row).collect()
    }
}
