//! Event catalog client (postgres)
//!
//! The catalog owns the authoritative event rows and the user descriptions.
//! Events are insert-only (`service_id` unique across providers); users are
//! owned by the outer product, so the recommender only touches their
//! `description` column.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{debug, info};

use crate::config::CatalogDbConfig;
use crate::error::CityPulseError;
use crate::models::event::EventData;
use crate::Result;

const CREATE_EVENTS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS resonanse_events (
    id UUID PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT,

    datetime_from TIMESTAMPTZ NOT NULL,
    datetime_to TIMESTAMPTZ,
    city TEXT,

    venue_title TEXT,
    venue_address TEXT,
    venue_lat FLOAT8,
    venue_lon FLOAT8,

    image_url TEXT,
    local_image_path TEXT,

    price_price FLOAT8,
    price_currency VARCHAR(255),

    tags TEXT[],
    contact TEXT,

    service_id TEXT NOT NULL UNIQUE,
    service_type TEXT,
    service_data JSONB
)
";

const CREATE_USERS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS resonanse_users (
    id BIGSERIAL PRIMARY KEY,
    username TEXT UNIQUE,

    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    city TEXT,
    description TEXT,

    -- contacts data
    email TEXT,
    phone TEXT,
    tg_username TEXT,
    tg_user_id BIGINT,

    -- auth data
    password_hash VARCHAR(1023),

    user_type INT NOT NULL
)
";

/// Catalog operations used by the recommender and the ingestion pipeline
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Insert an event row. Returns `false` when an event with the same
    /// `service_id` already exists; rows are never overwritten.
    async fn add_event(&self, event: &EventData) -> Result<bool>;

    /// The user's free-text description, when the user exists and has one.
    async fn fetch_description_by_user_id(&self, user_id: i64) -> Result<Option<String>>;

    /// Store the user's description. Returns `false` when the user row does
    /// not exist (users are created by the outer product).
    async fn set_user_description(&self, user_id: i64, description: &str) -> Result<bool>;
}

/// Postgres-backed [`CatalogStore`]
pub struct PostgresCatalog {
    pool: PgPool,
}

impl PostgresCatalog {
    pub async fn new(config: &CatalogDbConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.url)
            .await
            .map_err(|e| CityPulseError::Catalog(format!("connection failed: {}", e)))?;

        info!(
            max_connections = config.max_connections,
            "Connected to event catalog"
        );
        Ok(Self { pool })
    }

    /// Create the catalog tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        for ddl in [CREATE_EVENTS_TABLE, CREATE_USERS_TABLE] {
            sqlx::query(ddl)
                .execute(&self.pool)
                .await
                .map_err(|e| CityPulseError::Catalog(e.to_string()))?;
        }
        debug!("Catalog schema ready");
        Ok(())
    }

    /// Probe the connection.
    pub async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }
}

#[async_trait]
impl CatalogStore for PostgresCatalog {
    async fn add_event(&self, event: &EventData) -> Result<bool> {
        let (price_amount, price_currency) = match &event.price {
            Some(price) => (Some(price.price), Some(price.currency.clone())),
            None => (None, None),
        };

        let result = sqlx::query(
            "INSERT INTO resonanse_events (
                id, title, description, datetime_from, datetime_to, city,
                venue_title, venue_address, venue_lat, venue_lon,
                image_url, local_image_path, price_price, price_currency,
                tags, contact, service_id, service_type, service_data
            ) VALUES (
                $1, $2, $3, $4, $5, $6,
                $7, $8, $9, $10,
                $11, $12, $13, $14,
                $15, $16, $17, $18, $19
            )
            ON CONFLICT (service_id) DO NOTHING",
        )
        .bind(event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.datetime_from)
        .bind(event.datetime_to)
        .bind(&event.city)
        .bind(&event.venue.title)
        .bind(&event.venue.address)
        .bind(event.venue.lat)
        .bind(event.venue.lon)
        .bind(&event.picture.image_url)
        .bind(&event.picture.local_image)
        .bind(price_amount)
        .bind(price_currency)
        .bind(&event.tags)
        .bind(&event.contact)
        .bind(&event.service_id)
        .bind(event.service_type.as_str())
        .bind(&event.service_data)
        .execute(&self.pool)
        .await
        .map_err(|e| CityPulseError::Catalog(format!("event insert failed: {}", e)))?;

        Ok(result.rows_affected() == 1)
    }

    async fn fetch_description_by_user_id(&self, user_id: i64) -> Result<Option<String>> {
        let row = sqlx::query("SELECT description FROM resonanse_users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CityPulseError::Catalog(format!("description fetch failed: {}", e)))?;

        Ok(row.and_then(|r| r.get::<Option<String>, _>("description")))
    }

    async fn set_user_description(&self, user_id: i64, description: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE resonanse_users SET description = $2 WHERE id = $1")
            .bind(user_id)
            .bind(description)
            .execute(&self.pool)
            .await
            .map_err(|e| CityPulseError::Catalog(format!("description update failed: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }
}
