//! # CityPulse Ingestion
//!
//! Consumes parsed events from the provider queues, persists them to the
//! event catalog and, when the description is long enough to embed, indexes
//! their vector for the recommender.

pub mod config;
pub mod consumer;
pub mod pipeline;

pub use config::IngestionConfig;
pub use consumer::{EventConsumer, EVENTS_QUEUES};
pub use pipeline::{EventPipeline, IngestOutcome};
