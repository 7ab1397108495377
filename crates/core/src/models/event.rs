//! Event records as produced by the upstream providers
//!
//! The JSON shape of [`EventData`] is the wire format used on the provider
//! queues and the payload format stored in the vector index, so field names
//! and enum values here are load-bearing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events with a description shorter than this are not worth embedding and
/// get no vector in the index.
pub const MIN_EVENT_DESCRIPTION_CHARS: usize = 20;

/// Upstream provider an event was ingested from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventSource {
    Kudago,
    Timepad,
    Networkly,
    Resonanse,
}

impl EventSource {
    /// String form used on the wire and in the catalog
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kudago => "KUDAGO",
            Self::Timepad => "TIMEPAD",
            Self::Networkly => "NETWORKLY",
            Self::Resonanse => "RESONANSE",
        }
    }
}

/// Where an event takes place
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

/// Event artwork: the provider URL plus an optional mirrored local path
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Picture {
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub local_image: Option<String>,
}

/// Ticket price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub price: f64,
    pub currency: String,
}

/// A city event as stored in the catalog and carried through the
/// recommendation pipeline.
///
/// `service_id` is unique across (provider, provider-internal-id); rows are
/// never mutated after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub datetime_from: DateTime<Utc>,
    #[serde(default)]
    pub datetime_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub venue: Venue,
    #[serde(default)]
    pub picture: Picture,
    #[serde(default)]
    pub price: Option<Price>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub contact: Option<String>,
    pub service_id: String,
    pub service_type: EventSource,
    /// Provider-specific extras, passed through untouched
    #[serde(default)]
    pub service_data: serde_json::Value,
}

impl EventData {
    /// Whether the description is long enough to embed.
    pub fn is_indexable(&self) -> bool {
        self.description
            .as_deref()
            .map(|d| d.chars().count() >= MIN_EVENT_DESCRIPTION_CHARS)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(description: Option<&str>) -> EventData {
        EventData {
            id: Uuid::new_v4(),
            title: "Synth Meetup".to_string(),
            description: description.map(str::to_string),
            datetime_from: Utc::now(),
            datetime_to: None,
            city: Some("Berlin".to_string()),
            venue: Venue::default(),
            picture: Picture::default(),
            price: None,
            tags: vec!["music".to_string()],
            contact: None,
            service_id: "KUDAGO-1234".to_string(),
            service_type: EventSource::Kudago,
            service_data: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_indexable_threshold() {
        assert!(!sample_event(None).is_indexable());
        assert!(!sample_event(Some("too short")).is_indexable());
        // 19 characters: still below the threshold
        assert!(!sample_event(Some("exactly 19 chars ab")).is_indexable());
        assert!(sample_event(Some("a proper description of the event")).is_indexable());
    }

    #[test]
    fn test_wire_enum_values() {
        assert_eq!(
            serde_json::to_string(&EventSource::Kudago).unwrap(),
            "\"KUDAGO\""
        );
        assert_eq!(
            serde_json::from_str::<EventSource>("\"TIMEPAD\"").unwrap(),
            EventSource::Timepad
        );
    }

    #[test]
    fn test_round_trip_preserves_fields() {
        let event = sample_event(Some("a proper description of the event"));
        let json = serde_json::to_string(&event).unwrap();
        let back: EventData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_minimal_payload_deserializes() {
        // Optional fields may be entirely absent on the wire.
        let json = serde_json::json!({
            "id": "6e4ff0c3-7b1e-4cbb-9dfd-0c0a5f7a2a11",
            "title": "Open air cinema",
            "datetime_from": "2026-08-15T19:00:00Z",
            "service_id": "TIMEPAD-42",
            "service_type": "TIMEPAD",
        });
        let event: EventData = serde_json::from_value(json).unwrap();
        assert_eq!(event.city, None);
        assert!(event.tags.is_empty());
        assert_eq!(event.venue, Venue::default());
    }

    #[test]
    fn test_malformed_payload_is_rejected() {
        // datetime_from is mandatory
        let json = serde_json::json!({
            "id": "6e4ff0c3-7b1e-4cbb-9dfd-0c0a5f7a2a11",
            "title": "No date",
            "service_id": "TIMEPAD-43",
            "service_type": "TIMEPAD",
        });
        assert!(serde_json::from_value::<EventData>(json).is_err());
    }
}
