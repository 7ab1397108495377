//! Recommendation result types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::EventData;

/// Candidate-generation subsystem a recommendation item came from.
///
/// Set once at generation time; the blender never rewrites it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecSubsystem {
    /// Profile-text similarity
    Basic,
    /// Recent signed feedback
    Dynamic,
    /// Neighbor-taste average
    Collaborative,
}

impl RecSubsystem {
    /// String form stored in the behavior log
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "BASIC",
            Self::Dynamic => "DYNAMIC",
            Self::Collaborative => "COLLABORATIVE",
        }
    }
}

/// One scored recommendation candidate.
///
/// Treated as a value during rescoring: transforms produce new items rather
/// than mutating a shared list, so a list can never be rescored twice by
/// accident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecItem {
    pub subsystem: RecSubsystem,
    pub event: EventData,
    pub score: f32,
}

impl RecItem {
    pub fn new(subsystem: RecSubsystem, event: EventData, score: f32) -> Self {
        Self {
            subsystem,
            event,
            score,
        }
    }

    /// Same item with a different score
    pub fn with_score(&self, score: f32) -> Self {
        Self {
            subsystem: self.subsystem,
            event: self.event.clone(),
            score,
        }
    }
}

/// Audit form of a recommendation: what the behavior log keeps about each
/// returned item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedEvent {
    pub event_id: Uuid,
    pub subsystem: RecSubsystem,
    pub score: f32,
}

impl From<&RecItem> for RecommendedEvent {
    fn from(item: &RecItem) -> Self {
        Self {
            event_id: item.event.id,
            subsystem: item.subsystem,
            score: item.score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subsystem_wire_values() {
        assert_eq!(
            serde_json::to_string(&RecSubsystem::Collaborative).unwrap(),
            "\"COLLABORATIVE\""
        );
        assert_eq!(
            serde_json::from_str::<RecSubsystem>("\"BASIC\"").unwrap(),
            RecSubsystem::Basic
        );
    }
}
