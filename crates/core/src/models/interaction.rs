//! User-event interactions recorded in the behavior log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of feedback a user gave on an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Click,
    Like,
    Dislike,
}

impl InteractionKind {
    /// String stored in the behavior log
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Like => "like",
            Self::Dislike => "dislike",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "click" => Some(Self::Click),
            "like" => Some(Self::Like),
            "dislike" => Some(Self::Dislike),
            _ => None,
        }
    }
}

/// One append-only behavior-log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInteraction {
    pub user_id: i64,
    pub event_id: Uuid,
    pub kind: InteractionKind,
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            InteractionKind::Click,
            InteractionKind::Like,
            InteractionKind::Dislike,
        ] {
            assert_eq!(InteractionKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(InteractionKind::parse("view"), None);
    }

    #[test]
    fn test_wire_values_are_lowercase() {
        assert_eq!(
            serde_json::to_string(&InteractionKind::Dislike).unwrap(),
            "\"dislike\""
        );
    }
}
