//! Chat input and match output types.
//!
//! These types are serializable so they can cross a transport boundary as-is
//! (the bundled binary reads and writes them as JSON lines).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque participant identifier (display name or stable handle).
///
/// Case-sensitive; used as the dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Wraps a participant identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ParticipantId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A chat message as received from the ingestion transport.
///
/// Either field may be missing; such events are malformed and never match.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<ParticipantId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ChatEvent {
    /// Creates a well-formed chat event.
    #[must_use]
    pub fn new(participant: impl Into<ParticipantId>, message: impl Into<String>) -> Self {
        Self {
            participant: Some(participant.into()),
            message: Some(message.into()),
        }
    }

    /// Builds an event from livestream platform fields.
    ///
    /// The participant is the nickname when present and non-blank, otherwise the
    /// unique id.
    #[must_use]
    pub fn from_platform(
        nickname: Option<&str>,
        unique_id: Option<&str>,
        comment: Option<&str>,
    ) -> Self {
        let participant = nickname
            .filter(|n| !n.trim().is_empty())
            .or_else(|| unique_id.filter(|u| !u.trim().is_empty()))
            .map(ParticipantId::from);

        Self {
            participant,
            message: comment.map(str::to_string),
        }
    }

    /// Participant and message, if both are present.
    #[must_use]
    pub fn parts(&self) -> Option<(&ParticipantId, &str)> {
        match (&self.participant, &self.message) {
            (Some(p), Some(m)) => Some((p, m.as_str())),
            _ => None,
        }
    }
}

/// First match of a participant under one keyword generation.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEvent {
    pub event_id: Uuid,
    pub participant: ParticipantId,
    pub keyword: String,
    pub generation: u64,
    pub timestamp: DateTime<Utc>,
}

impl MatchEvent {
    /// Stamps a new match with a fresh id and the current time.
    #[must_use]
    pub fn new(participant: ParticipantId, keyword: impl Into<String>, generation: u64) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            participant,
            keyword: keyword.into(),
            generation,
            timestamp: Utc::now(),
        }
    }
}

/// What subscribers receive.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Delivery {
    /// A participant matched for the first time in this generation.
    Matched(MatchEvent),

    /// The keyword was cleared; observers should empty their roster.
    Cleared {
        generation: u64,
    },
}

impl Delivery {
    /// The matched participant, if this is a match.
    #[must_use]
    pub fn participant(&self) -> Option<&ParticipantId> {
        match self {
            Self::Matched(ev) => Some(&ev.participant),
            Self::Cleared { .. } => None,
        }
    }

    /// Keyword generation this delivery belongs to.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        match self {
            Self::Matched(ev) => ev.generation,
            Self::Cleared { generation } => *generation,
        }
    }
}
