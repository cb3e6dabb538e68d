//! Identifier newtypes and the game kind selector.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of a participant on the chat platform.
///
/// Wraps whatever the platform adapter uses (user snowflake, handle, ...).
/// Used as the key of every per-session participant map.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    /// Creates a new `ParticipantId`.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
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
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Opaque identifier of the channel a session is bound to.
///
/// At most one session runs per channel.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub String);

impl ChannelId {
    /// Creates a new `ChannelId`.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Which minigame a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum GameKind {
    /// Turn-based glass bridge crossing.
    Bridge,
    /// Broadcast red light / green light quiz.
    Reaction,
}

impl GameKind {
    /// Returns the label used in logs, metrics and wire messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bridge => "bridge",
            Self::Reaction => "reaction",
        }
    }
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_serialize_transparently() {
        let id = ParticipantId::new("alice");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"alice\"");
        let channel: ChannelId = serde_json::from_str("\"general\"").unwrap();
        assert_eq!(channel, ChannelId::from("general"));
    }

    #[test]
    fn test_game_kind_labels() {
        assert_eq!(GameKind::Bridge.to_string(), "bridge");
        assert_eq!(GameKind::Reaction.as_str(), "reaction");
        let kind: GameKind = serde_json::from_str("\"reaction\"").unwrap();
        assert_eq!(kind, GameKind::Reaction);
    }
}
