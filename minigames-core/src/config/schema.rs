//! Configuration schema types
//!
//! This module defines the configuration types for the minigames host.
//! These types are deserialized from YAML configuration files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{ChannelId, GameKind, ParticipantId};

// ============================================================================
// Top-Level Configuration
// ============================================================================

/// Root configuration for a minigames host process.
///
/// `host` carries process-wide settings; `games` lists sessions started as
/// soon as the host boots. Both are optional so that an empty document is a
/// valid (idle) host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HostConfig {
    /// Process-wide settings
    #[serde(default)]
    pub host: HostSettings,

    /// Sessions started at boot
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub games: Vec<GameSpec>,
}

/// Process-wide host settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HostSettings {
    /// Participants allowed to issue moderator commands
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub moderators: Vec<ParticipantId>,

    /// Period of the background AFK sweep
    #[serde(
        default = "HostSettings::default_afk_sweep_interval",
        with = "duration"
    )]
    pub afk_sweep_interval: Duration,
}

impl HostSettings {
    const fn default_afk_sweep_interval() -> Duration {
        Duration::from_secs(30)
    }

    /// Returns `true` when `issuer` may run moderator commands.
    #[must_use]
    pub fn is_moderator(&self, issuer: &ParticipantId) -> bool {
        self.moderators.contains(issuer)
    }
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            moderators: Vec::new(),
            afk_sweep_interval: Self::default_afk_sweep_interval(),
        }
    }
}

// ============================================================================
// Game Specification
// ============================================================================

/// A session bound to a channel, as listed under `games` in the config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GameSpec {
    /// Channel the session is bound to
    pub channel: ChannelId,

    /// Everything else needed to start the session
    #[serde(flatten)]
    pub setup: GameSetup,
}

impl GameSpec {
    /// Returns which game this spec starts.
    #[must_use]
    pub const fn kind(&self) -> GameKind {
        self.setup.kind()
    }
}

/// Roster, limits and rules for one session.
///
/// Carried by the `start` moderator command, where the channel comes from
/// the command envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GameSetup {
    /// Registered roster, in registration order
    pub participants: Vec<ParticipantId>,

    /// Wall-clock limit after which the session completes
    #[serde(default = "GameSetup::default_time_limit", with = "duration")]
    pub time_limit: Duration,

    /// Shuffle the roster before the first turn is handed out
    #[serde(default = "GameSetup::default_shuffle")]
    pub shuffle: bool,

    /// Seed for the session RNG; drawn from the OS when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Roles requested for winners and losers on completion
    #[serde(default)]
    pub roles: RoleSettings,

    /// Game-specific rules
    pub game: GameRules,
}

impl GameSetup {
    const fn default_time_limit() -> Duration {
        Duration::from_secs(5 * 60)
    }

    const fn default_shuffle() -> bool {
        true
    }

    /// Returns which game this setup starts.
    #[must_use]
    pub const fn kind(&self) -> GameKind {
        match self.game {
            GameRules::Bridge(_) => GameKind::Bridge,
            GameRules::Reaction(_) => GameKind::Reaction,
        }
    }

    /// Binds the setup to a channel.
    #[must_use]
    pub fn into_spec(self, channel: ChannelId) -> GameSpec {
        GameSpec {
            channel,
            setup: self,
        }
    }
}

/// Optional role names handed to the role assigner on completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RoleSettings {
    /// Role for survivors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,

    /// Role for eliminated participants
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loser: Option<String>,
}

/// Game-specific rules, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameRules {
    /// Turn-based glass bridge crossing
    Bridge(BridgeRules),
    /// Red light / green light quiz
    Reaction(ReactionRules),
}

/// Rules for the bridge crossing game.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BridgeRules {
    /// Number of segments to clear for a win
    pub segments: u32,

    /// Panels per segment; exactly one is safe
    #[serde(default = "BridgeRules::default_positions")]
    pub positions: u8,
}

impl BridgeRules {
    /// Four panels per segment.
    pub const DEFAULT_POSITIONS: u8 = 4;

    const fn default_positions() -> u8 {
        Self::DEFAULT_POSITIONS
    }
}

/// Rules for the reaction light game.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReactionRules {
    /// Correct answers required to survive completion
    #[serde(default = "ReactionRules::default_min_correct")]
    pub min_correct: u32,

    /// Penalty window after a wrong answer
    #[serde(default = "ReactionRules::default_cooldown", with = "duration")]
    pub cooldown: Duration,

    /// Silence tolerated before AFK elimination
    #[serde(default = "ReactionRules::default_afk", with = "duration")]
    pub afk: Duration,

    /// Where the question pool comes from
    pub questions: QuestionSource,
}

impl ReactionRules {
    /// Wrong-answer penalty box.
    pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5 * 60);

    /// Maximum tolerated silence.
    pub const DEFAULT_AFK: Duration = Duration::from_secs(20 * 60);

    const fn default_min_correct() -> u32 {
        5
    }

    const fn default_cooldown() -> Duration {
        Self::DEFAULT_COOLDOWN
    }

    const fn default_afk() -> Duration {
        Self::DEFAULT_AFK
    }
}

/// Question pool source.
///
/// ```yaml
/// questions:
///   file: quiz.txt
/// ```
///
/// or an inline list of [`Question`]s.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionSource {
    /// Path to a question file, resolved relative to the config file
    File(PathBuf),
    /// Questions listed directly in the config
    Inline(Vec<Question>),
}

// ============================================================================
// Questions
// ============================================================================

/// One quiz question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Question {
    /// Text shown to participants
    pub prompt: String,

    /// Expected answer; a single letter refers to `choices`
    pub answer: String,

    /// Multiple-choice options, labelled `A`, `B`, ...
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
}

impl Question {
    /// Creates a question without choices.
    #[must_use]
    pub fn new(prompt: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            answer: answer.into(),
            choices: Vec::new(),
        }
    }

    /// Adds multiple-choice options.
    #[must_use]
    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    /// Trimmed, case-insensitive comparison against the expected answer.
    #[must_use]
    pub fn is_correct(&self, content: &str) -> bool {
        content.trim().to_lowercase() == self.answer.trim().to_lowercase()
    }

    /// Index into `choices` when the answer is a single letter `A`.. .
    #[must_use]
    pub fn answer_index(&self) -> Option<usize> {
        let mut chars = self.answer.trim().chars();
        let letter = chars.next()?;
        if chars.next().is_some() || !letter.is_ascii_uppercase() {
            return None;
        }
        let idx = (letter as u8 - b'A') as usize;
        (idx < self.choices.len()).then_some(idx)
    }

    /// Answer as shown when it is revealed, e.g. `B. Paris`.
    #[must_use]
    pub fn revealed_answer(&self) -> String {
        let answer = self.answer.trim();
        match self.answer_index() {
            Some(idx) => format!("{answer}. {}", self.choices[idx]),
            None => answer.to_string(),
        }
    }
}

// ============================================================================
// Duration (de)serialization
// ============================================================================

/// Serde helpers for humantime durations (`30s`, `5m`, `1h 30m`).
///
/// Plain integers are accepted as seconds.
pub mod duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    /// Serializes as a humantime string.
    ///
    /// # Errors
    ///
    /// Returns the serializer's error.
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    /// Deserializes from a humantime string or an integer number of seconds.
    ///
    /// # Errors
    ///
    /// Returns an error when the string is not a valid duration.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => humantime::parse_duration(text.trim())
                .map_err(|e| de::Error::custom(format!("invalid duration '{text}': {e}"))),
        }
    }
}
