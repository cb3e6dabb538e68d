//! Elimination-game state engine.
//!
//! Pure state transitions: every handler takes `now` explicitly, mutates
//! the engine and returns the [`Change`]s it made. Nothing in this module
//! performs I/O; the host renders changes and drives the clock.

pub mod bridge;
pub mod change;
pub mod clock;
pub mod engine;
pub mod reaction;
pub mod registry;
pub mod session;

use std::time::Duration;

use chrono::{DateTime, Utc};

pub use bridge::{BridgeGame, PanelChoice};
pub use change::{
    BridgePhase, BridgeSnapshot, Change, IgnoreReason, QuestionView, ReactionPhase,
    ReactionSnapshot, Snapshot,
};
pub use clock::SessionClock;
pub use engine::{Engine, GameEngine, GameEvent};
pub use reaction::{AnswerState, ReactionGame};
pub use registry::{ParticipantRecord, ParticipantRegistry};
pub use session::{
    CompletionReason, Elimination, EliminationReason, GameSession, Score, Standings,
    StandingsDetail,
};

/// Time from `since` to `now`; zero when `now` is earlier.
pub(crate) fn elapsed(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - since).to_std().unwrap_or(Duration::ZERO)
}
