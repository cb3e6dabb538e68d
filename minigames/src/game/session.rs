//! Session lifecycle envelope shared by both engines.
//!
//! A `GameSession` owns the roster, the append-only elimination list and the
//! `running` flag. `finish` is the only way to flip `running` and succeeds
//! exactly once, which is what makes completion idempotent when the clock
//! and an explicit stop race each other.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::GameError;
use crate::types::{ChannelId, GameKind, ParticipantId};

use super::registry::ParticipantRegistry;

// ============================================================================
// Eliminations
// ============================================================================

/// Why a participant left the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EliminationReason {
    /// Picked a panel that was not safe.
    WrongChoice,
    /// Sent a message while the light was red.
    SpokeDuringRed,
    /// Silent for the whole AFK window.
    Afk,
    /// Finished below the correct-answer threshold.
    NotEnoughCorrect,
    /// Still on the bridge when time ran out.
    TimedOut,
}

impl EliminationReason {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WrongChoice => "wrong_choice",
            Self::SpokeDuringRed => "spoke_during_red",
            Self::Afk => "afk",
            Self::NotEnoughCorrect => "not_enough_correct",
            Self::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for EliminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single elimination, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Elimination {
    /// Who was eliminated.
    pub participant: ParticipantId,
    /// Why.
    pub reason: EliminationReason,
    /// When.
    pub at: DateTime<Utc>,
}

// ============================================================================
// Completion
// ============================================================================

/// Why a session completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum CompletionReason {
    /// Every bridge segment was cleared.
    AllSegmentsCleared,
    /// Nobody was left to take a turn.
    QueueExhausted,
    /// The session clock fired.
    Deadline,
    /// The question pool ran dry.
    QuestionsExhausted,
    /// A moderator stopped the game.
    Terminated,
    /// The engine hit an invariant violation and was force-completed.
    InternalError(String),
}

impl CompletionReason {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AllSegmentsCleared => "all_segments_cleared",
            Self::QueueExhausted => "queue_exhausted",
            Self::Deadline => "deadline",
            Self::QuestionsExhausted => "questions_exhausted",
            Self::Terminated => "terminated",
            Self::InternalError(_) => "internal_error",
        }
    }
}

impl fmt::Display for CompletionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InternalError(message) => write!(f, "internal error: {message}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Correct-answer tally for one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Score {
    /// Participant.
    pub participant: ParticipantId,
    /// Correct answers so far.
    pub correct: u32,
}

/// Game-specific part of the final standings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StandingsDetail {
    /// Bridge progress.
    Bridge {
        /// Highest segment cleared (0 if none).
        last_cleared_segment: u32,
        /// Segments needed for a win.
        total_segments: u32,
    },
    /// Reaction tallies.
    Reaction {
        /// Per-participant correct answers, in registration order.
        scores: Vec<Score>,
        /// Threshold applied at completion.
        min_correct: u32,
    },
}

/// Final summary handed to the broadcaster on completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Standings {
    /// Channel the session ran in.
    pub channel: ChannelId,
    /// Which game.
    pub game: GameKind,
    /// Why it ended.
    pub reason: CompletionReason,
    /// Participants still standing.
    pub survivors: Vec<ParticipantId>,
    /// Every elimination, in order.
    pub eliminated: Vec<Elimination>,
    /// Game-specific detail.
    pub detail: StandingsDetail,
    /// When the session was created.
    pub started_at: DateTime<Utc>,
    /// When `finish` succeeded.
    pub finished_at: DateTime<Utc>,
}

impl Standings {
    /// Ids of eliminated participants, in elimination order.
    #[must_use]
    pub fn losers(&self) -> Vec<ParticipantId> {
        self.eliminated.iter().map(|e| e.participant.clone()).collect()
    }
}

// ============================================================================
// GameSession
// ============================================================================

/// Lifecycle envelope for one session in one channel.
#[derive(Debug)]
pub struct GameSession<T> {
    channel: ChannelId,
    kind: GameKind,
    running: bool,
    registry: ParticipantRegistry<T>,
    eliminated: Vec<Elimination>,
    started_at: DateTime<Utc>,
}

impl<T> GameSession<T> {
    /// Creates a running session.
    ///
    /// # Errors
    ///
    /// Returns `GameError::InvalidConfiguration` if the roster is empty or
    /// contains duplicates.
    pub fn create<I, F>(
        channel: ChannelId,
        kind: GameKind,
        roster: I,
        now: DateTime<Utc>,
        init: F,
    ) -> Result<Self, GameError>
    where
        I: IntoIterator<Item = ParticipantId>,
        F: FnMut(&ParticipantId) -> T,
    {
        let registry = ParticipantRegistry::new(roster, init)?;
        Ok(Self {
            channel,
            kind,
            running: true,
            registry,
            eliminated: Vec::new(),
            started_at: now,
        })
    }

    /// Channel this session is bound to.
    #[must_use]
    pub const fn channel(&self) -> &ChannelId {
        &self.channel
    }

    /// Which game this session runs.
    #[must_use]
    pub const fn kind(&self) -> GameKind {
        self.kind
    }

    /// `true` until `finish` succeeds.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Creation time.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Participant registry.
    #[must_use]
    pub const fn registry(&self) -> &ParticipantRegistry<T> {
        &self.registry
    }

    /// Mutable participant registry.
    pub const fn registry_mut(&mut self) -> &mut ParticipantRegistry<T> {
        &mut self.registry
    }

    /// Eliminations so far, in order.
    #[must_use]
    pub fn eliminated(&self) -> &[Elimination] {
        &self.eliminated
    }

    /// Eliminates a participant.
    ///
    /// Returns `None` when the session is finished or the participant is
    /// unknown or already eliminated, so racing triggers record at most one
    /// entry.
    pub fn eliminate(
        &mut self,
        participant: &ParticipantId,
        reason: EliminationReason,
        at: DateTime<Utc>,
    ) -> Option<Elimination> {
        if !self.running {
            return None;
        }
        let elimination = Elimination {
            participant: participant.clone(),
            reason,
            at,
        };
        if !self.registry.mark_eliminated(&elimination) {
            debug!(channel = %self.channel, %participant, "eliminate ignored");
            return None;
        }
        info!(channel = %self.channel, %participant, %reason, "participant eliminated");
        self.eliminated.push(elimination.clone());
        Some(elimination)
    }

    /// Completes the session exactly once.
    ///
    /// The first call flips `running` and returns the standings; every later
    /// call returns `None`.
    pub fn finish(
        &mut self,
        reason: CompletionReason,
        survivors: Vec<ParticipantId>,
        detail: StandingsDetail,
        now: DateTime<Utc>,
    ) -> Option<Standings> {
        if !self.running {
            debug!(channel = %self.channel, %reason, "session already finished");
            return None;
        }
        self.running = false;
        info!(
            channel = %self.channel,
            game = %self.kind,
            %reason,
            survivors = survivors.len(),
            eliminated = self.eliminated.len(),
            "session finished"
        );
        Some(Standings {
            channel: self.channel.clone(),
            game: self.kind,
            reason,
            survivors,
            eliminated: self.eliminated.clone(),
            detail,
            started_at: self.started_at,
            finished_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(names: &[&str]) -> GameSession<()> {
        GameSession::create(
            ChannelId::from("lobby"),
            GameKind::Bridge,
            names.iter().map(|n| ParticipantId::from(*n)),
            Utc::now(),
            |_| (),
        )
        .unwrap()
    }

    fn detail() -> StandingsDetail {
        StandingsDetail::Bridge {
            last_cleared_segment: 0,
            total_segments: 1,
        }
    }

    #[test]
    fn test_eliminate_is_idempotent() {
        let mut s = session(&["a", "b"]);
        let a = ParticipantId::from("a");
        let now = Utc::now();
        assert!(s.eliminate(&a, EliminationReason::WrongChoice, now).is_some());
        assert!(s.eliminate(&a, EliminationReason::TimedOut, now).is_none());
        assert_eq!(s.eliminated().len(), 1);
        assert_eq!(s.eliminated()[0].reason, EliminationReason::WrongChoice);
    }

    #[test]
    fn test_eliminate_unknown_is_noop() {
        let mut s = session(&["a"]);
        let ghost = ParticipantId::from("ghost");
        assert!(s.eliminate(&ghost, EliminationReason::Afk, Utc::now()).is_none());
        assert!(s.eliminated().is_empty());
    }

    #[test]
    fn test_finish_exactly_once() {
        let mut s = session(&["a", "b"]);
        let now = Utc::now();
        let survivors = s.registry().active_ids();
        let standings = s
            .finish(CompletionReason::Terminated, survivors, detail(), now)
            .unwrap();
        assert_eq!(standings.survivors.len(), 2);
        assert!(!s.is_running());
        assert!(
            s.finish(CompletionReason::Deadline, Vec::new(), detail(), now)
                .is_none()
        );
    }

    #[test]
    fn test_no_elimination_after_finish() {
        let mut s = session(&["a"]);
        let now = Utc::now();
        s.finish(CompletionReason::Terminated, Vec::new(), detail(), now);
        assert!(
            s.eliminate(&ParticipantId::from("a"), EliminationReason::Afk, now)
                .is_none()
        );
    }

    #[test]
    fn test_completion_reason_serialization() {
        let json = serde_json::to_value(CompletionReason::InternalError("boom".into())).unwrap();
        assert_eq!(json["kind"], "internal_error");
        assert_eq!(json["message"], "boom");
        let json = serde_json::to_value(CompletionReason::Deadline).unwrap();
        assert_eq!(json["kind"], "deadline");
    }
}
