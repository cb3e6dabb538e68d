//! Structured descriptions of state transitions.
//!
//! Engine handlers return a `Vec<Change>` instead of talking to the
//! channel; the host renders them through the broadcaster. `Snapshot` is
//! the renderable view of an engine after a batch of changes.

use std::fmt;

use serde::Serialize;

use minigames_core::config::Question;

use crate::types::ParticipantId;

use super::session::{Elimination, Score, Standings};

/// Why an inbound event had no effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// Session already completed.
    NotRunning,
    /// Sender is not on the roster.
    UnknownParticipant,
    /// Sender was eliminated earlier.
    Eliminated,
    /// Sender does not hold the turn.
    OutOfTurn,
    /// Panel token does not name a panel.
    InvalidPosition,
    /// Nobody is waiting to take over the turn.
    EmptyQueue,
    /// No question has been drawn yet.
    NoQuestion,
    /// Sender already answered this question.
    AlreadyAnswered,
    /// Sender is inside the wrong-answer penalty window.
    CoolingDown,
    /// Signal already in the requested state.
    SignalUnchanged,
    /// Event kind means nothing to this game.
    NotApplicable,
}

impl IgnoreReason {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotRunning => "not_running",
            Self::UnknownParticipant => "unknown_participant",
            Self::Eliminated => "eliminated",
            Self::OutOfTurn => "out_of_turn",
            Self::InvalidPosition => "invalid_position",
            Self::EmptyQueue => "empty_queue",
            Self::NoQuestion => "no_question",
            Self::AlreadyAnswered => "already_answered",
            Self::CoolingDown => "cooling_down",
            Self::SignalUnchanged => "signal_unchanged",
            Self::NotApplicable => "not_applicable",
        }
    }
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One state transition, as reported to the broadcast layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Change {
    /// The session was created and is accepting events.
    Started {
        /// Session id assigned by the host.
        session_id: uuid::Uuid,
        /// Roster, in registration order.
        participants: Vec<ParticipantId>,
    },
    /// Event was a policy no-op.
    Ignored {
        /// Why it was dropped.
        reason: IgnoreReason,
    },
    /// The turn holder found the safe panel.
    SegmentCleared {
        /// Turn holder, who keeps the turn.
        participant: ParticipantId,
        /// Segment that was cleared (1-based).
        segment: u32,
        /// Panel that was chosen (0-based).
        position: u8,
    },
    /// The turn holder picked a breaking panel.
    ChoiceFailed {
        /// Former turn holder.
        participant: ParticipantId,
        /// Panel that broke (0-based).
        position: u8,
        /// Who takes over, if anyone.
        next_turn: Option<ParticipantId>,
    },
    /// The turn moved without an elimination.
    TurnSwitched {
        /// Requeued participant.
        from: ParticipantId,
        /// New turn holder.
        to: ParticipantId,
    },
    /// A participant was eliminated.
    Eliminated(Elimination),
    /// The reaction light changed.
    SignalChanged {
        /// `true` for green.
        allowed: bool,
        /// Question drawn on the way into green.
        question: Option<QuestionView>,
        /// Answer of the previous question, revealed when a new one is drawn.
        previous_answer: Option<String>,
    },
    /// A random signal landed on the light already showing.
    SignalRepeated {
        /// `true` for green.
        allowed: bool,
    },
    /// An answer was scored.
    AnswerScored {
        /// Who answered.
        participant: ParticipantId,
        /// Whether it matched.
        correct: bool,
        /// Tally after scoring.
        correct_count: u32,
    },
    /// The session finished; carries the final standings.
    Completed(Standings),
}

impl Change {
    /// Shorthand for an ignored event.
    #[must_use]
    pub const fn ignored(reason: IgnoreReason) -> Self {
        Self::Ignored { reason }
    }

    /// Returns `true` for policy no-ops.
    #[must_use]
    pub const fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored { .. })
    }

    /// Label used in logs, metrics and event records.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::Ignored { .. } => "ignored",
            Self::SegmentCleared { .. } => "segment_cleared",
            Self::ChoiceFailed { .. } => "choice_failed",
            Self::TurnSwitched { .. } => "turn_switched",
            Self::Eliminated(_) => "eliminated",
            Self::SignalChanged { .. } => "signal_changed",
            Self::SignalRepeated { .. } => "signal_repeated",
            Self::AnswerScored { .. } => "answer_scored",
            Self::Completed(_) => "completed",
        }
    }
}

/// A question as shown to participants; never carries the answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionView {
    /// Question text.
    pub prompt: String,
    /// Choices labelled `A. ...`, `B. ...`; empty for open questions.
    pub choices: Vec<String>,
}

impl From<&Question> for QuestionView {
    fn from(question: &Question) -> Self {
        let choices = question
            .choices
            .iter()
            .zip('A'..='Z')
            .map(|(choice, label)| format!("{label}. {choice}"))
            .collect();
        Self {
            prompt: question.prompt.clone(),
            choices,
        }
    }
}

// ============================================================================
// Snapshots
// ============================================================================

/// Bridge phase as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgePhase {
    /// Waiting for the turn holder's choice.
    SegmentOpen,
    /// Every segment cleared.
    CompleteWin,
    /// Nobody left to take a turn.
    CompleteLoss,
    /// Clock fired first.
    CompleteTimeout,
    /// Stopped by a moderator.
    Terminated,
    /// Force-completed after an invariant violation.
    Failed,
}

/// Reaction phase as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionPhase {
    /// No signal given yet; treated as red.
    AwaitSignal,
    /// Answers accepted.
    Green,
    /// Any message is a fault.
    Red,
    /// Session finished.
    Complete,
}

/// Renderable state of a bridge session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BridgeSnapshot {
    /// Current phase.
    pub phase: BridgePhase,
    /// Turn holder.
    pub turn: Option<ParticipantId>,
    /// Queue after the turn holder.
    pub waiting: Vec<ParticipantId>,
    /// Current segment (1-based).
    pub segment: u32,
    /// Segments needed for a win.
    pub total_segments: u32,
    /// Panels per segment.
    pub positions: u8,
    /// Broken panels in the current segment.
    pub revealed: Vec<u8>,
    /// Eliminated participants, in order.
    pub eliminated: Vec<ParticipantId>,
}

/// Renderable state of a reaction session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReactionSnapshot {
    /// Current phase.
    pub phase: ReactionPhase,
    /// `true` while green.
    pub signal_allowed: bool,
    /// Current question, if any.
    pub question: Option<QuestionView>,
    /// Questions left in the pool.
    pub questions_remaining: usize,
    /// Tallies for participants still in the game.
    pub scores: Vec<Score>,
    /// Threshold applied at completion.
    pub min_correct: u32,
    /// Eliminated participants, in order.
    pub eliminated: Vec<ParticipantId>,
}

/// Renderable state of either engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "game", rename_all = "snake_case")]
pub enum Snapshot {
    /// Bridge state.
    Bridge(BridgeSnapshot),
    /// Reaction state.
    Reaction(ReactionSnapshot),
}
