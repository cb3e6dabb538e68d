//! Glass bridge crossing engine.
//!
//! One participant holds the turn and picks a panel for the current
//! segment. The safe panel clears the segment and the same participant
//! keeps going; any other panel breaks, eliminating the turn holder and
//! handing the turn to the next in the queue. The session is won when the
//! last segment is cleared and lost when nobody is left to take a turn.

use std::collections::{BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, warn};

use minigames_core::config::BridgeRules;

use crate::error::GameError;
use crate::types::{ChannelId, GameKind, ParticipantId};

use super::change::{BridgePhase, BridgeSnapshot, Change, IgnoreReason};
use super::session::{CompletionReason, EliminationReason, GameSession, StandingsDetail};

/// Interaction token that asks to pass the turn.
pub const SWITCH_TOKEN: &str = "switch";

/// A parsed bridge interaction token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelChoice {
    /// Panel index, 0-based.
    Panel(u8),
    /// Pass the turn to the next in the queue.
    Switch,
}

impl PanelChoice {
    /// Parses `"1".."N"` (1-based panel label) or `"switch"`.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.eq_ignore_ascii_case(SWITCH_TOKEN) {
            return Some(Self::Switch);
        }
        let label: u8 = token.parse().ok()?;
        label.checked_sub(1).map(Self::Panel)
    }
}

/// Turn-based bridge state machine.
#[derive(Debug)]
pub struct BridgeGame {
    session: GameSession<()>,
    turn: Option<ParticipantId>,
    waiting: VecDeque<ParticipantId>,
    segment: u32,
    total_segments: u32,
    positions: u8,
    safe_position: u8,
    revealed: BTreeSet<u8>,
    phase: BridgePhase,
    rng: StdRng,
}

impl BridgeGame {
    /// Creates a running bridge session.
    ///
    /// The first participant of the (optionally shuffled) roster takes the
    /// first turn; everyone else waits in roster order.
    ///
    /// # Errors
    ///
    /// Returns `GameError::InvalidConfiguration` for an empty or duplicated
    /// roster, zero segments, or fewer than two panels per segment.
    pub fn new(
        channel: ChannelId,
        roster: Vec<ParticipantId>,
        rules: &BridgeRules,
        shuffle: bool,
        mut rng: StdRng,
        now: DateTime<Utc>,
    ) -> Result<Self, GameError> {
        if rules.segments == 0 {
            return Err(GameError::InvalidConfiguration(
                "bridge needs at least one segment".to_string(),
            ));
        }
        if rules.positions < 2 {
            return Err(GameError::InvalidConfiguration(format!(
                "bridge needs at least two panels per segment, got {}",
                rules.positions
            )));
        }

        let session = GameSession::create(channel, GameKind::Bridge, roster, now, |_| ())?;
        let mut order = session.registry().active_ids();
        if shuffle {
            order.shuffle(&mut rng);
        }
        let mut waiting: VecDeque<ParticipantId> = order.into();
        let turn = waiting.pop_front();
        let safe_position = rng.random_range(0..rules.positions);

        Ok(Self {
            session,
            turn,
            waiting,
            segment: 1,
            total_segments: rules.segments,
            positions: rules.positions,
            safe_position,
            revealed: BTreeSet::new(),
            phase: BridgePhase::SegmentOpen,
            rng,
        })
    }

    /// Underlying session envelope.
    #[must_use]
    pub const fn session(&self) -> &GameSession<()> {
        &self.session
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> BridgePhase {
        self.phase
    }

    /// Turn holder.
    #[must_use]
    pub const fn turn(&self) -> Option<&ParticipantId> {
        self.turn.as_ref()
    }

    /// Queue after the turn holder.
    #[must_use]
    pub const fn waiting(&self) -> &VecDeque<ParticipantId> {
        &self.waiting
    }

    /// Current segment (1-based).
    #[must_use]
    pub const fn segment(&self) -> u32 {
        self.segment
    }

    /// Broken panels in the current segment.
    #[must_use]
    pub const fn revealed(&self) -> &BTreeSet<u8> {
        &self.revealed
    }

    /// Safe panel of the current segment. Never included in snapshots.
    #[must_use]
    pub const fn safe_position(&self) -> u8 {
        self.safe_position
    }

    fn is_open(&self) -> bool {
        self.session.is_running() && self.phase == BridgePhase::SegmentOpen
    }

    fn current_turn(&self) -> Result<ParticipantId, GameError> {
        self.turn.clone().ok_or_else(|| {
            GameError::InvariantViolation(format!(
                "bridge in {} has no turn holder while running",
                self.session.channel()
            ))
        })
    }

    fn survivors(&self) -> Vec<ParticipantId> {
        self.turn
            .iter()
            .chain(self.waiting.iter())
            .cloned()
            .collect()
    }

    fn last_cleared_segment(&self) -> u32 {
        self.segment.saturating_sub(1).min(self.total_segments)
    }

    fn complete(
        &mut self,
        phase: BridgePhase,
        reason: CompletionReason,
        now: DateTime<Utc>,
    ) -> Vec<Change> {
        self.phase = phase;
        let survivors = self.survivors();
        let detail = StandingsDetail::Bridge {
            last_cleared_segment: self.last_cleared_segment(),
            total_segments: self.total_segments,
        };
        self.session
            .finish(reason, survivors, detail, now)
            .map(Change::Completed)
            .into_iter()
            .collect()
    }

    /// Resolves the turn holder's panel choice.
    ///
    /// Out-of-turn, unknown and out-of-range choices are ignored. Picking
    /// an already broken panel counts as a wrong choice.
    ///
    /// # Errors
    ///
    /// Returns `GameError::InvariantViolation` if the session is running
    /// without a turn holder.
    pub fn resolve_choice(
        &mut self,
        participant: &ParticipantId,
        position: u8,
        now: DateTime<Utc>,
    ) -> Result<Vec<Change>, GameError> {
        if !self.is_open() {
            return Ok(vec![Change::ignored(IgnoreReason::NotRunning)]);
        }
        let turn = self.current_turn()?;
        if *participant != turn {
            let reason = match self.session.registry().get(participant) {
                None => IgnoreReason::UnknownParticipant,
                Some(record) if !record.is_active() => IgnoreReason::Eliminated,
                Some(_) => IgnoreReason::OutOfTurn,
            };
            debug!(channel = %self.session.channel(), %participant, %reason, "choice ignored");
            return Ok(vec![Change::ignored(reason)]);
        }
        if position >= self.positions {
            return Ok(vec![Change::ignored(IgnoreReason::InvalidPosition)]);
        }

        if position == self.safe_position {
            let cleared = self.segment;
            self.segment = cleared.checked_add(1).ok_or_else(|| {
                GameError::InvariantViolation(format!(
                    "bridge in {} ran past segment {cleared}",
                    self.session.channel()
                ))
            })?;
            let mut changes = vec![Change::SegmentCleared {
                participant: turn,
                segment: cleared,
                position,
            }];
            if self.segment > self.total_segments {
                changes.extend(self.complete(
                    BridgePhase::CompleteWin,
                    CompletionReason::AllSegmentsCleared,
                    now,
                ));
            } else {
                self.safe_position = self.rng.random_range(0..self.positions);
                self.revealed.clear();
            }
            return Ok(changes);
        }

        self.revealed.insert(position);
        let elimination = self
            .session
            .eliminate(&turn, EliminationReason::WrongChoice, now);
        self.turn = self.waiting.pop_front();
        let mut changes = vec![Change::ChoiceFailed {
            participant: turn,
            position,
            next_turn: self.turn.clone(),
        }];
        changes.extend(elimination.map(Change::Eliminated));
        if self.turn.is_none() {
            changes.extend(self.complete(
                BridgePhase::CompleteLoss,
                CompletionReason::QueueExhausted,
                now,
            ));
        }
        Ok(changes)
    }

    /// Passes the turn to the next participant in the queue.
    ///
    /// Allowed for the turn holder and for moderators. The former turn
    /// holder goes to the back of the queue; nobody is eliminated.
    ///
    /// # Errors
    ///
    /// Returns `GameError::InvariantViolation` if the session is running
    /// without a turn holder.
    pub fn switch_turn(
        &mut self,
        issuer: &ParticipantId,
        moderator: bool,
    ) -> Result<Vec<Change>, GameError> {
        if !self.is_open() {
            return Ok(vec![Change::ignored(IgnoreReason::NotRunning)]);
        }
        let from = self.current_turn()?;
        if *issuer != from && !moderator {
            return Ok(vec![Change::ignored(IgnoreReason::OutOfTurn)]);
        }
        let Some(to) = self.waiting.pop_front() else {
            return Ok(vec![Change::ignored(IgnoreReason::EmptyQueue)]);
        };
        self.waiting.push_back(from.clone());
        self.turn = Some(to.clone());
        Ok(vec![Change::TurnSwitched { from, to }])
    }

    /// Clock fired: everyone still on the bridge is eliminated.
    pub fn on_timeout(&mut self, now: DateTime<Utc>) -> Vec<Change> {
        if !self.session.is_running() {
            return vec![Change::ignored(IgnoreReason::NotRunning)];
        }
        let stranded: Vec<ParticipantId> = self.survivors();
        self.turn = None;
        self.waiting.clear();
        let mut changes: Vec<Change> = stranded
            .iter()
            .filter_map(|p| self.session.eliminate(p, EliminationReason::TimedOut, now))
            .map(Change::Eliminated)
            .collect();
        changes.extend(self.complete(
            BridgePhase::CompleteTimeout,
            CompletionReason::Deadline,
            now,
        ));
        changes
    }

    /// Moderator stop: completes without eliminating anyone.
    pub fn terminate(&mut self, now: DateTime<Utc>) -> Vec<Change> {
        if !self.session.is_running() {
            return vec![Change::ignored(IgnoreReason::NotRunning)];
        }
        self.complete(BridgePhase::Terminated, CompletionReason::Terminated, now)
    }

    /// Force-completes after an invariant violation.
    pub fn fail(&mut self, message: String, now: DateTime<Utc>) -> Vec<Change> {
        if !self.session.is_running() {
            return vec![Change::ignored(IgnoreReason::NotRunning)];
        }
        warn!(channel = %self.session.channel(), %message, "bridge force-completed");
        self.complete(
            BridgePhase::Failed,
            CompletionReason::InternalError(message),
            now,
        )
    }

    /// Renderable state; hides the safe panel.
    #[must_use]
    pub fn snapshot(&self) -> BridgeSnapshot {
        BridgeSnapshot {
            phase: self.phase,
            turn: self.turn.clone(),
            waiting: self.waiting.iter().cloned().collect(),
            segment: self.segment.min(self.total_segments),
            total_segments: self.total_segments,
            positions: self.positions,
            revealed: self.revealed.iter().copied().collect(),
            eliminated: self
                .session
                .eliminated()
                .iter()
                .map(|e| e.participant.clone())
                .collect(),
        }
    }

    #[cfg(test)]
    pub(crate) fn clear_turn_for_test(&mut self) {
        self.turn = None;
    }
}
