//! Common engine capability and the tagged union over both games.
//!
//! The game kind is selected once, when the session is created from its
//! `GameSetup`; after that every event goes through [`GameEngine`].

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;

use minigames_core::config::{GameRules, GameSpec, Question};

use crate::error::GameError;
use crate::types::{ChannelId, GameKind, ParticipantId};

use super::bridge::{BridgeGame, PanelChoice};
use super::change::{Change, IgnoreReason, Snapshot};
use super::reaction::ReactionGame;
use super::session::CompletionReason;

/// An inbound event, already routed to its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// Chat message.
    Message {
        /// Sender.
        participant: ParticipantId,
        /// Raw content.
        text: String,
    },
    /// Button-style interaction.
    Interaction {
        /// Sender.
        participant: ParticipantId,
        /// Raw token (`"1".."N"` or `"switch"`).
        token: String,
    },
    /// Moderator signal; `None` picks at random.
    Signal {
        /// Requested light.
        allowed: Option<bool>,
    },
    /// Pass the bridge turn.
    SwitchTurn {
        /// Who asked.
        issuer: ParticipantId,
        /// Whether the issuer is a moderator.
        moderator: bool,
    },
    /// Moderator stop.
    Terminate,
}

impl GameEvent {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::Interaction { .. } => "interaction",
            Self::Signal { .. } => "signal",
            Self::SwitchTurn { .. } => "switch_turn",
            Self::Terminate => "terminate",
        }
    }
}

/// Capability shared by both engines.
///
/// Handlers never block and never fail on stale or duplicate input; only
/// invariant violations and commands the game does not support are errors.
pub trait GameEngine {
    /// Which game this is.
    fn kind(&self) -> GameKind;

    /// Channel the session is bound to.
    fn channel(&self) -> &ChannelId;

    /// `true` until the session completes.
    fn is_running(&self) -> bool;

    /// Applies one inbound event.
    ///
    /// # Errors
    ///
    /// Returns `GameError::UnsupportedCommand` for commands that do not
    /// apply to this game and `GameError::InvariantViolation` when the
    /// engine finds itself in an inconsistent state.
    fn handle_event(&mut self, event: GameEvent, now: DateTime<Utc>)
    -> Result<Vec<Change>, GameError>;

    /// Deadline reached.
    fn on_timeout(&mut self, now: DateTime<Utc>) -> Vec<Change>;

    /// Periodic housekeeping (AFK sweep).
    fn sweep(&mut self, now: DateTime<Utc>) -> Vec<Change>;

    /// Force-completes with `CompletionReason::InternalError`.
    fn fail(&mut self, message: String, now: DateTime<Utc>) -> Vec<Change>;

    /// Renderable state.
    fn snapshot(&self) -> Snapshot;
}

impl GameEngine for BridgeGame {
    fn kind(&self) -> GameKind {
        GameKind::Bridge
    }

    fn channel(&self) -> &ChannelId {
        self.session().channel()
    }

    fn is_running(&self) -> bool {
        self.session().is_running()
    }

    fn handle_event(
        &mut self,
        event: GameEvent,
        now: DateTime<Utc>,
    ) -> Result<Vec<Change>, GameError> {
        match event {
            GameEvent::Interaction { participant, token } => match PanelChoice::parse(&token) {
                Some(PanelChoice::Panel(position)) => {
                    self.resolve_choice(&participant, position, now)
                }
                Some(PanelChoice::Switch) => self.switch_turn(&participant, false),
                None => Ok(vec![Change::ignored(IgnoreReason::InvalidPosition)]),
            },
            GameEvent::SwitchTurn { issuer, moderator } => self.switch_turn(&issuer, moderator),
            GameEvent::Terminate => Ok(self.terminate(now)),
            GameEvent::Message { .. } => Ok(vec![Change::ignored(IgnoreReason::NotApplicable)]),
            GameEvent::Signal { .. } => Err(GameError::UnsupportedCommand {
                command: "signal",
                game: GameKind::Bridge,
            }),
        }
    }

    fn on_timeout(&mut self, now: DateTime<Utc>) -> Vec<Change> {
        Self::on_timeout(self, now)
    }

    fn sweep(&mut self, _now: DateTime<Utc>) -> Vec<Change> {
        Vec::new()
    }

    fn fail(&mut self, message: String, now: DateTime<Utc>) -> Vec<Change> {
        Self::fail(self, message, now)
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::Bridge(Self::snapshot(self))
    }
}

impl GameEngine for ReactionGame {
    fn kind(&self) -> GameKind {
        GameKind::Reaction
    }

    fn channel(&self) -> &ChannelId {
        self.session().channel()
    }

    fn is_running(&self) -> bool {
        self.session().is_running()
    }

    fn handle_event(
        &mut self,
        event: GameEvent,
        now: DateTime<Utc>,
    ) -> Result<Vec<Change>, GameError> {
        match event {
            GameEvent::Message { participant, text } => {
                Ok(self.handle_message(&participant, &text, now))
            }
            GameEvent::Signal {
                allowed: Some(allowed),
            } => Ok(self.set_signal(allowed, now)),
            GameEvent::Signal { allowed: None } => Ok(self.random_signal(now)),
            GameEvent::Terminate => Ok(self.terminate(now)),
            GameEvent::Interaction { .. } => {
                Ok(vec![Change::ignored(IgnoreReason::NotApplicable)])
            }
            GameEvent::SwitchTurn { .. } => Err(GameError::UnsupportedCommand {
                command: "switch_turn",
                game: GameKind::Reaction,
            }),
        }
    }

    fn on_timeout(&mut self, now: DateTime<Utc>) -> Vec<Change> {
        Self::on_timeout(self, now)
    }

    fn sweep(&mut self, now: DateTime<Utc>) -> Vec<Change> {
        Self::sweep(self, now)
    }

    fn fail(&mut self, message: String, now: DateTime<Utc>) -> Vec<Change> {
        Self::fail(self, message, now)
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::Reaction(Self::snapshot(self))
    }
}

/// One of the two engines, chosen at session creation.
#[derive(Debug)]
pub enum Engine {
    /// Bridge crossing.
    Bridge(BridgeGame),
    /// Reaction light.
    Reaction(ReactionGame),
}

impl Engine {
    /// Builds the engine described by `spec`.
    ///
    /// `questions` is the resolved question pool; it is ignored for the
    /// bridge. The RNG is seeded from `spec.setup.seed` when present.
    ///
    /// # Errors
    ///
    /// Returns `GameError::InvalidConfiguration` if the roster or rules
    /// are unusable.
    pub fn from_spec(
        spec: &GameSpec,
        questions: Vec<Question>,
        now: DateTime<Utc>,
    ) -> Result<Self, GameError> {
        let setup = &spec.setup;
        let rng = setup
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        let roster = setup.participants.clone();
        match &setup.game {
            GameRules::Bridge(rules) => BridgeGame::new(
                spec.channel.clone(),
                roster,
                rules,
                setup.shuffle,
                rng,
                now,
            )
            .map(Self::Bridge),
            GameRules::Reaction(rules) => {
                ReactionGame::new(spec.channel.clone(), roster, rules, questions, rng, now)
                    .map(Self::Reaction)
            }
        }
    }

    fn inner(&self) -> &dyn GameEngine {
        match self {
            Self::Bridge(game) => game,
            Self::Reaction(game) => game,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn GameEngine {
        match self {
            Self::Bridge(game) => game,
            Self::Reaction(game) => game,
        }
    }

    /// Completes the session with `reason`, whatever the game.
    ///
    /// Used by the host on shutdown and for moderator stops.
    pub fn done(&mut self, reason: CompletionReason, now: DateTime<Utc>) -> Vec<Change> {
        match (self, reason) {
            (Self::Bridge(game), CompletionReason::Deadline) => game.on_timeout(now),
            (Self::Bridge(game), CompletionReason::InternalError(message)) => {
                game.fail(message, now)
            }
            (Self::Bridge(game), _) => game.terminate(now),
            (Self::Reaction(game), CompletionReason::InternalError(message)) => {
                game.fail(message, now)
            }
            (Self::Reaction(game), reason) => game.done(reason, now),
        }
    }
}

impl GameEngine for Engine {
    fn kind(&self) -> GameKind {
        self.inner().kind()
    }

    fn channel(&self) -> &ChannelId {
        self.inner().channel()
    }

    fn is_running(&self) -> bool {
        self.inner().is_running()
    }

    fn handle_event(
        &mut self,
        event: GameEvent,
        now: DateTime<Utc>,
    ) -> Result<Vec<Change>, GameError> {
        self.inner_mut().handle_event(event, now)
    }

    fn on_timeout(&mut self, now: DateTime<Utc>) -> Vec<Change> {
        self.inner_mut().on_timeout(now)
    }

    fn sweep(&mut self, now: DateTime<Utc>) -> Vec<Change> {
        self.inner_mut().sweep(now)
    }

    fn fail(&mut self, message: String, now: DateTime<Utc>) -> Vec<Change> {
        self.inner_mut().fail(message, now)
    }

    fn snapshot(&self) -> Snapshot {
        self.inner().snapshot()
    }
}
