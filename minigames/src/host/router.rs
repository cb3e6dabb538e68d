//! Delivers inbound events to the session that owns the channel.
//!
//! Every path into an engine goes through [`EventRouter::apply`]: lock the
//! engine, run one handler, snapshot, unlock, then publish. Completion is
//! detected from the returned changes, so it is reported exactly once no
//! matter whether a message, a moderator stop or the clock got there first.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use minigames_core::config::{GameRules, GameSpec, HostSettings, Question};

use crate::broadcast::{ChannelBroadcaster, RoleAssigner, RoleRequest};
use crate::config::{ConfigLimits, Validator, resolve_questions};
use crate::error::{GameError, MinigamesError};
use crate::game::{
    Change, CompletionReason, Engine, GameEngine, GameEvent, SessionClock, Snapshot, Standings,
    elapsed,
};
use crate::observability::{Event, EventEmitter, metrics};
use crate::transport::{Command, Inbound};
use crate::types::{ChannelId, ParticipantId};

use super::registry::{SessionHandle, SessionRegistry};

/// Collaborators the router needs.
pub struct RouterOptions {
    /// Moderators and sweep interval.
    pub settings: HostSettings,
    /// Active sessions.
    pub registry: Arc<SessionRegistry>,
    /// Outbound updates.
    pub broadcaster: Arc<dyn ChannelBroadcaster>,
    /// Outbound role requests.
    pub role_assigner: Arc<dyn RoleAssigner>,
    /// Structured event stream.
    pub events: Arc<EventEmitter>,
    /// Directory relative question files resolve against.
    pub base_dir: PathBuf,
    /// Size limits for question files and rosters.
    pub limits: ConfigLimits,
}

/// Routes inbound events and owns the completion protocol.
///
/// Cheap to clone; clock callbacks hold a clone.
#[derive(Clone)]
pub struct EventRouter {
    inner: Arc<RouterOptions>,
    tasks: TaskTracker,
}

impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRouter")
            .field("sessions", &self.inner.registry.len())
            .finish_non_exhaustive()
    }
}

impl EventRouter {
    /// Creates a router.
    #[must_use]
    pub fn new(options: RouterOptions) -> Self {
        Self {
            inner: Arc::new(options),
            tasks: TaskTracker::new(),
        }
    }

    /// Background role-assignment tasks.
    #[must_use]
    pub const fn tasks(&self) -> &TaskTracker {
        &self.tasks
    }

    /// Session registry.
    #[must_use]
    pub fn registry(&self) -> &SessionRegistry {
        &self.inner.registry
    }

    /// Routes one inbound message.
    ///
    /// Never fails: no-ops are logged, command failures are posted back
    /// to the channel as rejections.
    pub fn route(&self, inbound: Inbound) {
        metrics::record_inbound(inbound.kind());
        match inbound {
            Inbound::Message {
                channel,
                participant,
                text,
                timestamp,
            } => {
                let now = message_time(timestamp, Utc::now());
                self.deliver(&channel, GameEvent::Message { participant, text }, now);
            }
            Inbound::Interaction {
                channel,
                participant,
                token,
            } => {
                self.deliver(
                    &channel,
                    GameEvent::Interaction { participant, token },
                    Utc::now(),
                );
            }
            Inbound::Command {
                channel,
                issuer,
                command,
            } => self.command(channel, issuer, command),
        }
    }

    fn deliver(&self, channel: &ChannelId, event: GameEvent, now: DateTime<Utc>) {
        let Some(handle) = self.inner.registry.get(channel) else {
            debug!(%channel, event = event.kind(), "no session in channel");
            return;
        };
        if let Err(e) = self.apply(&handle, now, |engine, now| engine.handle_event(event, now)) {
            // Player events only fail on commands the game does not support,
            // which cannot happen here; log and move on.
            warn!(%channel, error = %e, "event rejected by engine");
        }
    }

    fn command(&self, channel: ChannelId, issuer: ParticipantId, command: Command) {
        let label = command.label();
        if !self.inner.settings.is_moderator(&issuer) {
            self.reject(&channel, &issuer, label, &GameError::NotAuthorized(issuer.clone()).to_string());
            return;
        }
        info!(%channel, %issuer, command = label, "moderator command");

        let result = match command {
            Command::Start { game } => self
                .start_session(game.into_spec(channel.clone()))
                .map(|_| ()),
            Command::Signal { allowed } => self
                .deliver_command(&channel, GameEvent::Signal { allowed })
                .map_err(MinigamesError::from),
            Command::SwitchTurn => self
                .deliver_command(
                    &channel,
                    GameEvent::SwitchTurn {
                        issuer: issuer.clone(),
                        moderator: true,
                    },
                )
                .map_err(MinigamesError::from),
            Command::Terminate => self
                .deliver_command(&channel, GameEvent::Terminate)
                .map_err(MinigamesError::from),
        };

        if let Err(e) = result {
            self.reject(&channel, &issuer, label, &e.to_string());
        }
    }

    fn deliver_command(&self, channel: &ChannelId, event: GameEvent) -> Result<(), GameError> {
        let handle = self
            .inner
            .registry
            .get(channel)
            .filter(|h| h.is_running())
            .ok_or_else(|| GameError::NoSession(channel.clone()))?;
        self.apply(&handle, Utc::now(), |engine, now| engine.handle_event(event, now))
    }

    fn reject(&self, channel: &ChannelId, issuer: &ParticipantId, command: &'static str, reason: &str) {
        warn!(%channel, %issuer, command, reason, "command rejected");
        metrics::record_command_rejected(command);
        self.inner.events.emit(Event::CommandRejected {
            timestamp: Utc::now(),
            channel: channel.clone(),
            issuer: issuer.clone(),
            reason: reason.to_string(),
        });
        self.inner
            .broadcaster
            .post_rejection(channel, Some(issuer), reason);
    }

    // ========================================================================
    // Session lifecycle
    // ========================================================================

    /// Creates a session, registers it and starts its clock.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns a config error when the setup is invalid or its questions
    /// cannot be loaded, and `GameError::SessionAlreadyRunning` when the
    /// channel is busy.
    pub fn start_session(&self, spec: GameSpec) -> Result<Uuid, MinigamesError> {
        if self
            .inner
            .registry
            .get(&spec.channel)
            .is_some_and(|h| h.is_running())
        {
            return Err(GameError::SessionAlreadyRunning(spec.channel).into());
        }

        let checked = Validator::new().validate_setup_only(&spec.setup, &self.inner.limits);
        if checked.has_errors() {
            return Err(crate::error::ConfigError::ValidationError {
                path: spec.channel.to_string(),
                errors: checked.errors,
            }
            .into());
        }

        let questions = self.questions_for(&spec)?;
        let now = Utc::now();
        let engine = Engine::from_spec(&spec, questions, now)?;
        let handle = Arc::new(SessionHandle::new(engine, spec.setup.roles.clone()));
        self.inner.registry.insert(Arc::clone(&handle))?;

        let router = self.clone();
        let weak = Arc::downgrade(&handle);
        handle.set_clock(SessionClock::after(spec.setup.time_limit, move || {
            if let Some(handle) = weak.upgrade() {
                router.on_deadline(&handle);
            }
        }));

        info!(
            session_id = %handle.id(),
            channel = %spec.channel,
            game = %spec.kind(),
            participants = spec.setup.participants.len(),
            time_limit = %humantime::format_duration(spec.setup.time_limit),
            "session started"
        );
        metrics::record_session_started(handle.kind());
        metrics::set_sessions_active(self.inner.registry.len());
        self.inner.events.emit(Event::SessionStarted {
            timestamp: now,
            session_id: handle.id(),
            channel: spec.channel.clone(),
            game: handle.kind(),
            participants: spec.setup.participants.len(),
        });

        let state = handle.lock_engine().snapshot();
        self.inner.broadcaster.post_update(
            &spec.channel,
            &Change::Started {
                session_id: handle.id(),
                participants: spec.setup.participants.clone(),
            },
            &state,
        );
        Ok(handle.id())
    }

    fn questions_for(&self, spec: &GameSpec) -> Result<Vec<Question>, MinigamesError> {
        match &spec.setup.game {
            GameRules::Bridge(_) => Ok(Vec::new()),
            GameRules::Reaction(rules) => Ok(resolve_questions(
                &rules.questions,
                &self.inner.base_dir,
                &self.inner.limits,
            )?),
        }
    }

    /// Clock callback.
    pub fn on_deadline(&self, handle: &Arc<SessionHandle>) {
        info!(channel = %handle.channel(), "session deadline reached");
        let _ = self.apply(handle, Utc::now(), |engine, now| Ok(engine.on_timeout(now)));
    }

    /// Runs the AFK sweep over every session.
    pub fn sweep(&self, now: DateTime<Utc>) {
        for handle in self.inner.registry.handles() {
            let _ = self.apply(&handle, now, |engine, now| Ok(engine.sweep(now)));
        }
    }

    /// Completes every session with `reason`.
    pub fn shutdown(&self, reason: &CompletionReason) {
        let handles = self.inner.registry.handles();
        if !handles.is_empty() {
            info!(sessions = handles.len(), %reason, "completing open sessions");
        }
        for handle in handles {
            let reason = reason.clone();
            let _ = self.apply(&handle, Utc::now(), move |engine, now| Ok(engine.done(reason, now)));
        }
    }

    /// Runs one handler under the session lock and publishes its changes.
    ///
    /// An invariant violation force-completes the session with
    /// `CompletionReason::InternalError`.
    ///
    /// # Errors
    ///
    /// Returns any other `GameError` from the handler; nothing is
    /// published in that case.
    pub fn apply<F>(
        &self,
        handle: &Arc<SessionHandle>,
        now: DateTime<Utc>,
        handler: F,
    ) -> Result<(), GameError>
    where
        F: FnOnce(&mut Engine, DateTime<Utc>) -> Result<Vec<Change>, GameError>,
    {
        let (changes, state) = {
            let mut engine = handle.lock_engine();
            let changes = match handler(&mut *engine, now) {
                Ok(changes) => changes,
                Err(GameError::InvariantViolation(message)) => {
                    error!(channel = %handle.channel(), %message, "invariant violation, failing session");
                    metrics::record_error("invariant");
                    engine.fail(message, now)
                }
                Err(e) => return Err(e),
            };
            (changes, engine.snapshot())
        };
        self.publish(handle, &changes, &state);
        Ok(())
    }

    fn publish(&self, handle: &Arc<SessionHandle>, changes: &[Change], state: &Snapshot) {
        for change in changes {
            match change {
                Change::Ignored { reason } => {
                    debug!(channel = %handle.channel(), %reason, "event ignored");
                    metrics::record_ignored(*reason);
                }
                Change::Completed(standings) => self.complete(handle, standings),
                Change::Eliminated(elimination) => {
                    metrics::record_elimination(handle.kind(), elimination.reason);
                    self.inner.events.emit(Event::ParticipantEliminated {
                        timestamp: elimination.at,
                        session_id: handle.id(),
                        participant: elimination.participant.clone(),
                        reason: elimination.reason,
                    });
                    self.inner
                        .broadcaster
                        .post_update(handle.channel(), change, state);
                }
                _ => self
                    .inner
                    .broadcaster
                    .post_update(handle.channel(), change, state),
            }
        }
    }

    fn complete(&self, handle: &Arc<SessionHandle>, standings: &Standings) {
        handle.cancel_clock();
        self.inner.broadcaster.post_summary(standings);
        self.inner.registry.remove(handle.channel(), handle.id());

        metrics::record_session_completed(
            handle.kind(),
            &standings.reason,
            elapsed(standings.started_at, standings.finished_at),
        );
        metrics::set_sessions_active(self.inner.registry.len());
        self.inner.events.emit(Event::SessionCompleted {
            timestamp: standings.finished_at,
            session_id: handle.id(),
            channel: standings.channel.clone(),
            reason: standings.reason.clone(),
            survivors: standings.survivors.len(),
            eliminated: standings.eliminated.len(),
        });

        if let Some(request) = RoleRequest::from_standings(standings, handle.roles()) {
            let assigner = Arc::clone(&self.inner.role_assigner);
            self.tasks.spawn(async move {
                let channel = request.channel.clone();
                if let Err(e) = assigner.apply_outcome_roles(request).await {
                    warn!(%channel, error = %e, "role assignment failed");
                    metrics::record_error("roles");
                }
            });
        }
    }
}

/// Session time for a message: the platform timestamp, capped at the host
/// clock so interactions, sweeps and deadlines never run behind it.
fn message_time(timestamp: Option<DateTime<Utc>>, host_now: DateTime<Utc>) -> DateTime<Utc> {
    timestamp.map_or(host_now, |ts| ts.min(host_now))
}
