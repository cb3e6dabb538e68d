//! Active sessions, one per channel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use minigames_core::config::RoleSettings;

use crate::error::GameError;
use crate::game::{Engine, GameEngine, SessionClock};
use crate::types::{ChannelId, GameKind};

/// A running session as owned by the host.
///
/// The engine lock is held only while a handler runs; handlers never
/// await, so the lock is a plain `std::sync::Mutex`.
#[derive(Debug)]
pub struct SessionHandle {
    id: Uuid,
    channel: ChannelId,
    kind: GameKind,
    roles: RoleSettings,
    engine: Mutex<Engine>,
    clock: Mutex<Option<SessionClock>>,
}

impl SessionHandle {
    /// Wraps a freshly created engine.
    #[must_use]
    pub fn new(engine: Engine, roles: RoleSettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel: engine.channel().clone(),
            kind: engine.kind(),
            roles,
            engine: Mutex::new(engine),
            clock: Mutex::new(None),
        }
    }

    /// Unique id of this session.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Channel the session is bound to.
    #[must_use]
    pub const fn channel(&self) -> &ChannelId {
        &self.channel
    }

    /// Which game.
    #[must_use]
    pub const fn kind(&self) -> GameKind {
        self.kind
    }

    /// Roles to request on completion.
    #[must_use]
    pub const fn roles(&self) -> &RoleSettings {
        &self.roles
    }

    /// Locks the engine.
    ///
    /// A poisoned lock is recovered: engine state is only mutated through
    /// handlers that leave it consistent before returning.
    pub fn lock_engine(&self) -> MutexGuard<'_, Engine> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `true` while the engine accepts events.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.lock_engine().is_running()
    }

    /// Installs the deadline clock.
    ///
    /// If the session already completed the clock is cancelled right away.
    pub fn set_clock(&self, clock: SessionClock) {
        let running = self.is_running();
        let mut slot = self.clock.lock().unwrap_or_else(PoisonError::into_inner);
        if !running {
            clock.cancel();
        }
        *slot = Some(clock);
    }

    /// Cancels the deadline clock, if any.
    pub fn cancel_clock(&self) {
        let clock = self
            .clock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(clock) = clock {
            clock.cancel();
        }
    }
}

/// Map of channel to active session.
///
/// Lookups clone the `Arc` out so no shard lock is held while a session
/// lock is taken.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<ChannelId, Arc<SessionHandle>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Session owning `channel`, if any.
    #[must_use]
    pub fn get(&self, channel: &ChannelId) -> Option<Arc<SessionHandle>> {
        self.sessions.get(channel).map(|entry| Arc::clone(entry.value()))
    }

    /// Registers `handle` for its channel.
    ///
    /// A completed session still in the map is replaced.
    ///
    /// # Errors
    ///
    /// Returns `GameError::SessionAlreadyRunning` when the channel has a
    /// running session.
    pub fn insert(&self, handle: Arc<SessionHandle>) -> Result<(), GameError> {
        match self.sessions.entry(handle.channel().clone()) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_running() {
                    return Err(GameError::SessionAlreadyRunning(handle.channel().clone()));
                }
                entry.insert(handle);
            }
            Entry::Vacant(entry) => {
                entry.insert(handle);
            }
        }
        Ok(())
    }

    /// Removes the entry for `channel` only if it is session `id`.
    ///
    /// Returns `true` if an entry was removed.
    pub fn remove(&self, channel: &ChannelId, id: Uuid) -> bool {
        self.sessions
            .remove_if(channel, |_, handle| handle.id() == id)
            .is_some()
    }

    /// Snapshot of every registered session.
    #[must_use]
    pub fn handles(&self) -> Vec<Arc<SessionHandle>> {
        self.sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// `true` when no session is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
