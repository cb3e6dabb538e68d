//! Per-session participant bookkeeping.
//!
//! The registry is fixed at session creation: no late joins, no removals.
//! Eliminated participants stay in the map for reporting but can no longer
//! be borrowed mutably.

use indexmap::IndexMap;
use indexmap::map::Entry;

use crate::error::GameError;
use crate::types::ParticipantId;

use super::session::Elimination;

/// One registered participant and its game-specific payload.
#[derive(Debug, Clone)]
pub struct ParticipantRecord<T> {
    /// Stable identifier, unique within the session.
    pub id: ParticipantId,
    /// Set once, never cleared.
    pub eliminated: Option<Elimination>,
    /// Game-specific state (`()` for the bridge).
    pub data: T,
}

impl<T> ParticipantRecord<T> {
    /// Returns `true` until the participant is eliminated.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.eliminated.is_none()
    }
}

/// Ordered map of participant id to record.
///
/// Iteration follows registration order.
#[derive(Debug, Clone)]
pub struct ParticipantRegistry<T> {
    records: IndexMap<ParticipantId, ParticipantRecord<T>>,
}

impl<T> ParticipantRegistry<T> {
    /// Builds the registry from a roster.
    ///
    /// # Errors
    ///
    /// Returns `GameError::InvalidConfiguration` if the roster is empty or
    /// names the same participant twice.
    pub fn new<I, F>(roster: I, mut init: F) -> Result<Self, GameError>
    where
        I: IntoIterator<Item = ParticipantId>,
        F: FnMut(&ParticipantId) -> T,
    {
        let mut records = IndexMap::new();
        for id in roster {
            match records.entry(id) {
                Entry::Occupied(entry) => {
                    return Err(GameError::InvalidConfiguration(format!(
                        "participant '{}' is registered twice",
                        entry.key()
                    )));
                }
                Entry::Vacant(entry) => {
                    let data = init(entry.key());
                    let id = entry.key().clone();
                    entry.insert(ParticipantRecord {
                        id,
                        eliminated: None,
                        data,
                    });
                }
            }
        }
        if records.is_empty() {
            return Err(GameError::InvalidConfiguration(
                "roster is empty".to_string(),
            ));
        }
        Ok(Self { records })
    }

    /// Number of registered participants, eliminated or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always `false` for a constructed registry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Looks up a participant.
    #[must_use]
    pub fn get(&self, id: &ParticipantId) -> Option<&ParticipantRecord<T>> {
        self.records.get(id)
    }

    /// Mutable access to a participant that is still active.
    pub fn active_mut(&mut self, id: &ParticipantId) -> Option<&mut ParticipantRecord<T>> {
        self.records.get_mut(id).filter(|r| r.is_active())
    }

    /// Returns `true` if the participant is registered and not eliminated.
    #[must_use]
    pub fn is_active(&self, id: &ParticipantId) -> bool {
        self.records.get(id).is_some_and(ParticipantRecord::is_active)
    }

    /// All records in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ParticipantRecord<T>> {
        self.records.values()
    }

    /// Active records in registration order.
    pub fn active(&self) -> impl Iterator<Item = &ParticipantRecord<T>> {
        self.records.values().filter(|r| r.is_active())
    }

    /// Mutable active records in registration order.
    pub fn active_iter_mut(&mut self) -> impl Iterator<Item = &mut ParticipantRecord<T>> {
        self.records.values_mut().filter(|r| r.is_active())
    }

    /// Ids of active participants in registration order.
    #[must_use]
    pub fn active_ids(&self) -> Vec<ParticipantId> {
        self.active().map(|r| r.id.clone()).collect()
    }

    /// Records the elimination; `false` if unknown or already eliminated.
    pub(crate) fn mark_eliminated(&mut self, elimination: &Elimination) -> bool {
        match self.active_mut(&elimination.participant) {
            Some(record) => {
                record.eliminated = Some(elimination.clone());
                true
            }
            None => false,
        }
    }
}
