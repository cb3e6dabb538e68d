//! Structured event stream.
//!
//! Discrete, typed session lifecycle events serialized as JSONL with a
//! monotonically increasing sequence number. The stream is an audit trail
//! for operators; it is independent of the outbound NDJSON the platform
//! adapter consumes.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::game::{CompletionReason, EliminationReason};
use crate::types::{ChannelId, GameKind, ParticipantId};

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted by the host.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The host is reading its transport.
    HostStarted {
        /// When the host started.
        timestamp: DateTime<Utc>,
        /// Number of moderators configured.
        moderators: usize,
        /// Number of sessions started from the config file.
        boot_sessions: usize,
    },

    /// The host has stopped.
    HostStopped {
        /// When the host stopped.
        timestamp: DateTime<Utc>,
        /// Human-readable stop reason.
        reason: String,
    },

    /// A session was registered for a channel.
    SessionStarted {
        /// When the session started.
        timestamp: DateTime<Utc>,
        /// Session id.
        session_id: Uuid,
        /// Channel.
        channel: ChannelId,
        /// Game kind.
        game: GameKind,
        /// Roster size.
        participants: usize,
    },

    /// A participant was eliminated.
    ParticipantEliminated {
        /// When it happened.
        timestamp: DateTime<Utc>,
        /// Session id.
        session_id: Uuid,
        /// Who.
        participant: ParticipantId,
        /// Why.
        reason: EliminationReason,
    },

    /// A session completed and was removed from the registry.
    SessionCompleted {
        /// When it completed.
        timestamp: DateTime<Utc>,
        /// Session id.
        session_id: Uuid,
        /// Channel.
        channel: ChannelId,
        /// Why it ended.
        reason: CompletionReason,
        /// Survivor count.
        survivors: usize,
        /// Elimination count.
        eliminated: usize,
    },

    /// A moderator command was refused.
    CommandRejected {
        /// When it was refused.
        timestamp: DateTime<Utc>,
        /// Channel the command targeted.
        channel: ChannelId,
        /// Who sent it.
        issuer: ParticipantId,
        /// Why it was refused.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct EventEnvelope {
    sequence: u64,
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Serialization and I/O failures are dropped; the event stream must never
/// take a session down.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates an emitter that discards everything.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: Event) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: seq,
            event,
        };

        if let Ok(mut w) = self.writer.lock() {
            if let Ok(line) = serde_json::to_string(&envelope) {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }

    /// Number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::noop()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
