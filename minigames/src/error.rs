//! Error types for the minigames host
//!
//! Process-level error hierarchy with exit-code mapping. Configuration
//! errors live in `minigames-core` and are re-exported here.

use thiserror::Error;

use crate::types::{ChannelId, GameKind, ParticipantId};

pub use minigames_core::error::{ConfigError, Severity, ValidationIssue};

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `minigames` CLI operations.
///
/// These codes follow Unix conventions.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Transport error (malformed stream, oversized line)
    pub const TRANSPORT_ERROR: i32 = 4;

    /// Game engine error (invalid session, invariant violation)
    pub const GAME_ERROR: i32 = 5;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for host operations.
///
/// Aggregates the domain-specific errors and maps each to an exit code.
#[derive(Debug, Error)]
pub enum MinigamesError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Game engine error
    #[error(transparent)]
    Game(#[from] GameError),

    /// Transport layer error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl MinigamesError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::Game(_) => ExitCode::GAME_ERROR,
            Self::Transport(_) => ExitCode::TRANSPORT_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

// ============================================================================
// Game Errors
// ============================================================================

/// Errors raised by sessions, engines and the host's command handling.
///
/// Stale, duplicate and out-of-turn events are not errors; engines report
/// them as ignored changes instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    /// Session could not be created from the given roster or rules
    #[error("invalid game configuration: {0}")]
    InvalidConfiguration(String),

    /// Question pool is drained
    #[error("no questions remaining")]
    NoQuestionsRemaining,

    /// Engine reached a state inconsistent with its own model
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// A session is already running in the channel
    #[error("a game is already running in channel {0}")]
    SessionAlreadyRunning(ChannelId),

    /// No session is running in the channel
    #[error("no game is running in channel {0}")]
    NoSession(ChannelId),

    /// Issuer is not a moderator
    #[error("{0} is not allowed to run moderator commands")]
    NotAuthorized(ParticipantId),

    /// Command does not apply to the running game
    #[error("'{command}' is not supported by the {game} game")]
    UnsupportedCommand {
        /// Command name
        command: &'static str,
        /// Game running in the channel
        game: GameKind,
    },
}

// ============================================================================
// Transport Errors
// ============================================================================

/// Transport layer errors for the NDJSON stdio transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error during transport operations
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Inbound line exceeds the size limit
    #[error("message too large: {size} bytes (limit: {limit})")]
    MessageTooLarge {
        /// Line length in bytes, without the newline
        size: usize,
        /// Configured size limit in bytes
        limit: usize,
    },
}

// ============================================================================
// Role Assignment Errors
// ============================================================================

/// Failures reported by a `RoleAssigner`.
///
/// These never affect the session outcome; the host logs them and moves on.
#[derive(Debug, Error)]
pub enum RoleAssignmentError {
    /// The outbound queue is gone (host shutting down)
    #[error("role request queue closed")]
    QueueClosed,
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for host operations.
pub type Result<T> = std::result::Result<T, MinigamesError>;

// ============================================================================
// Tests
// ============================================================================
