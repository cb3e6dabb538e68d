//! NDJSON wire format exchanged with the platform adapter.
//!
//! Every line is one JSON object tagged by `type`. Inbound lines are
//! messages, interactions and moderator commands; outbound lines are
//! updates, summaries, role requests and rejections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use minigames_core::config::GameSetup;

use crate::broadcast::RoleRequest;
use crate::game::{Change, Snapshot, Standings};
use crate::types::{ChannelId, ParticipantId};

// ============================================================================
// Inbound
// ============================================================================

/// One inbound line.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    /// Chat message.
    Message {
        /// Channel it was posted in.
        channel: ChannelId,
        /// Sender.
        participant: ParticipantId,
        /// Raw content.
        text: String,
        /// Platform timestamp; the host clock is used when absent.
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
    },
    /// Button-style interaction.
    Interaction {
        /// Channel the button belongs to.
        channel: ChannelId,
        /// Who pressed it.
        participant: ParticipantId,
        /// `"1".."N"` or `"switch"`.
        token: String,
    },
    /// Moderator command.
    Command {
        /// Target channel.
        channel: ChannelId,
        /// Who sent it.
        issuer: ParticipantId,
        /// What to do.
        command: Command,
    },
}

impl Inbound {
    /// Channel the line targets.
    #[must_use]
    pub const fn channel(&self) -> &ChannelId {
        match self {
            Self::Message { channel, .. }
            | Self::Interaction { channel, .. }
            | Self::Command { channel, .. } => channel,
        }
    }

    /// Label used in logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::Interaction { .. } => "interaction",
            Self::Command { .. } => "command",
        }
    }
}

/// Moderator command payload, tagged by `action`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
    /// Start a session in the channel.
    Start {
        /// Roster and rules.
        game: GameSetup,
    },
    /// Set the reaction light; `null` picks at random.
    Signal {
        /// Requested light.
        #[serde(default)]
        allowed: Option<bool>,
    },
    /// Pass the bridge turn.
    SwitchTurn,
    /// Stop the session.
    Terminate,
}

impl Command {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Signal { .. } => "signal",
            Self::SwitchTurn => "switch_turn",
            Self::Terminate => "terminate",
        }
    }
}

/// Decodes one inbound line.
///
/// # Errors
///
/// Returns the JSON error for malformed or unknown input.
pub fn decode_inbound(line: &str) -> Result<Inbound, serde_json::Error> {
    serde_json::from_str(line)
}

// ============================================================================
// Outbound
// ============================================================================

/// One outbound line.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    /// A state transition and the state after it.
    Update {
        /// Channel to post in.
        channel: ChannelId,
        /// What changed.
        change: Change,
        /// Renderable state.
        state: Snapshot,
    },
    /// Final standings.
    Summary {
        /// Channel to post in.
        channel: ChannelId,
        /// Outcome.
        standings: Standings,
    },
    /// Role assignment request.
    Roles(RoleRequest),
    /// A moderator command was refused.
    Rejected {
        /// Channel the command targeted.
        channel: ChannelId,
        /// Who sent it.
        #[serde(skip_serializing_if = "Option::is_none")]
        issuer: Option<ParticipantId>,
        /// Why.
        reason: String,
    },
}

impl Outbound {
    /// Channel the line is addressed to.
    #[must_use]
    pub const fn channel(&self) -> &ChannelId {
        match self {
            Self::Update { channel, .. }
            | Self::Summary { channel, .. }
            | Self::Rejected { channel, .. } => channel,
            Self::Roles(request) => &request.channel,
        }
    }
}
