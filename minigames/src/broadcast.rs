//! Outbound collaborators.
//!
//! The engines produce structured [`Change`]s and [`Standings`]; the
//! broadcaster turns them into outbound wire messages and the role
//! assigner forwards the winner/loser role request. Neither ever blocks
//! a session: both push onto the host's unbounded outbound queue.

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use minigames_core::config::RoleSettings;

use crate::error::RoleAssignmentError;
use crate::game::{Change, Snapshot, Standings};
use crate::transport::Outbound;
use crate::types::{ChannelId, ParticipantId};

// ============================================================================
// ChannelBroadcaster
// ============================================================================

/// Posts renderable updates to a channel.
///
/// Implementations must not block; they are called right after the
/// session lock is released, on the routing path.
pub trait ChannelBroadcaster: Send + Sync {
    /// One state transition plus the state after it.
    fn post_update(&self, channel: &ChannelId, change: &Change, state: &Snapshot);

    /// Final standings.
    fn post_summary(&self, standings: &Standings);

    /// A refused moderator command.
    fn post_rejection(&self, channel: &ChannelId, issuer: Option<&ParticipantId>, reason: &str);
}

/// Broadcaster that enqueues wire messages for the transport writer.
#[derive(Debug, Clone)]
pub struct QueueBroadcaster {
    tx: UnboundedSender<Outbound>,
}

impl QueueBroadcaster {
    /// Creates a broadcaster feeding `tx`.
    #[must_use]
    pub const fn new(tx: UnboundedSender<Outbound>) -> Self {
        Self { tx }
    }

    fn push(&self, message: Outbound) {
        if self.tx.send(message).is_err() {
            tracing::debug!("outbound queue closed, dropping message");
        }
    }
}

impl ChannelBroadcaster for QueueBroadcaster {
    fn post_update(&self, channel: &ChannelId, change: &Change, state: &Snapshot) {
        self.push(Outbound::Update {
            channel: channel.clone(),
            change: change.clone(),
            state: state.clone(),
        });
    }

    fn post_summary(&self, standings: &Standings) {
        self.push(Outbound::Summary {
            channel: standings.channel.clone(),
            standings: standings.clone(),
        });
    }

    fn post_rejection(&self, channel: &ChannelId, issuer: Option<&ParticipantId>, reason: &str) {
        self.push(Outbound::Rejected {
            channel: channel.clone(),
            issuer: issuer.cloned(),
            reason: reason.to_string(),
        });
    }
}

// ============================================================================
// RoleAssigner
// ============================================================================

/// Winner/loser role request emitted once per completed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleRequest {
    /// Channel the session ran in.
    pub channel: ChannelId,
    /// Survivors.
    pub winners: Vec<ParticipantId>,
    /// Eliminated participants, in elimination order.
    pub losers: Vec<ParticipantId>,
    /// Role for winners.
    pub winner_role: Option<String>,
    /// Role for losers.
    pub loser_role: Option<String>,
}

impl RoleRequest {
    /// Builds the request for `standings`.
    ///
    /// Returns `None` when no role is configured.
    #[must_use]
    pub fn from_standings(standings: &Standings, roles: &RoleSettings) -> Option<Self> {
        if roles.winner.is_none() && roles.loser.is_none() {
            return None;
        }
        Some(Self {
            channel: standings.channel.clone(),
            winners: standings.survivors.clone(),
            losers: standings.losers(),
            winner_role: roles.winner.clone(),
            loser_role: roles.loser.clone(),
        })
    }
}

/// Applies outcome roles on the platform.
#[async_trait::async_trait]
pub trait RoleAssigner: Send + Sync {
    /// Requests the roles in `request`.
    async fn apply_outcome_roles(&self, request: RoleRequest) -> Result<(), RoleAssignmentError>;
}

/// Forwards role requests to the platform adapter over the outbound queue.
#[derive(Debug, Clone)]
pub struct QueueRoleAssigner {
    tx: UnboundedSender<Outbound>,
}

impl QueueRoleAssigner {
    /// Creates an assigner feeding `tx`.
    #[must_use]
    pub const fn new(tx: UnboundedSender<Outbound>) -> Self {
        Self { tx }
    }
}

#[async_trait::async_trait]
impl RoleAssigner for QueueRoleAssigner {
    async fn apply_outcome_roles(&self, request: RoleRequest) -> Result<(), RoleAssignmentError> {
        self.tx
            .send(Outbound::Roles(request))
            .map_err(|_| RoleAssignmentError::QueueClosed)
    }
}

/// Assigner that drops every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRoleAssigner;

#[async_trait::async_trait]
impl RoleAssigner for NoopRoleAssigner {
    async fn apply_outcome_roles(&self, request: RoleRequest) -> Result<(), RoleAssignmentError> {
        tracing::debug!(channel = %request.channel, "role assignment disabled");
        Ok(())
    }
}
