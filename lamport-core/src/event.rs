//! Session notifications.
//!
//! Events are fire-and-forget: presentation layers subscribe to them, but
//! nothing they do feeds back into the protocol.

use std::fmt;
use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use lamport_auth::ChainHash;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::TerminationReason;

/// Unique identifier for a verifier session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A timestamped notification from a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    /// Session the event belongs to.
    pub session: SessionId,
    /// When this event occurred.
    pub ts: DateTime<Utc>,
    /// The event payload.
    #[serde(flatten)]
    pub kind: SessionEventKind,
}

impl SessionEvent {
    /// Create an event stamped with the current time.
    pub fn new(session: SessionId, kind: SessionEventKind) -> Self {
        Self {
            session,
            ts: Utc::now(),
            kind,
        }
    }

    /// Returns true if this event ends the session.
    pub fn is_final(&self) -> bool {
        self.kind.is_final()
    }
}

/// The kind/payload of a session event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEventKind {
    // ── Connection ────────────────────────────────────────────────────────
    /// A prover connected and was admitted.
    Connected { peer: SocketAddr },

    /// A connection arrived while a session was live and was closed.
    ConnectionRejected { peer: SocketAddr },

    /// The transport closed after the session ended.
    Disconnected,

    // ── Authentication ────────────────────────────────────────────────────
    /// The prover's commitment was stored.
    CommitmentReceived { commitment: ChainHash },

    AuthenticationStarted,

    /// A challenge index was written to the prover.
    ChallengeSent { challenge: u32 },

    /// Outcome of checking the response to `challenge`.
    VerificationResult { challenge: u32, accepted: bool },

    AuthenticationStopped,

    /// Every challenge in the chain was answered.
    AuthenticationCompleted,

    /// The session ended without completing.
    Terminated { reason: TerminationReason },
}

impl SessionEventKind {
    /// Returns true if no further protocol events follow this one.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationCompleted | Self::Terminated { .. }
        )
    }
}
