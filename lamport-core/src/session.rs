//! Verifier session state machine.
//!
//! One `VerifierSession` exists per admitted connection. It wraps the
//! acceptance state from `lamport-auth` with a lifecycle:
//!
//! ```text
//! AwaitingConnection → AwaitingCommitment → Idle ⇄ Challenging → Complete
//!                                    (any non-terminal) → Terminated
//! ```
//!
//! The session decides; the caller performs IO. `tick` says whether a
//! challenge should be written, `receive_response` says whether the
//! connection must be closed.

use std::fmt;

use lamport_auth::{ChainHash, VerifierState};
use serde::{Deserialize, Serialize};

use crate::event::SessionId;

// ============================================================================
// Phases
// ============================================================================

/// Why a session ended without completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// A response did not hash to the last accepted value.
    VerificationFailed,
    /// A response arrived with no challenge outstanding.
    UnsolicitedResponse,
    /// The peer or an operator closed the connection.
    Disconnected,
    /// The verifier is shutting down.
    Shutdown,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::VerificationFailed => "verification failed",
            Self::UnsolicitedResponse => "unsolicited response",
            Self::Disconnected => "disconnected",
            Self::Shutdown => "shutdown",
        };
        f.write_str(text)
    }
}

/// Lifecycle phase of a verifier session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerifierPhase {
    AwaitingConnection,
    /// Connected; the first hash frame will be the commitment.
    AwaitingCommitment,
    /// Commitment stored, challenges paused or not yet started.
    Idle,
    /// Challenges are being issued.
    Challenging,
    /// Every challenge `1..n` was answered.
    Complete,
    Terminated(TerminationReason),
}

impl VerifierPhase {
    /// Returns true if the session has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Terminated(_))
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// What a scheduler fire resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not challenging; nothing to do.
    Idle,
    /// A challenge is still outstanding; the barrier holds.
    AwaitingResponse,
    /// Write this challenge to the prover.
    Emit(u32),
    /// The chain is exhausted; the session is now `Complete`.
    Complete,
}

/// Result of feeding a response into the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// The response verified. `complete` is set when it was the last one.
    Accepted { challenge: u32, complete: bool },
    /// The response failed verification; the session is terminated.
    Rejected { challenge: u32 },
    /// No challenge was outstanding; the session is terminated.
    Unsolicited,
}

// ============================================================================
// Transition Errors
// ============================================================================

/// Error when a state transition is invalid.
///
/// Generic over the phase type so the prover machine can share it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTransition<P = VerifierPhase> {
    pub from: P,
    pub event: &'static str,
    pub reason: String,
}

impl<P: fmt::Debug> fmt::Display for InvalidTransition<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid transition: cannot apply '{}' to session in state '{:?}': {}",
            self.event, self.from, self.reason
        )
    }
}

impl<P: fmt::Debug> std::error::Error for InvalidTransition<P> {}

// ============================================================================
// Session
// ============================================================================

/// Verifier-side session for one prover connection.
#[derive(Debug, Clone)]
pub struct VerifierSession {
    id: SessionId,
    phase: VerifierPhase,
    state: VerifierState,
    /// Configured chain length `n`. Challenges run `1..n`.
    chain_len: u32,
}

impl VerifierSession {
    /// Create a session expecting a chain of `chain_len` links.
    pub fn new(chain_len: u32) -> Self {
        Self::with_id(SessionId::new(), chain_len)
    }

    pub fn with_id(id: SessionId, chain_len: u32) -> Self {
        Self {
            id,
            phase: VerifierPhase::AwaitingConnection,
            state: VerifierState::new(),
            chain_len,
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn phase(&self) -> VerifierPhase {
        self.phase
    }

    #[must_use]
    pub fn chain_len(&self) -> u32 {
        self.chain_len
    }

    #[must_use]
    pub fn next_challenge(&self) -> u32 {
        self.state.next_challenge()
    }

    #[must_use]
    pub fn challenge_in_flight(&self) -> Option<u32> {
        self.state.challenge_in_flight()
    }

    #[must_use]
    pub fn last_accepted(&self) -> Option<&ChainHash> {
        self.state.last_accepted()
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// True when a scheduler fire would do something: challenging with no
    /// response outstanding.
    #[must_use]
    pub fn wants_tick(&self) -> bool {
        self.phase == VerifierPhase::Challenging && self.state.challenge_in_flight().is_none()
    }

    fn invalid(&self, event: &'static str, reason: &str) -> InvalidTransition {
        InvalidTransition {
            from: self.phase,
            event,
            reason: reason.into(),
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────

    /// A prover connected. Transition: AwaitingConnection → AwaitingCommitment
    pub fn connect(&mut self) -> Result<(), InvalidTransition> {
        if self.phase != VerifierPhase::AwaitingConnection {
            return Err(self.invalid("Connect", "session already has a connection"));
        }
        self.phase = VerifierPhase::AwaitingCommitment;
        Ok(())
    }

    /// Store the prover's commitment `hn`.
    /// Transition: AwaitingCommitment → Idle
    ///
    /// A commitment is accepted exactly once per session; it is never
    /// silently overwritten.
    pub fn receive_commitment(&mut self, commitment: ChainHash) -> Result<(), InvalidTransition> {
        if self.phase != VerifierPhase::AwaitingCommitment {
            return Err(self.invalid(
                "ReceiveCommitment",
                "commitment is only accepted right after connecting",
            ));
        }
        self.state.accept_commitment(commitment);
        self.phase = VerifierPhase::Idle;
        Ok(())
    }

    /// Begin or resume issuing challenges. Transition: Idle → Challenging
    ///
    /// Resuming continues at the current cursor; already revealed indices
    /// are never requested again.
    pub fn start(&mut self) -> Result<(), InvalidTransition> {
        if self.phase != VerifierPhase::Idle {
            return Err(self.invalid("Start", "session must be Idle to start"));
        }
        self.phase = VerifierPhase::Challenging;
        Ok(())
    }

    /// Pause challenges. Transition: Challenging → Idle
    ///
    /// Returns true if the session was challenging. Any other phase is left
    /// untouched. A challenge already in flight stays outstanding and its
    /// response is still verified.
    pub fn stop(&mut self) -> bool {
        if self.phase != VerifierPhase::Challenging {
            return false;
        }
        self.phase = VerifierPhase::Idle;
        true
    }

    /// Handle a scheduler fire.
    pub fn tick(&mut self) -> TickOutcome {
        if self.phase != VerifierPhase::Challenging {
            return TickOutcome::Idle;
        }
        if self.state.challenge_in_flight().is_some() {
            return TickOutcome::AwaitingResponse;
        }
        if self.state.next_challenge() < self.chain_len {
            return TickOutcome::Emit(self.state.issue_challenge());
        }
        self.phase = VerifierPhase::Complete;
        TickOutcome::Complete
    }

    /// Verify a response to the outstanding challenge.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` if the session has already ended or has
    /// no commitment yet. Every other case resolves to a [`ResponseOutcome`];
    /// `Rejected` and `Unsolicited` leave the session `Terminated`.
    pub fn receive_response(
        &mut self,
        response: &ChainHash,
    ) -> Result<ResponseOutcome, InvalidTransition> {
        match self.phase {
            VerifierPhase::Idle | VerifierPhase::Challenging => {}
            VerifierPhase::AwaitingConnection | VerifierPhase::AwaitingCommitment => {
                return Err(self.invalid("ReceiveResponse", "no commitment accepted yet"));
            }
            VerifierPhase::Complete | VerifierPhase::Terminated(_) => {
                return Err(self.invalid("ReceiveResponse", "session has ended"));
            }
        }

        let Some(challenge) = self.state.challenge_in_flight() else {
            self.phase = VerifierPhase::Terminated(TerminationReason::UnsolicitedResponse);
            return Ok(ResponseOutcome::Unsolicited);
        };

        if !self.state.verify(response) {
            self.phase = VerifierPhase::Terminated(TerminationReason::VerificationFailed);
            return Ok(ResponseOutcome::Rejected { challenge });
        }

        let complete = self.state.next_challenge() >= self.chain_len;
        if complete {
            self.phase = VerifierPhase::Complete;
        }
        Ok(ResponseOutcome::Accepted { challenge, complete })
    }

    /// End the session. Transition: any non-terminal → Terminated(reason)
    pub fn terminate(&mut self, reason: TerminationReason) -> Result<(), InvalidTransition> {
        if self.phase.is_terminal() {
            return Err(self.invalid("Terminate", "session has already ended"));
        }
        self.phase = VerifierPhase::Terminated(reason);
        Ok(())
    }

    /// Shorthand for `terminate(TerminationReason::Disconnected)`.
    pub fn disconnect(&mut self) -> Result<(), InvalidTransition> {
        self.terminate(TerminationReason::Disconnected)
    }
}

// ============================================================================
// Tests
// ============================================================================
