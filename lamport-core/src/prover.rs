//! Prover session state machine.
//!
//! ```text
//! Connecting → Connected → AwaitingChallenge ⇄ Responding → Disconnected
//! ```
//!
//! The prover answers exactly the index it is asked for. It does not check
//! that challenges increase; the verifier owns ordering.

use lamport_auth::{ChainError, ChainHash, ProverIdentity, Seed};

use crate::session::InvalidTransition;

/// Lifecycle phase of a prover session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProverPhase {
    Connecting,
    /// Transport is up; the chain is being built.
    Connected,
    AwaitingChallenge,
    /// An OTP was produced and is being written.
    Responding,
    Disconnected,
}

/// Errors from the prover state machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ProverError {
    #[error(transparent)]
    Transition(#[from] InvalidTransition<ProverPhase>),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Prover-side session for one connection to the verifier.
#[derive(Debug)]
pub struct ProverSession {
    phase: ProverPhase,
    identity: ProverIdentity,
    chain_len: u32,
    answered: u32,
}

impl ProverSession {
    /// Create a session that will build a chain of `chain_len` links.
    pub fn new(chain_len: u32) -> Self {
        Self {
            phase: ProverPhase::Connecting,
            identity: ProverIdentity::new(),
            chain_len,
            answered: 0,
        }
    }

    #[must_use]
    pub fn phase(&self) -> ProverPhase {
        self.phase
    }

    #[must_use]
    pub fn chain_len(&self) -> u32 {
        self.chain_len
    }

    /// Number of challenges answered so far.
    #[must_use]
    pub fn answered(&self) -> u32 {
        self.answered
    }

    fn invalid(&self, event: &'static str, reason: &str) -> InvalidTransition<ProverPhase> {
        InvalidTransition {
            from: self.phase,
            event,
            reason: reason.into(),
        }
    }

    /// The transport connected. Builds a fresh chain from `seed` and returns
    /// the commitment to send.
    /// Transition: Connecting → Connected → AwaitingChallenge
    ///
    /// # Errors
    ///
    /// `ProverError::Transition` outside `Connecting`; `ProverError::Chain`
    /// if the chain cannot be built, in which case the phase stays
    /// `Connected`.
    pub fn on_connected(&mut self, seed: &Seed) -> Result<ChainHash, ProverError> {
        if self.phase != ProverPhase::Connecting {
            return Err(self.invalid("Connected", "session must be Connecting").into());
        }
        self.phase = ProverPhase::Connected;
        self.identity.init(seed, self.chain_len)?;
        let commitment = *self.identity.commitment()?;
        self.phase = ProverPhase::AwaitingChallenge;
        Ok(commitment)
    }

    /// Produce the OTP for `challenge`.
    /// Transition: AwaitingChallenge → Responding
    ///
    /// # Errors
    ///
    /// `ProverError::Chain` with `ChallengeOutOfRange` if the index is not
    /// in `1..n`; the phase is unchanged.
    pub fn on_challenge(&mut self, challenge: u32) -> Result<ChainHash, ProverError> {
        if self.phase != ProverPhase::AwaitingChallenge {
            return Err(self
                .invalid("Challenge", "session must be AwaitingChallenge")
                .into());
        }
        let otp = *self.identity.otp_for(challenge)?;
        self.phase = ProverPhase::Responding;
        Ok(otp)
    }

    /// The response was written. Transition: Responding → AwaitingChallenge
    pub fn response_sent(&mut self) -> Result<(), InvalidTransition<ProverPhase>> {
        if self.phase != ProverPhase::Responding {
            return Err(self.invalid("ResponseSent", "session must be Responding"));
        }
        self.answered = self.answered.saturating_add(1);
        self.phase = ProverPhase::AwaitingChallenge;
        Ok(())
    }

    /// The transport closed. Discards the chain. Transition: any → Disconnected
    pub fn on_disconnected(&mut self) {
        self.identity.discard();
        self.phase = ProverPhase::Disconnected;
    }
}
