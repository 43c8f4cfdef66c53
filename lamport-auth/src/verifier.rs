//! Verifier-side acceptance state.
//!
//! The verifier never sees the seed. It keeps only the last accepted link
//! and checks that each response hashes to it.

use crate::chain::ChainHash;

/// Acceptance state for a single session.
///
/// This type does not enforce session ordering (when a commitment may be
/// accepted, when a response is expected); the session state machine layered
/// on top does.
#[derive(Debug, Clone)]
pub struct VerifierState {
    /// `None` until a commitment arrives.
    last_accepted: Option<ChainHash>,
    /// Next challenge index to issue, starting at 1.
    next_challenge: u32,
    /// Challenge issued but not yet answered.
    in_flight: Option<u32>,
}

impl VerifierState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_accepted: None,
            next_challenge: 1,
            in_flight: None,
        }
    }

    /// Anchor on a commitment `hn`.
    ///
    /// Overwrites any previous value and rewinds the cursor to 1.
    pub fn accept_commitment(&mut self, commitment: ChainHash) {
        self.last_accepted = Some(commitment);
        self.next_challenge = 1;
        self.in_flight = None;
    }

    /// Check a response against the last accepted link.
    ///
    /// Returns `true` iff `H(response) == last_accepted`. On success the
    /// response becomes the new last accepted link and the cursor advances;
    /// on failure nothing changes. Always `false` before a commitment.
    #[must_use = "a rejected response must terminate the session"]
    pub fn verify(&mut self, response: &ChainHash) -> bool {
        let Some(expected) = self.last_accepted.as_ref() else {
            return false;
        };
        if response.successor() != *expected {
            return false;
        }

        self.last_accepted = Some(*response);
        self.next_challenge = self.next_challenge.saturating_add(1);
        self.in_flight = None;
        true
    }

    /// Mark the next challenge as in flight and return its index.
    pub fn issue_challenge(&mut self) -> u32 {
        self.in_flight = Some(self.next_challenge);
        self.next_challenge
    }

    #[must_use]
    pub fn next_challenge(&self) -> u32 {
        self.next_challenge
    }

    #[must_use]
    pub fn challenge_in_flight(&self) -> Option<u32> {
        self.in_flight
    }

    #[must_use]
    pub fn last_accepted(&self) -> Option<&ChainHash> {
        self.last_accepted.as_ref()
    }

    #[must_use]
    pub fn has_commitment(&self) -> bool {
        self.last_accepted.is_some()
    }

    /// True once a commitment is held and no challenge is outstanding.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.has_commitment() && self.in_flight.is_none()
    }
}

impl Default for VerifierState {
    fn default() -> Self {
        Self::new()
    }
}
