//! Prover-side chain ownership.
//!
//! The prover builds one chain per session and reveals links backwards from
//! the commitment, one per challenge.

use crate::chain::{ChainHash, HashChain, Seed};
use crate::error::ChainError;

/// Holds the prover's chain for the current session.
///
/// Challenge `c` selects `h(n-c)`: challenge 1 yields the second-to-last link,
/// the first value revealed after the commitment `hn`.
#[derive(Debug, Default)]
pub struct ProverIdentity {
    chain: Option<HashChain>,
}

impl ProverIdentity {
    /// Create an identity with no chain yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the chain from `seed` with `len` links, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `ChainError::InvalidLength` if `len` is zero, or
    /// `ChainError::EmptySeed` for an empty seed. On error the identity is
    /// left unchanged.
    pub fn init(&mut self, seed: &Seed, len: u32) -> Result<(), ChainError> {
        let chain = HashChain::build(seed, len)?;
        self.chain = Some(chain);
        Ok(())
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.chain.is_some()
    }

    /// Length of the current chain, if any.
    #[must_use]
    pub fn chain_len(&self) -> Option<u32> {
        self.chain.as_ref().map(HashChain::len)
    }

    /// The OTP answering challenge `challenge`.
    ///
    /// # Errors
    ///
    /// - `ChainError::NotInitialized` before [`init`](Self::init)
    /// - `ChainError::ChallengeOutOfRange` unless `1 <= challenge <= n - 1`
    pub fn otp_for(&self, challenge: u32) -> Result<&ChainHash, ChainError> {
        let chain = self.chain.as_ref().ok_or(ChainError::NotInitialized)?;
        let max = chain.len() - 1;
        if challenge < 1 || challenge > max {
            return Err(ChainError::ChallengeOutOfRange { challenge, max });
        }
        let index = (chain.len() - challenge - 1) as usize;
        chain.get(index).ok_or(ChainError::ChallengeOutOfRange { challenge, max })
    }

    /// The commitment `hn`.
    ///
    /// # Errors
    ///
    /// Returns `ChainError::NotInitialized` before [`init`](Self::init).
    pub fn commitment(&self) -> Result<&ChainHash, ChainError> {
        self.chain
            .as_ref()
            .map(HashChain::tail)
            .ok_or(ChainError::NotInitialized)
    }

    /// Drop the chain at session end. Chains are never reused.
    pub fn discard(&mut self) {
        self.chain = None;
    }
}
