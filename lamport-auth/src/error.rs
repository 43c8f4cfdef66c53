//! Hash-chain error types.

/// Errors raised by chain construction and OTP lookup.
///
/// All of these are contract violations on the caller's side; none are
/// recoverable by retrying the same call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ChainError {
    /// The requested chain length is below 1.
    #[error("invalid chain length: {len}")]
    InvalidLength { len: u32 },

    /// The challenge index is outside `1..=max`.
    #[error("challenge {challenge} out of range (valid: 1..={max})")]
    ChallengeOutOfRange { challenge: u32, max: u32 },

    /// No chain has been built yet.
    #[error("hash chain not initialized")]
    NotInitialized,

    /// The seed has no content.
    #[error("seed is empty")]
    EmptySeed,

    /// Text is not a 64-character hex SHA-256 digest.
    #[error("malformed hash")]
    MalformedHash,
}
