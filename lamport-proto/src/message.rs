//! Protocol payloads.
//!
//! | Direction          | Payload              | Encoding                    |
//! |--------------------|----------------------|-----------------------------|
//! | prover → verifier  | commitment, response | 64 ASCII hex characters     |
//! | verifier → prover  | challenge index      | 4-byte big-endian `i32`, > 0 |
//!
//! Each payload travels in its own frame (see [`crate::framing`]).

use std::io;

use lamport_auth::chain::HEX_LEN;
use lamport_auth::ChainHash;
use tokio::io::AsyncWrite;

use crate::framing::write_frame;

/// Size of an encoded challenge.
pub const CHALLENGE_LEN: usize = 4;

/// A payload that does not decode.
///
/// These are per-message errors: the stream itself is still in sync, so the
/// receiver may log and drop the message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum WireError {
    #[error("payload is {actual} bytes, expected {expected}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("hash payload is not hex")]
    InvalidHex,

    #[error("challenge must be positive, got {0}")]
    NonPositiveChallenge(i32),

    #[error("challenge {0} does not fit the wire format")]
    ChallengeOverflow(u32),
}

/// Encode a challenge index.
///
/// # Errors
///
/// `WireError::NonPositiveChallenge` for 0, `WireError::ChallengeOverflow`
/// above `i32::MAX`.
pub fn encode_challenge(challenge: u32) -> Result<[u8; CHALLENGE_LEN], WireError> {
    let value = i32::try_from(challenge).map_err(|_| WireError::ChallengeOverflow(challenge))?;
    if value <= 0 {
        return Err(WireError::NonPositiveChallenge(value));
    }
    Ok(value.to_be_bytes())
}

/// Decode a challenge index.
pub fn decode_challenge(payload: &[u8]) -> Result<u32, WireError> {
    let bytes: [u8; CHALLENGE_LEN] = payload.try_into().map_err(|_| WireError::InvalidLength {
        expected: CHALLENGE_LEN,
        actual: payload.len(),
    })?;
    let value = i32::from_be_bytes(bytes);
    if value <= 0 {
        return Err(WireError::NonPositiveChallenge(value));
    }
    Ok(value as u32)
}

/// Encode a commitment or response as upper-case hex text.
pub fn encode_hash(hash: &ChainHash) -> String {
    hash.to_hex()
}

/// Decode a commitment or response.
pub fn decode_hash(payload: &[u8]) -> Result<ChainHash, WireError> {
    if payload.len() != HEX_LEN {
        return Err(WireError::InvalidLength {
            expected: HEX_LEN,
            actual: payload.len(),
        });
    }
    let text = std::str::from_utf8(payload).map_err(|_| WireError::InvalidHex)?;
    ChainHash::from_hex(text).map_err(|_| WireError::InvalidHex)
}

/// Frame and write a challenge.
///
/// An unencodable index surfaces as `InvalidInput`.
pub async fn write_challenge<W: AsyncWrite + Unpin>(writer: &mut W, challenge: u32) -> io::Result<()> {
    let payload =
        encode_challenge(challenge).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    write_frame(writer, &payload).await
}

/// Frame and write a commitment or response.
pub async fn write_hash<W: AsyncWrite + Unpin>(writer: &mut W, hash: &ChainHash) -> io::Result<()> {
    write_frame(writer, encode_hash(hash).as_bytes()).await
}
