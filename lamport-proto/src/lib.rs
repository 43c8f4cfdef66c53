//! Wire protocol for Lamport OTP sessions.
//!
//! Three messages cross the connection, each in its own length-delimited
//! frame: the prover's commitment, the verifier's challenge indices, and the
//! prover's OTP responses. Commitments and responses share one encoding, so
//! the receiver tells them apart by session phase.

pub mod framing;
pub mod message;

pub use framing::{read_frame, write_frame, MAX_FRAME_SIZE};
pub use message::{
    decode_challenge, decode_hash, encode_challenge, encode_hash, write_challenge, write_hash,
    WireError,
};
