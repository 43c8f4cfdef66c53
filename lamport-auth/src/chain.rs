//! Hash-chain construction.
//!
//! A chain of length `n` is derived from a secret seed by repeated SHA-256:
//!
//! ```text
//! h1 = SHA256(seed)
//! hi = SHA256(hex(h(i-1)))      for i in 2..=n
//! ```
//!
//! The upper-case hex text of a link is both the input to the next hash and
//! the form that travels on the wire.
//!
//! # Security
//!
//! - Seeds are zeroized on drop and never printed
//! - Link comparisons use constant-time equality
//! - `HashChain` has no `Debug` output for unrevealed links

use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::ChainError;

/// Size of a SHA-256 digest in bytes.
pub const DIGEST_LEN: usize = 32;

/// Length of the hex text form of a digest.
pub const HEX_LEN: usize = DIGEST_LEN * 2;

/// Number of random bytes drawn for a fresh seed.
pub const DEFAULT_SEED_SIZE: usize = 32;

/// One link of a hash chain (a SHA-256 digest).
///
/// # Security
///
/// Comparisons use constant-time equality. The Hash derive is kept alongside
/// the manual PartialEq since hashing does not need to be constant-time.
#[derive(Clone, Copy, Eq, Hash)]
#[allow(clippy::derived_hash_with_manual_eq)]
pub struct ChainHash([u8; DIGEST_LEN]);

impl ChainHash {
    /// Hash arbitrary bytes.
    #[must_use]
    pub fn of(input: &[u8]) -> Self {
        let digest = Sha256::digest(input);
        let mut out = [0u8; DIGEST_LEN];
        out.copy_from_slice(&digest);
        Self(out)
    }

    /// The next link: `H(hex(self))`.
    ///
    /// For a revealed OTP `h(i-1)` this yields `h(i)`, the value the verifier
    /// accepted one step earlier.
    #[must_use]
    pub fn successor(&self) -> Self {
        Self::of(self.to_hex().as_bytes())
    }

    /// Wrap raw digest bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Upper-case hex text (64 characters).
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }

    /// Parse hex text in either case.
    ///
    /// # Errors
    ///
    /// Returns `ChainError::MalformedHash` unless the input is exactly 64 hex
    /// characters.
    pub fn from_hex(text: &str) -> Result<Self, ChainError> {
        if text.len() != HEX_LEN {
            return Err(ChainError::MalformedHash);
        }
        let mut out = [0u8; DIGEST_LEN];
        hex::decode_to_slice(text, &mut out).map_err(|_| ChainError::MalformedHash)?;
        Ok(Self(out))
    }
}

impl PartialEq for ChainHash {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl fmt::Display for ChainHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ChainHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainHash({}...)", &self.to_hex()[..8])
    }
}

impl Serialize for ChainHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ChainHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_hex(&text).map_err(serde::de::Error::custom)
    }
}

/// The secret chain origin (`h0`).
///
/// Held as text: generated seeds are upper-case hex of random bytes, and the
/// first link is the hash of that text.
///
/// # Security
///
/// - Zeroized on drop
/// - No `Debug`/`Display` output of the contents
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Seed(String);

impl Seed {
    /// Draw `size` bytes from the OS CSPRNG and hex-encode them.
    ///
    /// # Errors
    ///
    /// Returns `ChainError::EmptySeed` if `size` is zero.
    pub fn generate(size: usize) -> Result<Self, ChainError> {
        if size == 0 {
            return Err(ChainError::EmptySeed);
        }
        let mut bytes = vec![0u8; size];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let seed = Self(hex::encode_upper(&bytes));
        bytes.zeroize();
        Ok(seed)
    }

    /// Use caller-provided text as the seed.
    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// The seed text as bytes (the input to `h1`).
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Seed([redacted])")
    }
}

/// Generate a fresh random seed of `size` bytes.
///
/// This is the only randomness source in the protocol.
///
/// # Errors
///
/// Returns `ChainError::EmptySeed` if `size` is zero.
pub fn generate_seed(size: usize) -> Result<Seed, ChainError> {
    Seed::generate(size)
}

/// An immutable hash chain `[h1 .. hn]`.
#[derive(Clone, PartialEq, Eq)]
pub struct HashChain {
    links: Vec<ChainHash>,
}

impl HashChain {
    /// Build a chain of `len` links from `seed`.
    ///
    /// # Errors
    ///
    /// - `ChainError::InvalidLength` if `len` is zero
    /// - `ChainError::EmptySeed` if the seed has no content
    pub fn build(seed: &Seed, len: u32) -> Result<Self, ChainError> {
        if len < 1 {
            return Err(ChainError::InvalidLength { len });
        }
        if seed.is_empty() {
            return Err(ChainError::EmptySeed);
        }

        let mut links = Vec::with_capacity(len as usize);
        let mut current = ChainHash::of(seed.as_bytes());
        links.push(current);
        for _ in 1..len {
            current = current.successor();
            links.push(current);
        }

        Ok(Self { links })
    }

    /// Number of links (`n`).
    #[must_use]
    pub fn len(&self) -> u32 {
        self.links.len() as u32
    }

    /// Always false: a chain has at least one link.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Link at 0-based `index` (`h(index + 1)`).
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ChainHash> {
        self.links.get(index)
    }

    /// The last link `hn`, used as the commitment.
    #[must_use]
    pub fn tail(&self) -> &ChainHash {
        &self.links[self.links.len() - 1]
    }

    /// All links in order `h1 .. hn`.
    #[must_use]
    pub fn links(&self) -> &[ChainHash] {
        &self.links
    }
}

impl fmt::Debug for HashChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashChain")
            .field("len", &self.links.len())
            .field("tail", self.tail())
            .finish()
    }
}

/// Build a chain of `len` links from `seed`.
///
/// # Errors
///
/// See [`HashChain::build`].
pub fn build_chain(seed: &Seed, len: u32) -> Result<HashChain, ChainError> {
    HashChain::build(seed, len)
}
