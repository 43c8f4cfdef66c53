//! Pure Lamport hash-chain authentication library.
//!
//! This crate is intentionally IO-free:
//! - No filesystem operations
//! - No network calls
//! - No logging
//!
//! The only side effect is drawing seed bytes from the operating system
//! CSPRNG in [`Seed::generate`].
//!
//! # Example
//!
//! ```
//! use lamport_auth::{ProverIdentity, Seed, VerifierState};
//!
//! // Prover builds a chain and commits to its tail
//! let mut prover = ProverIdentity::new();
//! prover.init(&Seed::from_text("seed"), 5).unwrap();
//!
//! // Verifier anchors on the commitment
//! let mut verifier = VerifierState::new();
//! verifier.accept_commitment(*prover.commitment().unwrap());
//!
//! // Challenge 1 reveals the second-to-last link
//! let challenge = verifier.issue_challenge();
//! let otp = prover.otp_for(challenge).unwrap();
//! assert!(verifier.verify(otp));
//! ```

pub mod chain;
pub mod error;
pub mod prover;
pub mod verifier;

pub use chain::{build_chain, generate_seed, ChainHash, HashChain, Seed, DEFAULT_SEED_SIZE};
pub use error::ChainError;
pub use prover::ProverIdentity;
pub use verifier::VerifierState;
