//! Lamport OTP prover.
//!
//! Connects to the verifier, commits to a fresh hash chain, and answers each
//! challenge index with the matching link, walking the chain backwards.
//! The seed and chain live only as long as the connection.

pub mod args;
pub mod client;
pub mod run;

pub use client::{Inbound, ProverClient};
pub use run::{run, run_session, ProverReport};
