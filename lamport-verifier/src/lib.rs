//! Lamport OTP verifier.
//!
//! Listens for a single prover, stores its commitment, and paces challenges
//! once an operator starts authentication. Each response must hash to the
//! previously accepted value; the first failure ends the session and closes
//! the connection.
//!
//! ## Modules
//!
//! - [`server`] - Accept loop, admission and the operator handle
//! - `session` - Per-connection reactor
//! - [`scheduler`] - Request/response-gated challenge timer
//! - [`shutdown`] - Shutdown trigger and signal
//! - [`console`] - Operator console commands

pub mod console;
pub mod scheduler;
pub mod server;
mod session;
pub mod shutdown;

pub use console::ConsoleCommand;
pub use scheduler::ChallengeScheduler;
pub use server::{ControlError, ServerOptions, VerifierHandle, VerifierServer};
pub use shutdown::{Shutdown, ShutdownSignal};
