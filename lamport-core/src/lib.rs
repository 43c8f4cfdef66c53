//! # Lamport Core
//!
//! Domain types for Lamport OTP sessions: the verifier and prover state
//! machines, the notifications a session publishes, and the shared settings
//! format.
//!
//! Sockets and timers live in `lamport-verifier` and `lamport-prover`; the
//! state machines here only decide what happens next. The one piece of IO is
//! reading the settings file both binaries share.
//!
//! ## Modules
//!
//! - [`session`] - Verifier session lifecycle and challenge bookkeeping
//! - [`prover`] - Prover session lifecycle
//! - [`event`] - Status notifications for presentation layers
//! - [`settings`] - JSON settings shared by both processes

pub mod event;
pub mod prover;
pub mod session;
pub mod settings;

pub use event::{SessionEvent, SessionEventKind, SessionId};
pub use prover::{ProverError, ProverPhase, ProverSession};
pub use session::{
    InvalidTransition, ResponseOutcome, TerminationReason, TickOutcome, VerifierPhase,
    VerifierSession,
};
pub use settings::{Settings, SettingsError};
