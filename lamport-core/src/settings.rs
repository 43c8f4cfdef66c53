//! Settings shared by the verifier and prover processes.
//!
//! The on-disk format is a flat JSON object:
//!
//! ```json
//! { "aliceIP": "127.0.0.1", "alicePort": 5000,
//!   "bobIP": "127.0.0.1", "bobPort": 5001,
//!   "sleepDuration": 2, "numRounds": 10 }
//! ```
//!
//! Alice is the verifier, Bob the prover. Both binaries load the same file
//! through [`Settings::from_file`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors from parsing or validating settings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("failed to read {}: {message}", path.display())]
    Read { path: PathBuf, message: String },

    #[error("invalid settings JSON: {0}")]
    Parse(String),

    #[error("numRounds must be at least 1")]
    InvalidChainLength,

    #[error("sleepDuration must be at least 1 second")]
    InvalidInterval,

    #[error("{field} must be a non-zero port")]
    InvalidPort { field: &'static str },

    #[error("{field} must not be empty")]
    MissingAddress { field: &'static str },
}

/// Validated settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Verifier listen/connect host.
    #[serde(rename = "aliceIP")]
    pub verifier_host: String,

    #[serde(rename = "alicePort")]
    pub verifier_port: u16,

    /// Prover host. Informational only.
    #[serde(rename = "bobIP", default, skip_serializing_if = "Option::is_none")]
    pub prover_host: Option<String>,

    /// Prover port. Informational only.
    #[serde(rename = "bobPort", default, skip_serializing_if = "Option::is_none")]
    pub prover_port: Option<u16>,

    /// Seconds between challenges.
    #[serde(rename = "sleepDuration")]
    pub interval_secs: u64,

    /// Chain length `n`; the verifier issues challenges `1..n`.
    #[serde(rename = "numRounds")]
    pub chain_len: u32,
}

impl Settings {
    /// Parse and validate settings from JSON text.
    ///
    /// # Errors
    ///
    /// `SettingsError::Parse` for malformed JSON or missing/mistyped keys,
    /// otherwise whatever [`validate`](Self::validate) reports.
    pub fn from_json(text: &str) -> Result<Self, SettingsError> {
        let settings: Self =
            serde_json::from_str(text).map_err(|e| SettingsError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read, parse and validate the settings file at `path`.
    ///
    /// # Errors
    ///
    /// `SettingsError::Read` if the file cannot be read, otherwise whatever
    /// [`from_json`](Self::from_json) reports.
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path).map_err(|e| SettingsError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_json(&text)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.verifier_host.trim().is_empty() {
            return Err(SettingsError::MissingAddress { field: "aliceIP" });
        }
        if self.verifier_port == 0 {
            return Err(SettingsError::InvalidPort { field: "alicePort" });
        }
        if self.prover_port == Some(0) {
            return Err(SettingsError::InvalidPort { field: "bobPort" });
        }
        if self.interval_secs < 1 {
            return Err(SettingsError::InvalidInterval);
        }
        if self.chain_len < 1 {
            return Err(SettingsError::InvalidChainLength);
        }
        Ok(())
    }

    /// Challenge pacing interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// `(host, port)` of the verifier, usable with tokio's bind/connect.
    #[must_use]
    pub fn verifier_endpoint(&self) -> (&str, u16) {
        (self.verifier_host.as_str(), self.verifier_port)
    }
}
