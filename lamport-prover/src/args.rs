//! CLI argument parsing and settings loading.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use lamport_auth::DEFAULT_SEED_SIZE;
use lamport_core::Settings;

/// Lamport prover - answers hash-chain OTP challenges from a verifier.
#[derive(Parser, Debug)]
#[command(name = "lamport-prover", version, about)]
pub struct Args {
    /// Path to the JSON settings file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Random seed size in bytes
    #[arg(
        long,
        default_value_t = DEFAULT_SEED_SIZE,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..=1024)
    )]
    pub seed_size: usize,
}

impl Args {
    pub fn load_settings(&self) -> Result<Settings> {
        Settings::from_file(&self.config)
            .with_context(|| format!("Failed to load settings from {}", self.config.display()))
    }
}
