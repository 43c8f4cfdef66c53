//! Prover session driver.

use anyhow::{Context, Result};
use lamport_auth::Seed;
use lamport_core::{ProverSession, Settings};

use crate::client::{Inbound, ProverClient};

/// Summary of a finished prover run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProverReport {
    /// Challenges answered before the verifier closed the connection.
    pub challenges_answered: u32,
}

/// Connect to the verifier named in `settings` and answer challenges until
/// it closes the connection.
pub async fn run(settings: &Settings, seed_size: usize) -> Result<ProverReport> {
    let (host, port) = settings.verifier_endpoint();
    let client = ProverClient::connect((host, port))
        .await
        .with_context(|| format!("Failed to connect to verifier at {}:{}", host, port))?;
    tracing::info!(host, port, "Connected to verifier");

    let seed = Seed::generate(seed_size).context("Failed to generate seed")?;
    run_session(client, settings.chain_len, seed).await
}

/// Drive one session over an established connection.
///
/// The chain is built from `seed` with `chain_len` links and discarded when
/// the connection ends.
///
/// # Errors
///
/// Transport failures, and challenges outside `1..chain_len`: the two sides
/// disagree on the chain length and no valid answer exists.
pub async fn run_session(
    mut client: ProverClient,
    chain_len: u32,
    seed: Seed,
) -> Result<ProverReport> {
    let mut session = ProverSession::new(chain_len);
    let result = drive(&mut client, &mut session, &seed).await;
    session.on_disconnected();

    if result.is_err() {
        // Best effort; the verifier sees the disconnect either way
        let _ = client.shutdown().await;
    }
    result.map(|()| ProverReport {
        challenges_answered: session.answered(),
    })
}

async fn drive(client: &mut ProverClient, session: &mut ProverSession, seed: &Seed) -> Result<()> {
    let commitment = session
        .on_connected(seed)
        .context("Failed to build hash chain")?;
    client
        .send_hash(&commitment)
        .await
        .context("Failed to send commitment")?;
    tracing::info!(chain_len = session.chain_len(), commitment = %commitment, "Commitment sent");

    loop {
        match client.recv().await.context("Failed to read from verifier")? {
            Inbound::Challenge(challenge) => {
                let otp = session
                    .on_challenge(challenge)
                    .with_context(|| format!("Cannot answer challenge {}", challenge))?;
                client
                    .send_hash(&otp)
                    .await
                    .context("Failed to send response")?;
                session.response_sent()?;
                tracing::info!(challenge, "Response sent");
            }
            Inbound::Malformed(e) => {
                tracing::warn!(error = %e, "Ignoring malformed challenge");
            }
            Inbound::Closed => {
                tracing::info!(answered = session.answered(), "Verifier closed the connection");
                return Ok(());
            }
        }
    }
}
