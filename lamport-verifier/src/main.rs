//! Lamport verifier daemon.
//!
//! Reads the shared settings file, listens on the verifier address and
//! accepts commands on stdin:
//!
//! - `start` - begin or resume challenging the connected prover
//! - `stop` - pause challenging
//! - `disconnect` - drop the connected prover
//! - `quit` - shut down

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use lamport_core::{SessionEventKind, Settings};
use lamport_verifier::{ConsoleCommand, ServerOptions, VerifierHandle, VerifierServer};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

/// Lamport verifier - challenges a prover with hash-chain OTPs
#[derive(Parser, Debug)]
#[command(name = "lamport-verifier", version, about)]
struct Cli {
    /// Path to the JSON settings file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Start authentication as soon as a commitment arrives
    #[arg(long)]
    auto_start: bool,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Exit explicitly: the console task may still be blocked on stdin
    let exit_code = match serve(cli).await {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!("verifier error: {:#}", e);
            1
        }
    };
    std::process::exit(exit_code);
}

async fn serve(cli: Cli) -> Result<()> {
    let settings = Settings::from_file(&cli.config)
        .with_context(|| format!("Failed to load settings from {}", cli.config.display()))?;

    let server = VerifierServer::bind(
        settings.verifier_endpoint(),
        ServerOptions::from_settings(&settings),
    )
    .await
    .with_context(|| {
        format!(
            "Failed to bind {}:{}",
            settings.verifier_host, settings.verifier_port
        )
    })?;

    let handle = server.handle();
    tokio::spawn(log_events(server.subscribe(), handle.clone(), cli.auto_start));
    tokio::spawn(console(handle.clone()));

    let ctrl_c_handle = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl-C");
            ctrl_c_handle.shutdown();
        }
    });

    server.run().await.context("Verifier server failed")
}

/// Print session notifications; optionally start authentication on commit.
async fn log_events(
    mut events: broadcast::Receiver<lamport_core::SessionEvent>,
    handle: VerifierHandle,
    auto_start: bool,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event log lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        match serde_json::to_string(&event) {
            Ok(json) => println!("{}", json),
            Err(e) => tracing::warn!(error = %e, "Failed to serialize event"),
        }

        if auto_start && matches!(event.kind, SessionEventKind::CommitmentReceived { .. }) {
            if let Err(e) = handle.start().await {
                tracing::warn!(error = %e, "Auto-start failed");
            }
        }
    }
}

/// Read operator commands from stdin until `quit` or EOF.
async fn console(handle: VerifierHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Console read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<ConsoleCommand>() {
            Ok(command) => command,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };

        let result = match command {
            ConsoleCommand::Start => handle.start().await,
            ConsoleCommand::Stop => handle.stop().await,
            ConsoleCommand::Disconnect => handle.disconnect().await,
            ConsoleCommand::Quit => {
                handle.shutdown();
                break;
            }
        };
        if let Err(e) = result {
            eprintln!("{}: {}", command, e);
        }
    }
}
