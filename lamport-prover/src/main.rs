//! Lamport prover client.

use clap::Parser;
use lamport_prover::args::Args;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    let exit_code = match run(&args).await {
        Ok(answered) => {
            tracing::info!(answered, "prover finished");
            0
        }
        Err(e) => {
            tracing::error!("prover error: {:#}", e);
            1
        }
    };

    std::process::exit(exit_code);
}

async fn run(args: &Args) -> anyhow::Result<u32> {
    let settings = args.load_settings()?;
    let report = lamport_prover::run(&settings, args.seed_size).await?;
    Ok(report.challenges_answered)
}
