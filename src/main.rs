//! Kickwatch - Main Entry Point
//!
//! Prediction API server plus the offline replay and drift jobs.

use clap::Parser;
use kickwatch::cli::{cmd_drift, cmd_init_db, cmd_replay, cmd_serve, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; real env vars take precedence
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kickwatch=info,profiling=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port } => {
            cmd_serve(host, port).await?;
        }
        Commands::Drift { reference, batch_size, output_dir, drift_share } => {
            cmd_drift(&reference, batch_size, output_dir, drift_share)?;
        }
        Commands::Replay { reference, batch_size, distance_drift, pause_ms, seed, dry_run } => {
            cmd_replay(&reference, batch_size, distance_drift, pause_ms, seed, dry_run).await?;
        }
        Commands::InitDb { database } => {
            cmd_init_db(database)?;
        }
    }

    Ok(())
}
