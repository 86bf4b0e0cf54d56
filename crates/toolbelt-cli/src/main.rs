//! toolbelt - Nine Chronicles release tooling CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use toolbelt_cli::cmd;
use toolbelt_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let dry_run = cli.dry_run;
    let json = cli.json;

    match cli.command {
        Commands::Release { command } => {
            let (kind, args) = command.into_parts();
            // Dropping the release future abandons in-flight uploads at their
            // staging keys; nothing half-written is promoted.
            tokio::select! {
                result = cmd::release::release(kind, args, dry_run, json) => result,
                _ = tokio::signal::ctrl_c() => {
                    anyhow::bail!("Interrupted; {kind} release aborted")
                }
            }
        }
        Commands::Completions { shell } => {
            cmd::completions::completions(shell);
            Ok(())
        }
    }
}
