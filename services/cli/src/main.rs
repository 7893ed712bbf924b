//! CheckNShare command-line front end
//!
//! Loads settings, composes the configured record store and runs one
//! subcommand against it. Logs go to stderr and are filtered by `RUST_LOG`.

use std::{path::PathBuf, process};

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod commands;

use commands::{Command, Context, Rejected};
use store::settings::Settings;

/// Share geotagged photos, like posts and read notifications
#[derive(Debug, Parser)]
#[command(name = "checknshare", version)]
struct Cli {
    /// Settings file (default: ./checknshare.toml when present)
    #[arg(short, long, global = true, env = "CHECKNSHARE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    if let Err(e) = execute(cli).await {
        match e.downcast_ref::<Rejected>() {
            Some(rejected) => eprintln!("{}", rejected),
            None => {
                error!("Command failed: {:#}", e);
                eprintln!("Something went wrong, please try again.");
            }
        }
        process::exit(1);
    }

    Ok(())
}

async fn execute(cli: Cli) -> Result<()> {
    let settings = Settings::load(cli.config.as_deref())?;
    let ctx = Context {
        store: store::connect_backend(&settings).await?,
        sessions: settings.session_store(),
        identity: settings.identity_resolver(),
    };

    let mut stdout = std::io::stdout();
    commands::run(cli.command, &ctx, &mut stdout).await
}
