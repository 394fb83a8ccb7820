//! wheelvend CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wheelvend_cli::cmd;
use wheelvend_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Embed { requirements } => cmd::embed::embed(&cli, requirements).await,
        Commands::Check { requirements } => cmd::check::check(&cli, requirements),
        Commands::Install { bundle, python } => {
            cmd::install::install(&cli, bundle, python.as_deref())
        }
    }
}
