//! Rollgate CLI
//!
//! Command-line interface for validating, reloading and rolling out web
//! server configuration without dropping connections.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::{Config, Overrides};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "rollgate")]
#[command(about = "Zero-downtime web server configuration rollouts", long_about = None)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    /// Print machine-readable JSON instead of coloured text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so --json output stays parseable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rollgate_runner=info,rollgate_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = Config::load(&cli.overrides, cli.json)?;

    handle_command(cli.command, &config).await
}
