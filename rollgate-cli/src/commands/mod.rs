//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod backup;
mod blue_green;
mod probe;
mod reload;
mod rollout;
mod tune;
mod validate;

pub use backup::{BackupArgs, RestoreArgs};
pub use blue_green::BlueGreenArgs;
pub use reload::ReloadArgs;
pub use rollout::RolloutArgs;
pub use validate::ValidateArgs;

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use rollgate_core::domain::CommandLine;
use rollgate_runner::process::{ProcessRunner, SystemProcessRunner};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Check configuration syntax
    Validate(ValidateArgs),
    /// Probe the health endpoint once
    Probe,
    /// Gracefully reload the service
    Reload(ReloadArgs),
    /// Apply a configuration change with validation and rollback
    Rollout(RolloutArgs),
    /// Switch between blue and green configuration directories
    BlueGreen(BlueGreenArgs),
    /// Archive the configuration directory
    Backup(BackupArgs),
    /// Restore the configuration directory from an archive
    Restore(RestoreArgs),
    /// Recommend MPM sizing for this host
    Tune,
    /// Show detected host facts
    Facts,
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The CLI configuration
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Validate(args) => validate::handle_validate(args, config).await,
        Commands::Probe => probe::handle_probe(config).await,
        Commands::Reload(args) => reload::handle_reload(args, config).await,
        Commands::Rollout(args) => rollout::handle_rollout(args, config).await,
        Commands::BlueGreen(args) => blue_green::handle_blue_green(args, config).await,
        Commands::Backup(args) => backup::handle_backup(args, config).await,
        Commands::Restore(args) => backup::handle_restore(args, config).await,
        Commands::Tune => tune::handle_tune(config),
        Commands::Facts => tune::handle_facts(config),
    }
}

/// Prints `value` as pretty JSON on stdout
pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Runs a user-supplied `sh -c` hook, killing it after `timeout`
pub(crate) async fn run_hook(command: &str, env: &[(&str, String)], timeout: Duration) -> Result<()> {
    let mut line = CommandLine::new("sh").arg("-c").arg(command);
    for (key, value) in env {
        line = line.env(*key, value.clone());
    }

    let output = SystemProcessRunner::new(timeout)
        .run(&line)
        .await
        .with_context(|| format!("Failed to run '{}'", command))?;
    if !output.stdout.trim().is_empty() {
        debug!("'{}' printed: {}", command, output.stdout.trim());
    }

    if !output.success() {
        bail!(
            "'{}' exited {}: {}",
            command,
            output.exit_code,
            output.diagnostics()
        );
    }
    Ok(())
}
