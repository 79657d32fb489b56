//! Rollout command handler
//!
//! Applies a change to one configuration file as a staged rollout. The
//! change is either a replacement file (`--from`) or a shell command
//! (`--exec`) that edits the file in place.

use anyhow::{Context, Result, bail};
use clap::{ArgGroup, Args};
use colored::*;
use rollgate_core::domain::{RolloutAttempt, RolloutOutcome};
use std::path::{Path, PathBuf};

use super::{print_json, run_hook};
use crate::config::Config;

#[derive(Args)]
#[command(group(ArgGroup::new("change").required(true).args(["from", "exec"])))]
pub struct RolloutArgs {
    /// Configuration file being changed
    #[arg(long)]
    pub config: PathBuf,

    /// Copy the current file here before changing it
    #[arg(long)]
    pub backup: Option<PathBuf>,

    /// Keep a failed change on disk instead of restoring the backup
    #[arg(long)]
    pub no_rollback: bool,

    /// Replace the configuration file with this file
    #[arg(long)]
    pub from: Option<PathBuf>,

    /// Run this shell command to change the configuration
    /// (receives ROLLGATE_CONFIG_PATH)
    #[arg(long)]
    pub exec: Option<String>,
}

/// Runs the staged rollout and reports its outcome
pub async fn handle_rollout(args: RolloutArgs, config: &Config) -> Result<()> {
    let controller = config.controller();

    let mut attempt = RolloutAttempt::new()
        .with_config_path(&args.config)
        .with_rollback(!args.no_rollback);
    if let Some(backup) = &args.backup {
        attempt = attempt.with_backup_path(backup);
    }

    let target = args.config.clone();
    let timeout = config.runner.command_timeout;
    let result = controller
        .staged_rollout(&mut attempt, || async move {
            match (args.from, args.exec) {
                (Some(source), _) => replace_file(&source, &target),
                (None, Some(command)) => {
                    let env = [("ROLLGATE_CONFIG_PATH", target.display().to_string())];
                    run_hook(&command, &env, timeout).await
                }
                (None, None) => bail!("no change given"),
            }
        })
        .await;

    if config.json {
        print_json(&attempt)?;
    } else {
        print_outcome(&attempt);
    }

    result.context("Rollout failed")
}

fn replace_file(source: &Path, target: &Path) -> Result<()> {
    std::fs::copy(source, target).with_context(|| {
        format!("Failed to copy {} to {}", source.display(), target.display())
    })?;
    Ok(())
}

fn print_outcome(attempt: &RolloutAttempt) {
    println!("{} {}", "Rollout".bold(), attempt.id.to_string().dimmed());
    match attempt.outcome {
        Some(RolloutOutcome::Applied) => {
            println!("{}", "✓ Change applied and service reloaded".green().bold());
        }
        Some(RolloutOutcome::BackupFailed) => {
            println!("{}", "✗ Could not back up the configuration".red().bold());
        }
        Some(RolloutOutcome::MutationFailed) => {
            println!("{}", "✗ Change could not be applied".red().bold());
        }
        Some(RolloutOutcome::ValidationFailed { restored }) => {
            println!("{}", "✗ Configuration failed validation".red().bold());
            print_restored(restored);
        }
        Some(RolloutOutcome::ReloadFailed { restored }) => {
            println!("{}", "✗ Reload or health check failed".red().bold());
            print_restored(restored);
        }
        None => println!("{}", "⚠ Rollout did not start".yellow()),
    }
}

fn print_restored(restored: bool) {
    if restored {
        println!("  {}", "Previous configuration restored".yellow());
    } else {
        println!("  {}", "Configuration left as changed".yellow());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_replace_file_overwrites_target() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("new.conf");
        let target = tmp.path().join("httpd.conf");
        fs::write(&source, "Listen 8080\n").unwrap();
        fs::write(&target, "Listen 80\n").unwrap();

        replace_file(&source, &target).unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "Listen 8080\n");
    }
}
