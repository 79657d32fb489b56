//! Blue-green command handler
//!
//! Stages changes into the inactive environment, either by copying a
//! directory over it (`--stage`) or by running a shell command (`--exec`),
//! then switches the service to it.

use anyhow::{Context, Result, bail};
use clap::Args;
use colored::*;
use rollgate_core::domain::{Environment, EnvironmentLayout, SwitchOutcome, SwitchReport};
use rollgate_runner::fsops;
use std::path::{Path, PathBuf};

use super::{print_json, run_hook};
use crate::config::Config;

#[derive(Args)]
pub struct BlueGreenArgs {
    /// Canonical configuration path (defaults to the platform's config root)
    #[arg(long)]
    pub config_dir: Option<PathBuf>,

    /// Blue environment directory (default: <config-dir>-blue)
    #[arg(long)]
    pub blue_dir: Option<PathBuf>,

    /// Green environment directory (default: <config-dir>-green)
    #[arg(long)]
    pub green_dir: Option<PathBuf>,

    /// Copy this directory's contents into the inactive environment
    #[arg(long, conflicts_with = "exec")]
    pub stage: Option<PathBuf>,

    /// Run this shell command to prepare the inactive environment
    /// (receives ROLLGATE_INACTIVE_ENV and ROLLGATE_INACTIVE_DIR)
    #[arg(long)]
    pub exec: Option<String>,
}

/// Runs one blue-green switch and reports which environment is active
pub async fn handle_blue_green(args: BlueGreenArgs, config: &Config) -> Result<()> {
    let controller = config.controller();

    let mut layout = match &args.config_dir {
        Some(dir) => EnvironmentLayout::for_config_dir(dir.clone()),
        None => controller.default_layout(),
    };
    if let Some(dir) = args.blue_dir {
        layout = layout.with_blue_dir(dir);
    }
    if let Some(dir) = args.green_dir {
        layout = layout.with_green_dir(dir);
    }

    let report = match (args.stage, args.exec) {
        (Some(stage), _) => {
            controller
                .blue_green_with(&layout, |_, dir| async move { stage_dir(&stage, &dir) })
                .await?
        }
        (None, Some(command)) => {
            let timeout = config.runner.command_timeout;
            controller
                .blue_green_with(&layout, |env, dir| async move {
                    let vars = [
                        ("ROLLGATE_INACTIVE_ENV", env.to_string()),
                        ("ROLLGATE_INACTIVE_DIR", dir.display().to_string()),
                    ];
                    run_hook(&command, &vars, timeout).await
                })
                .await?
        }
        (None, None) => controller.blue_green(&layout).await?,
    };

    if config.json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }

    match report.outcome {
        SwitchOutcome::Switched => Ok(()),
        SwitchOutcome::Skipped { .. } => bail!("switch skipped: inactive environment is invalid"),
        SwitchOutcome::Reverted => bail!("switch reverted: service did not come up"),
    }
}

fn stage_dir(source: &Path, inactive_dir: &Path) -> Result<()> {
    fsops::copy_dir_contents(source, inactive_dir).with_context(|| {
        format!(
            "Failed to stage {} into {}",
            source.display(),
            inactive_dir.display()
        )
    })
}

fn print_report(report: &SwitchReport) {
    let active = match report.active {
        Environment::Blue => report.active.to_string().blue().bold(),
        Environment::Green => report.active.to_string().green().bold(),
    };

    match &report.outcome {
        SwitchOutcome::Switched => {
            println!("{} {}", "✓ Switched to".green().bold(), active);
        }
        SwitchOutcome::Skipped { diagnostics } => {
            println!("{} {}", "⚠ Switch skipped, still on".yellow().bold(), active);
            println!("{}", diagnostics);
        }
        SwitchOutcome::Reverted => {
            println!("{} {}", "✗ Switch reverted, back on".red().bold(), active);
        }
    }
}
