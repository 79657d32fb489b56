//! Reload command handler

use anyhow::Result;
use clap::Args;
use colored::*;
use std::time::Duration;

use super::print_json;
use crate::config::Config;

#[derive(Args)]
pub struct ReloadArgs {
    /// Maximum reload commands to issue
    #[arg(long, env = "ROLLGATE_RELOAD_ATTEMPTS")]
    pub max_attempts: Option<u32>,

    /// Seconds to wait between attempts and before re-checking workers
    #[arg(long, env = "ROLLGATE_RELOAD_WAIT")]
    pub wait: Option<u64>,

    /// Skip the pre- and post-reload health checks
    #[arg(long)]
    pub no_health: bool,
}

/// Performs a graceful reload and reports whether workers were replaced
pub async fn handle_reload(args: ReloadArgs, config: &Config) -> Result<()> {
    let controller = config.controller_with(|runner| {
        if let Some(attempts) = args.max_attempts {
            runner.reload.max_attempts = attempts;
        }
        if let Some(wait) = args.wait {
            runner.reload.wait = Duration::from_secs(wait);
        }
    })?;

    let report = controller.reload(!args.no_health).await?;

    if config.json {
        print_json(&report)?;
    } else {
        println!(
            "{} {} after {} attempt(s)",
            "✓ Reloaded".green().bold(),
            controller.target().name.cyan(),
            report.attempts
        );
        if !report.workers_replaced {
            println!("{}", "⚠ No worker processes were replaced".yellow());
        }
    }

    Ok(())
}
