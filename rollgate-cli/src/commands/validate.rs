//! Validate command handler

use anyhow::{Result, bail};
use clap::Args;
use colored::*;
use std::path::PathBuf;

use super::print_json;
use crate::config::Config;

#[derive(Args)]
pub struct ValidateArgs {
    /// Check this directory as an alternate configuration root
    #[arg(long)]
    pub root: Option<PathBuf>,
}

/// Runs the syntax check and reports the diagnostics
pub async fn handle_validate(args: ValidateArgs, config: &Config) -> Result<()> {
    let controller = config.controller();
    let validation = controller.validate(args.root.as_deref()).await;

    if config.json {
        print_json(&serde_json::json!({
            "ok": validation.ok,
            "diagnostics": validation.diagnostics,
        }))?;
    } else if validation.ok {
        println!("{}", "✓ Configuration is valid".green().bold());
        if !validation.diagnostics.is_empty() {
            println!("  {}", validation.diagnostics.dimmed());
        }
    } else {
        println!("{}", "✗ Configuration is invalid".red().bold());
        println!("{}", validation.diagnostics);
    }

    if !validation.ok {
        bail!("configuration validation failed");
    }
    Ok(())
}
