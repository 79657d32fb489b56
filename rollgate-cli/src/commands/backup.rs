//! Backup and restore command handlers

use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use std::path::PathBuf;

use super::print_json;
use crate::config::Config;

#[derive(Args)]
pub struct BackupArgs {
    /// Suffix appended to the archive name
    #[arg(short, long)]
    pub label: Option<String>,
}

#[derive(Args)]
pub struct RestoreArgs {
    /// Archive created by `rollgate backup`
    pub archive: PathBuf,

    /// Restore even if the archive was taken on another platform
    #[arg(long)]
    pub force: bool,
}

pub async fn handle_backup(args: BackupArgs, config: &Config) -> Result<()> {
    let artifact = config
        .controller()
        .backup(args.label.as_deref())
        .await
        .context("Backup failed")?;

    if config.json {
        print_json(&artifact)?;
    } else {
        println!("{}", "✓ Configuration backed up".green().bold());
        println!("  {}: {}", "Archive".bold(), artifact.archive.display());
        println!("  {}: {}", "Metadata".bold(), artifact.metadata.display());
    }

    Ok(())
}

pub async fn handle_restore(args: RestoreArgs, config: &Config) -> Result<()> {
    config
        .controller()
        .restore(&args.archive, args.force)
        .await
        .with_context(|| format!("Failed to restore {}", args.archive.display()))?;

    if config.json {
        print_json(&serde_json::json!({ "restored": args.archive }))?;
    } else {
        println!(
            "{} {}",
            "✓ Configuration restored from".green().bold(),
            args.archive.display()
        );
    }

    Ok(())
}
