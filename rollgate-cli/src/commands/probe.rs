//! Probe command handler

use anyhow::{Result, bail};
use colored::*;

use super::print_json;
use crate::config::Config;

pub async fn handle_probe(config: &Config) -> Result<()> {
    let health = &config.runner.health;
    let healthy = config.controller().probe().await;
    let target = format!("{}:{}{}", health.host, health.port, health.path);

    if config.json {
        print_json(&serde_json::json!({ "target": target, "healthy": healthy }))?;
    } else if healthy {
        println!("{} {}", "✓ Healthy:".green().bold(), target);
    } else {
        println!("{} {}", "✗ Unhealthy:".red().bold(), target);
    }

    if !healthy {
        bail!("health probe failed");
    }
    Ok(())
}
