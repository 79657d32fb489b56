//! Tune and facts command handlers
//!
//! Prints the MPM sizing recommendation and the host facts it was derived
//! from. Values computed from defaults are flagged.

use anyhow::Result;
use colored::*;
use rollgate_core::sizing::{Estimate, MpmSizing};

use super::print_json;
use crate::config::Config;

pub fn handle_tune(config: &Config) -> Result<()> {
    let sizing = MpmSizing::for_host(config.host.memory_mb, config.host.cpu_cores);

    if config.json {
        return print_json(&sizing);
    }

    println!("{}", "Recommended MPM settings:".bold());
    print_estimate("MaxRequestWorkers", &sizing.max_request_workers);
    print_estimate("ThreadsPerChild", &sizing.threads_per_child);
    print_estimate("ServerLimit", &sizing.server_limit);
    Ok(())
}

pub fn handle_facts(config: &Config) -> Result<()> {
    let host = &config.host;

    if config.json {
        return print_json(host);
    }

    let unknown = || "unknown".dimmed().to_string();
    println!("{}", "Host facts:".bold());
    println!("  {}: {}", "Hostname".bold(), host.hostname);
    println!(
        "  {}: {} {} ({})",
        "Platform".bold(),
        host.platform,
        host.platform_version,
        host.family
    );
    println!("  {}: {:?}", "Init".bold(), host.init);
    println!(
        "  {}: {}",
        "Memory".bold(),
        host.memory_mb.map(|mb| format!("{} MB", mb)).unwrap_or_else(unknown)
    );
    println!(
        "  {}: {}",
        "CPUs".bold(),
        host.cpu_cores.map(|c| c.to_string()).unwrap_or_else(unknown)
    );
    println!("  {}: {}", "Service".bold(), config.runner.profile.service_name.cyan());
    println!(
        "  {}: {}",
        "Config root".bold(),
        config.runner.profile.config_root.display()
    );
    Ok(())
}

fn print_estimate(name: &str, estimate: &Estimate<u32>) {
    if estimate.used_default {
        println!("  {:<18} {} {}", name, estimate.value, "(from defaults)".yellow());
    } else {
        println!("  {:<18} {}", name, estimate.value);
    }
}
