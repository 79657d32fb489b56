//! Configuration module
//!
//! Resolves the controller configuration from host detection, `ROLLGATE_*`
//! environment variables and command-line flags, in that order.

use anyhow::{Context, Result};
use clap::Args;
use rollgate_runner::{HostFacts, RolloutController};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Global flags overriding the detected and environment configuration
#[derive(Args, Debug, Default)]
pub struct Overrides {
    /// Managed service name
    #[arg(long, global = true)]
    pub service: Option<String>,

    /// Canonical configuration directory
    #[arg(long, global = true)]
    pub config_root: Option<PathBuf>,

    /// Health probe host
    #[arg(long, global = true)]
    pub health_host: Option<String>,

    /// Health probe port
    #[arg(long, global = true)]
    pub health_port: Option<u16>,

    /// Health probe request path
    #[arg(long, global = true)]
    pub health_path: Option<String>,

    /// Health probe timeout in seconds
    #[arg(long, global = true)]
    pub health_timeout: Option<u64>,

    /// Directory for configuration archives
    #[arg(long, global = true)]
    pub backup_dir: Option<PathBuf>,

    /// Directory for per-service lock files
    #[arg(long, global = true)]
    pub lock_dir: Option<PathBuf>,
}

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Resolved controller configuration
    pub runner: rollgate_runner::Config,

    pub host: HostFacts,

    /// Emit JSON instead of human-readable output
    pub json: bool,
}

impl Config {
    /// Detects the host and layers environment and flags over its defaults
    pub fn load(overrides: &Overrides, json: bool) -> Result<Self> {
        let host = HostFacts::detect();
        let runner = apply(
            rollgate_runner::Config::for_host(&host).overlay(|key| std::env::var(key).ok()),
            overrides,
        );
        runner.validate().context("Invalid configuration")?;
        debug!("Resolved configuration: {:?}", runner);

        Ok(Self { runner, host, json })
    }

    /// Builds a controller over the resolved configuration
    pub fn controller(&self) -> RolloutController {
        RolloutController::new(self.runner.clone(), self.host.clone())
    }

    /// Builds a controller after adjusting the configuration
    pub fn controller_with(
        &self,
        adjust: impl FnOnce(&mut rollgate_runner::Config),
    ) -> Result<RolloutController> {
        let mut runner = self.runner.clone();
        adjust(&mut runner);
        runner.validate().context("Invalid configuration")?;
        Ok(RolloutController::new(runner, self.host.clone()))
    }
}

fn apply(mut config: rollgate_runner::Config, overrides: &Overrides) -> rollgate_runner::Config {
    if let Some(service) = &overrides.service {
        config.profile = config.profile.with_service_name(service.clone());
    }
    if let Some(root) = &overrides.config_root {
        config.profile = config.profile.with_config_root(root.clone());
    }
    if let Some(host) = &overrides.health_host {
        config.health.host = host.clone();
    }
    if let Some(port) = overrides.health_port {
        config.health.port = port;
    }
    if let Some(path) = &overrides.health_path {
        config.health.path = path.clone();
    }
    if let Some(secs) = overrides.health_timeout {
        config.health.timeout = Duration::from_secs(secs);
    }
    if let Some(dir) = &overrides.backup_dir {
        config.backup_dir = dir.clone();
    }
    if let Some(dir) = &overrides.lock_dir {
        config.lock_dir = dir.clone();
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollgate_core::domain::{InitSystem, PlatformFamily, PlatformProfile};

    fn base() -> rollgate_runner::Config {
        rollgate_runner::Config::new(PlatformProfile::for_family(
            PlatformFamily::Rhel,
            InitSystem::Systemd,
        ))
    }

    #[test]
    fn test_flags_override_defaults() {
        let overrides = Overrides {
            service: Some("httpd-edge".to_string()),
            health_port: Some(8443),
            health_path: Some("/status".to_string()),
            backup_dir: Some(PathBuf::from("/srv/backups")),
            ..Overrides::default()
        };

        let config = apply(base(), &overrides);

        assert_eq!(config.profile.service_name, "httpd-edge");
        assert_eq!(config.health.port, 8443);
        assert_eq!(config.health.path, "/status");
        assert_eq!(config.backup_dir, PathBuf::from("/srv/backups"));
        assert_eq!(config.profile.config_root, PathBuf::from("/etc/httpd"));
    }

    #[test]
    fn test_no_flags_keeps_config() {
        let config = apply(base(), &Overrides::default());

        assert_eq!(config.health.port, 80);
        assert_eq!(config.profile.service_name, "httpd");
    }
}
