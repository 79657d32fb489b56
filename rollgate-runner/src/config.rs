//! Controller configuration
//!
//! Defines every tunable of the rollout controller: the platform profile,
//! health probe target, reload and liveness policies, and where backups and
//! lock files live.

use rollgate_core::domain::PlatformProfile;
use std::path::PathBuf;
use std::time::Duration;

use crate::host::HostFacts;
use crate::service::{HealthProbe, LivenessPolicy, ReloadPolicy};

/// Default directory for configuration archives
pub const DEFAULT_BACKUP_DIR: &str = "/var/backups/httpd";

/// Default directory for per-service lock files
pub const DEFAULT_LOCK_DIR: &str = "/run/lock/rollgate";

/// Controller configuration
///
/// Built once at startup and never mutated while an operation runs.
#[derive(Debug, Clone)]
pub struct Config {
    /// Service, config root and commands for this host
    pub profile: PlatformProfile,

    /// Probe used as the pre- and post-reload health gate
    pub health: HealthProbe,

    pub reload: ReloadPolicy,

    /// Post-switch liveness polling for blue-green deployments
    pub liveness: LivenessPolicy,

    pub backup_dir: PathBuf,

    pub lock_dir: PathBuf,

    /// Deadline for every external command
    pub command_timeout: Duration,

    /// How many `-original-` sidecar directories to keep; `None` keeps all
    pub original_retention: Option<usize>,
}

impl Config {
    /// Creates a configuration with defaults for the given profile
    pub fn new(profile: PlatformProfile) -> Self {
        Self {
            profile,
            health: HealthProbe::default(),
            reload: ReloadPolicy::default(),
            liveness: LivenessPolicy::default(),
            backup_dir: PathBuf::from(DEFAULT_BACKUP_DIR),
            lock_dir: PathBuf::from(DEFAULT_LOCK_DIR),
            command_timeout: Duration::from_secs(60),
            original_retention: None,
        }
    }

    /// Defaults for the detected host
    pub fn for_host(facts: &HostFacts) -> Self {
        Self::new(facts.profile())
    }

    /// Creates configuration for the detected host, overlaid with environment variables
    ///
    /// Recognised environment variables (all optional):
    /// - ROLLGATE_SERVICE, ROLLGATE_CONFIG_ROOT
    /// - ROLLGATE_HEALTH_HOST, ROLLGATE_HEALTH_PORT, ROLLGATE_HEALTH_PATH
    /// - ROLLGATE_HEALTH_TIMEOUT (seconds, default: 5)
    /// - ROLLGATE_RELOAD_ATTEMPTS (default: 3), ROLLGATE_RELOAD_WAIT (seconds, default: 5)
    /// - ROLLGATE_LIVENESS_ATTEMPTS (default: 3), ROLLGATE_LIVENESS_INTERVAL (seconds, default: 2)
    /// - ROLLGATE_BACKUP_DIR, ROLLGATE_LOCK_DIR
    /// - ROLLGATE_COMMAND_TIMEOUT (seconds, default: 60)
    /// - ROLLGATE_ORIGINAL_RETENTION (count, default: keep all)
    pub fn from_env(facts: &HostFacts) -> anyhow::Result<Self> {
        let config = Self::for_host(facts).overlay(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Applies `ROLLGATE_*` values returned by `lookup`
    ///
    /// Values that fail to parse leave the current setting in place.
    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let secs = |key: &str| {
            lookup(key)
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
        };
        let count = |key: &str| lookup(key).and_then(|s| s.parse::<u32>().ok());

        if let Some(service) = lookup("ROLLGATE_SERVICE") {
            self.profile = self.profile.with_service_name(service);
        }
        if let Some(root) = lookup("ROLLGATE_CONFIG_ROOT") {
            self.profile = self.profile.with_config_root(root);
        }

        if let Some(host) = lookup("ROLLGATE_HEALTH_HOST") {
            self.health.host = host;
        }
        if let Some(port) = lookup("ROLLGATE_HEALTH_PORT").and_then(|s| s.parse::<u16>().ok()) {
            self.health.port = port;
        }
        if let Some(path) = lookup("ROLLGATE_HEALTH_PATH") {
            self.health.path = path;
        }
        self.health.timeout = secs("ROLLGATE_HEALTH_TIMEOUT").unwrap_or(self.health.timeout);

        if let Some(attempts) = count("ROLLGATE_RELOAD_ATTEMPTS") {
            self.reload.max_attempts = attempts;
        }
        self.reload.wait = secs("ROLLGATE_RELOAD_WAIT").unwrap_or(self.reload.wait);

        if let Some(attempts) = count("ROLLGATE_LIVENESS_ATTEMPTS") {
            self.liveness.attempts = attempts;
        }
        self.liveness.interval = secs("ROLLGATE_LIVENESS_INTERVAL").unwrap_or(self.liveness.interval);

        if let Some(dir) = lookup("ROLLGATE_BACKUP_DIR") {
            self.backup_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("ROLLGATE_LOCK_DIR") {
            self.lock_dir = PathBuf::from(dir);
        }
        self.command_timeout = secs("ROLLGATE_COMMAND_TIMEOUT").unwrap_or(self.command_timeout);

        if let Some(keep) = lookup("ROLLGATE_ORIGINAL_RETENTION").and_then(|s| s.parse().ok()) {
            self.original_retention = Some(keep);
        }

        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.profile.service_name.is_empty() {
            anyhow::bail!("service name cannot be empty");
        }

        if self.health.host.is_empty() {
            anyhow::bail!("health probe host cannot be empty");
        }

        if !self.health.path.starts_with('/') {
            anyhow::bail!("health probe path must start with /");
        }

        if self.health.timeout.is_zero() {
            anyhow::bail!("health probe timeout must be greater than 0");
        }

        if self.reload.max_attempts == 0 {
            anyhow::bail!("reload attempts must be greater than 0");
        }

        if self.liveness.attempts == 0 {
            anyhow::bail!("liveness attempts must be greater than 0");
        }

        if self.command_timeout.is_zero() {
            anyhow::bail!("command timeout must be greater than 0");
        }

        Ok(())
    }
}
