//! Rollout controller
//!
//! Wires the services together from a `Config` and serializes the mutating
//! operations (staged rollout, blue-green switch, restore) behind the
//! per-service advisory lock.

use rollgate_core::domain::{
    BackupArtifact, Environment, EnvironmentLayout, RolloutAttempt, ServiceTarget, SwitchReport,
};
use rollgate_core::sizing::MpmSizing;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::host::HostFacts;
use crate::lock::RolloutLock;
use crate::process::{ProcessRunner, SystemProcessRunner};
use crate::service::{
    BackupService, BlueGreenSwitch, HealthGate, ReloadReport, ReloadSupervisor, ServiceManager,
    StagedRollout, Validation, Validator,
};

/// Entry point for every controller operation
pub struct RolloutController {
    config: Config,
    host: HostFacts,
    target: Arc<ServiceTarget>,
    services: ServiceManager,
    validator: Validator,
    supervisor: ReloadSupervisor,
    backups: BackupService,
    gate: Arc<dyn HealthGate>,
}

impl RolloutController {
    /// Creates a controller that runs real commands
    pub fn new(config: Config, host: HostFacts) -> Self {
        let runner = Arc::new(SystemProcessRunner::new(config.command_timeout));
        Self::with_runner(config, host, runner)
    }

    /// Creates a controller over a custom process runner
    pub fn with_runner(config: Config, host: HostFacts, runner: Arc<dyn ProcessRunner>) -> Self {
        let target = Arc::new(config.profile.service_target());
        let services = ServiceManager::new(runner.clone(), target.clone());
        let validator = Validator::new(runner, target.clone());
        let supervisor = ReloadSupervisor::new(services.clone(), config.reload);
        let backups = BackupService::new(
            services.clone(),
            validator.clone(),
            host.clone(),
            config.backup_dir.clone(),
            config.profile.config_root.clone(),
        );
        let gate: Arc<dyn HealthGate> = Arc::new(config.health.clone());

        Self {
            config,
            host,
            target,
            services,
            validator,
            supervisor,
            backups,
            gate,
        }
    }

    /// Replaces the health probe used to gate reloads
    pub fn with_health_gate(mut self, gate: Arc<dyn HealthGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn host(&self) -> &HostFacts {
        &self.host
    }

    pub fn target(&self) -> &ServiceTarget {
        &self.target
    }

    /// Blue-green layout rooted at the profile's configuration root
    pub fn default_layout(&self) -> EnvironmentLayout {
        EnvironmentLayout::for_config_dir(self.config.profile.config_root.clone())
    }

    /// Checks the live configuration, or an alternate root
    pub async fn validate(&self, root: Option<&Path>) -> Validation {
        self.validator.validate(root).await
    }

    /// Probes the health endpoint once
    pub async fn probe(&self) -> bool {
        self.gate.check().await
    }

    /// Graceful reload, gated by the health probe when `gated` is set
    pub async fn reload(&self, gated: bool) -> Result<ReloadReport> {
        if gated {
            let gate = &*self.gate;
            self.supervisor.graceful_reload(Some(gate), Some(gate)).await
        } else {
            self.supervisor.graceful_reload(None, None).await
        }
    }

    /// Runs `mutation` as a staged rollout under the service lock
    pub async fn staged_rollout<F, Fut>(&self, attempt: &mut RolloutAttempt, mutation: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let _lock = self.lock()?;
        StagedRollout::new(self.validator.clone(), self.supervisor.clone(), self.gate.clone())
            .run(attempt, mutation)
            .await
    }

    /// Switches environments under the service lock
    pub async fn blue_green(&self, layout: &EnvironmentLayout) -> Result<SwitchReport> {
        let _lock = self.lock()?;
        self.switch().deploy(layout).await
    }

    /// Prepares the inactive environment with `prepare`, then switches
    pub async fn blue_green_with<F, Fut>(
        &self,
        layout: &EnvironmentLayout,
        prepare: F,
    ) -> Result<SwitchReport>
    where
        F: FnOnce(Environment, PathBuf) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let _lock = self.lock()?;
        self.switch().deploy_with(layout, prepare).await
    }

    pub async fn backup(&self, label: Option<&str>) -> Result<BackupArtifact> {
        self.backups.backup(label).await
    }

    /// Restores an archive under the service lock
    pub async fn restore(&self, archive: &Path, force: bool) -> Result<()> {
        let _lock = self.lock()?;
        self.backups.restore(archive, force).await
    }

    /// MPM sizing recommendation for this host
    pub fn sizing(&self) -> MpmSizing {
        MpmSizing::for_host(self.host.memory_mb, self.host.cpu_cores)
    }

    fn switch(&self) -> BlueGreenSwitch {
        BlueGreenSwitch::new(self.validator.clone(), self.services.clone(), self.config.liveness)
            .with_backups(self.backups.clone())
            .with_original_retention(self.config.original_retention)
    }

    fn lock(&self) -> Result<RolloutLock> {
        let lock = RolloutLock::acquire(&self.config.lock_dir, self.services.name())?;
        info!("Holding rollout lock {}", lock.path().display());
        Ok(lock)
    }
}
