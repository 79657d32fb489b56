//! Blue-green switch
//!
//! Keeps two parallel configuration directories and flips the canonical
//! configuration path between them with a symlink. The inactive side is
//! prepared and validated before the service is touched, and a switch whose
//! service never comes back up is reverted to the previous side.

use rollgate_core::domain::{Environment, EnvironmentLayout, SwitchOutcome, SwitchReport};
use serde::{Deserialize, Serialize};
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::error::{Result, RolloutError};
use crate::fsops;
use crate::service::backup::BackupService;
use crate::service::control::ServiceManager;
use crate::service::validator::Validator;

/// Post-switch liveness polling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessPolicy {
    pub attempts: u32,
    /// Wait before each check
    pub interval: Duration,
}

impl Default for LivenessPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            interval: Duration::from_secs(2),
        }
    }
}

/// Switches a service between its blue and green configurations
#[derive(Clone)]
pub struct BlueGreenSwitch {
    validator: Validator,
    services: ServiceManager,
    backups: Option<BackupService>,
    liveness: LivenessPolicy,
    original_retention: Option<usize>,
}

impl BlueGreenSwitch {
    pub fn new(validator: Validator, services: ServiceManager, liveness: LivenessPolicy) -> Self {
        Self {
            validator,
            services,
            backups: None,
            liveness,
            original_retention: None,
        }
    }

    /// Archives the active configuration before every switch
    pub fn with_backups(mut self, backups: BackupService) -> Self {
        self.backups = Some(backups);
        self
    }

    /// Keeps at most `keep` `-original-` sidecar directories; `None` keeps all
    pub fn with_original_retention(mut self, keep: Option<usize>) -> Self {
        self.original_retention = keep;
        self
    }

    /// Switches to the inactive environment as-is
    pub async fn deploy(&self, layout: &EnvironmentLayout) -> Result<SwitchReport> {
        self.run(layout, None::<fn(Environment, PathBuf) -> std::future::Ready<anyhow::Result<()>>>)
            .await
    }

    /// Lets `prepare` stage changes into the inactive directory, then switches
    ///
    /// `prepare` receives the inactive label and its directory.
    pub async fn deploy_with<F, Fut>(&self, layout: &EnvironmentLayout, prepare: F) -> Result<SwitchReport>
    where
        F: FnOnce(Environment, PathBuf) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        self.run(layout, Some(prepare)).await
    }

    async fn run<F, Fut>(&self, layout: &EnvironmentLayout, prepare: Option<F>) -> Result<SwitchReport>
    where
        F: FnOnce(Environment, PathBuf) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let config_dir = &layout.config_dir;
        if let Some(dir) = layout.conflicting_dir() {
            error!(
                "Environment directory {} overlaps {}",
                dir.display(),
                config_dir.display()
            );
            return Err(RolloutError::Layout {
                dir: dir.to_path_buf(),
                config_dir: config_dir.clone(),
            });
        }
        let converted = fsops::is_symlink(config_dir);

        let active = if converted {
            active_from_link(layout)?
        } else {
            if !layout.blue_dir.exists() {
                info!(
                    "Initializing blue environment {} from {}",
                    layout.blue_dir.display(),
                    config_dir.display()
                );
                fsops::copy_dir_contents(config_dir, &layout.blue_dir)?;
            }
            Environment::Blue
        };

        let inactive = active.other();
        let active_dir = layout.dir(active).to_path_buf();
        let inactive_dir = layout.dir(inactive).to_path_buf();
        info!("Active environment is {}, preparing {}", active, inactive);

        fs::create_dir_all(&inactive_dir)
            .map_err(RolloutError::io(format!("failed to create {}", inactive_dir.display())))?;
        if fsops::is_empty_dir(&inactive_dir) {
            fsops::copy_dir_contents(&active_dir, &inactive_dir)?;
        }

        if let Some(prepare) = prepare {
            prepare(inactive, inactive_dir.clone()).await.map_err(|e| {
                error!("Failed to prepare {} environment: {:#}", inactive, e);
                RolloutError::Prepare {
                    environment: inactive.to_string(),
                    detail: format!("{:#}", e),
                }
            })?;
        }

        let validation = self.validator.validate(Some(&inactive_dir)).await;
        if !validation.ok {
            error!(
                "Inactive environment configuration has syntax errors: {}",
                validation.diagnostics
            );
            return Ok(SwitchReport {
                active,
                outcome: SwitchOutcome::Skipped {
                    diagnostics: validation.diagnostics,
                },
            });
        }

        if let Some(backups) = &self.backups {
            let label = format!("before-{}-switch", inactive);
            if let Err(e) = backups.backup_of(config_dir, Some(&label)).await {
                warn!("Pre-switch backup failed: {}", e);
            }
        }

        self.services.stop().await?;

        if let Err(e) = self.swap(layout, converted, &inactive_dir) {
            error!("Failed to switch to {} environment: {}", inactive, e);
            if let Err(start) = self.services.start().await {
                error!("Failed to restart {}: {}", self.services.name(), start);
            }
            return Err(e);
        }

        if let Err(e) = self.services.start().await {
            warn!("{}", e);
        }

        if self.wait_until_active().await {
            info!("Switched {} to {} environment", self.services.name(), inactive);
            return Ok(SwitchReport {
                active: inactive,
                outcome: SwitchOutcome::Switched,
            });
        }

        error!(
            "{} did not start with the {} configuration, reverting to {}",
            self.services.name(),
            inactive,
            active
        );
        if let Err(e) = self.revert(layout, &active_dir).await {
            error!("Failed to revert to {} environment: {}", active, e);
            return Err(RolloutError::Liveness {
                service: self.services.name().to_string(),
                attempts: self.liveness.attempts,
                detail: e.to_string(),
            });
        }
        Ok(SwitchReport {
            active,
            outcome: SwitchOutcome::Reverted,
        })
    }

    /// Points the canonical path at `inactive_dir`
    ///
    /// The new link is created beside the canonical path and renamed over it,
    /// so an existing link is replaced in one step. A plain directory is first
    /// moved aside to a timestamped sidecar and moved back if the link cannot
    /// be put in its place.
    fn swap(&self, layout: &EnvironmentLayout, converted: bool, inactive_dir: &Path) -> Result<()> {
        if converted {
            return relink(layout, inactive_dir);
        }

        let config_dir = &layout.config_dir;
        let pending = layout.pending_link();
        fsops::replace_symlink(inactive_dir, &pending)?;

        let sidecar = layout.original_sidecar(chrono::Utc::now().timestamp());
        if let Err(e) = fs::rename(config_dir, &sidecar) {
            discard(&pending);
            return Err(RolloutError::io(format!(
                "failed to move {} to {}",
                config_dir.display(),
                sidecar.display()
            ))(e));
        }

        if let Err(e) = fs::rename(&pending, config_dir) {
            discard(&pending);
            if let Err(back) = fs::rename(&sidecar, config_dir) {
                error!(
                    "Failed to move {} back to {}: {}",
                    sidecar.display(),
                    config_dir.display(),
                    back
                );
            }
            return Err(RolloutError::io(format!(
                "failed to link {} to {}",
                config_dir.display(),
                inactive_dir.display()
            ))(e));
        }

        info!("Moved original configuration to {}", sidecar.display());
        self.prune_sidecars(layout);
        Ok(())
    }

    /// Polls the service state per the liveness policy
    async fn wait_until_active(&self) -> bool {
        for attempt in 1..=self.liveness.attempts {
            tokio::time::sleep(self.liveness.interval).await;
            if self.services.is_active().await {
                return true;
            }
            warn!(
                "{} not active yet (check {}/{})",
                self.services.name(),
                attempt,
                self.liveness.attempts
            );
        }
        false
    }

    async fn revert(&self, layout: &EnvironmentLayout, previous_dir: &Path) -> Result<()> {
        if let Err(e) = self.services.stop().await {
            warn!("{}", e);
        }
        relink(layout, previous_dir)?;
        self.services.start().await
    }

    /// Deletes the oldest `-original-` sidecars beyond the retention limit
    fn prune_sidecars(&self, layout: &EnvironmentLayout) {
        let Some(keep) = self.original_retention else {
            return;
        };
        let Some(parent) = layout.config_dir.parent() else {
            return;
        };
        let Ok(entries) = fs::read_dir(parent) else {
            return;
        };

        let prefix = layout.original_sidecar_prefix();
        let mut sidecars: Vec<(i64, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                let ts = name.strip_prefix(&prefix)?.parse().ok()?;
                Some((ts, entry.path()))
            })
            .collect();
        sidecars.sort();

        let excess = sidecars.len().saturating_sub(keep);
        for (_, path) in sidecars.into_iter().take(excess) {
            match fsops::remove_path(&path) {
                Ok(()) => info!("Removed old configuration {}", path.display()),
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
    }
}

/// Replaces the canonical link with one pointing at `target`
fn relink(layout: &EnvironmentLayout, target: &Path) -> Result<()> {
    let pending = layout.pending_link();
    fsops::replace_symlink(target, &pending)?;
    fs::rename(&pending, &layout.config_dir).map_err(|e| {
        discard(&pending);
        RolloutError::io(format!(
            "failed to link {} to {}",
            layout.config_dir.display(),
            target.display()
        ))(e)
    })
}

fn discard(pending: &Path) {
    if let Err(e) = fs::remove_file(pending) {
        warn!("Failed to remove {}: {}", pending.display(), e);
    }
}

/// Reads which environment the canonical symlink points at
fn active_from_link(layout: &EnvironmentLayout) -> Result<Environment> {
    let target = fs::read_link(&layout.config_dir).map_err(RolloutError::io(format!(
        "failed to read link {}",
        layout.config_dir.display()
    )))?;

    if target == layout.blue_dir {
        return Ok(Environment::Blue);
    }
    let resolved = fs::canonicalize(&layout.config_dir).ok();
    let blue = fs::canonicalize(&layout.blue_dir).ok();
    if resolved.is_some() && resolved == blue {
        Ok(Environment::Blue)
    } else {
        Ok(Environment::Green)
    }
}
