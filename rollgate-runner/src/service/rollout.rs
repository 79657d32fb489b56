//! Staged rollout
//!
//! Applies a caller-supplied configuration change as a transaction: back
//! up, mutate, validate, reload behind health gates, and roll back to the
//! backup when validation or the reload fails.

use rollgate_core::domain::{RolloutAttempt, RolloutOutcome};
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::{Result, RolloutError};
use crate::fsops;
use crate::service::health::HealthGate;
use crate::service::reload::ReloadSupervisor;
use crate::service::validator::Validator;

/// Runs staged rollouts against one service
#[derive(Clone)]
pub struct StagedRollout {
    validator: Validator,
    supervisor: ReloadSupervisor,
    gate: Arc<dyn HealthGate>,
}

impl StagedRollout {
    /// # Arguments
    ///
    /// * `gate` - consulted both before and after the reload
    pub fn new(validator: Validator, supervisor: ReloadSupervisor, gate: Arc<dyn HealthGate>) -> Self {
        Self {
            validator,
            supervisor,
            gate,
        }
    }

    /// Runs `mutation` as a staged rollout, recording the outcome on `attempt`
    ///
    /// Returns `Ok(())` only when the change validated, the reload succeeded
    /// and both health checks passed.
    pub async fn run<F, Fut>(&self, attempt: &mut RolloutAttempt, mutation: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        attempt.mark_started();
        info!("Starting staged rollout {}", attempt.id);

        let backup_pair = attempt
            .backup_pair()
            .map(|(config, backup)| (config.clone(), backup.clone()));
        if let Some((config, backup)) = backup_pair {
            if config.exists() {
                if let Err(e) = fsops::copy_file(&config, &backup) {
                    error!("Failed to back up {}: {}", config.display(), e);
                    attempt.finish(RolloutOutcome::BackupFailed);
                    return Err(e);
                }
                info!("Backed up {} to {}", config.display(), backup.display());
            }
        }

        if let Err(e) = mutation().await {
            error!("Failed to apply configuration changes: {:#}", e);
            attempt.finish(RolloutOutcome::MutationFailed);
            return Err(RolloutError::Mutation(format!("{:#}", e)));
        }

        let validation = self.validator.validate(None).await;
        if !validation.ok {
            error!("Configuration validation failed: {}", validation.diagnostics);
            let restored = self.restore_backup(attempt, "Validation failed");
            attempt.finish(RolloutOutcome::ValidationFailed { restored });
            return validation.into_result();
        }

        let gate = &*self.gate;
        match self.supervisor.graceful_reload(Some(gate), Some(gate)).await {
            Ok(report) => {
                info!(
                    "Rollout {} applied after {} reload attempt(s)",
                    attempt.id, report.attempts
                );
                attempt.finish(RolloutOutcome::Applied);
                Ok(())
            }
            Err(e) => {
                error!("Reload failed during rollout {}: {}", attempt.id, e);
                let restored = self.restore_backup(attempt, "Reload failed");
                if restored {
                    if let Err(recovery) = self.supervisor.graceful_reload(None, None).await {
                        warn!("Recovery reload after rollback failed: {}", recovery);
                    }
                }
                attempt.finish(RolloutOutcome::ReloadFailed { restored });
                Err(e)
            }
        }
    }

    /// Copies the backup over the live config when rollback applies
    fn restore_backup(&self, attempt: &RolloutAttempt, reason: &str) -> bool {
        if !attempt.rollback_on_failure {
            return false;
        }
        let Some((config, backup)) = attempt.backup_pair() else {
            return false;
        };
        if !backup.exists() {
            return false;
        }

        warn!("{}, rolling back to previous configuration", reason);
        match fsops::copy_file(backup, config) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to restore {}: {}", config.display(), e);
                false
            }
        }
    }
}
