//! Reload supervisor
//!
//! Graceful reload with optional health gates on either side, a bounded
//! number of attempts with a fixed wait between them, and a before/after
//! comparison of worker PIDs.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::error::{Result, RolloutError};
use crate::service::control::ServiceManager;
use crate::service::health::HealthGate;

/// Retry policy for graceful reloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReloadPolicy {
    pub max_attempts: u32,
    /// Wait after a failed attempt, and once more after success before
    /// re-enumerating workers
    pub wait: Duration,
}

impl Default for ReloadPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            wait: Duration::from_secs(5),
        }
    }
}

/// What a successful reload looked like
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReloadReport {
    /// Reload commands issued, including the successful one
    pub attempts: u32,
    pub workers_replaced: bool,
}

/// Performs graceful reloads of one service
#[derive(Clone)]
pub struct ReloadSupervisor {
    services: ServiceManager,
    policy: ReloadPolicy,
}

impl ReloadSupervisor {
    pub fn new(services: ServiceManager, policy: ReloadPolicy) -> Self {
        Self { services, policy }
    }

    pub fn policy(&self) -> ReloadPolicy {
        self.policy
    }

    /// Reloads the service, gated by `pre_check` and `post_check` when given
    pub async fn graceful_reload(
        &self,
        pre_check: Option<&dyn HealthGate>,
        post_check: Option<&dyn HealthGate>,
    ) -> Result<ReloadReport> {
        let service = self.services.name().to_string();

        if let Some(check) = pre_check {
            if !check.check().await {
                warn!("Pre-reload check failed for {}", service);
                return Err(RolloutError::PreCheck { service });
            }
        }

        let before = self.services.worker_snapshot().await;

        let mut attempts = 0;
        let mut reloaded = false;
        while attempts < self.policy.max_attempts {
            attempts += 1;
            info!(
                "Attempting graceful reload of {} (attempt {}/{})",
                service, attempts, self.policy.max_attempts
            );

            match self.services.reload().await {
                Ok(()) => {
                    reloaded = true;
                    break;
                }
                Err(e) => {
                    warn!(
                        "Reload attempt {} failed: {}; waiting {:?} before retry",
                        attempts, e, self.policy.wait
                    );
                    tokio::time::sleep(self.policy.wait).await;
                }
            }
        }

        if !reloaded {
            error!("Failed to reload {} after {} attempts", service, attempts);
            return Err(RolloutError::ReloadExhausted { service, attempts });
        }

        // Give the server time to spawn new workers
        tokio::time::sleep(self.policy.wait).await;

        let after = self.services.worker_snapshot().await;
        let workers_replaced = before.replaced_by(&after);
        if !workers_replaced {
            warn!("No worker processes were replaced during reload of {}", service);
        }

        if let Some(check) = post_check {
            if !check.check().await {
                warn!("Post-reload check failed for {}", service);
                return Err(RolloutError::PostCheck { service });
            }
        }

        info!("Successfully performed zero-downtime reload of {}", service);
        Ok(ReloadReport {
            attempts,
            workers_replaced,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessOutput;
    use crate::testing::{ScriptedRunner, StubGate, debian_target};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Runner whose reloads fail `failures` times, with pgrep returning a
    /// different PID set on every call
    fn runner_with_failures(failures: usize) -> Arc<ScriptedRunner> {
        let reloads = AtomicUsize::new(0);
        let pgreps = AtomicUsize::new(0);
        Arc::new(ScriptedRunner::new(move |cmd| {
            if cmd.is("systemctl", "reload") {
                let n = reloads.fetch_add(1, Ordering::SeqCst);
                if n < failures {
                    ProcessOutput::failed(1, "Job for apache2.service failed")
                } else {
                    ProcessOutput::ok("")
                }
            } else if cmd.program == "pgrep" {
                let n = pgreps.fetch_add(1, Ordering::SeqCst);
                ProcessOutput::ok(format!("123\n456\n{}\n", 789 + n))
            } else {
                ProcessOutput::ok("")
            }
        }))
    }

    fn supervisor(runner: Arc<ScriptedRunner>, max_attempts: u32) -> ReloadSupervisor {
        ReloadSupervisor::new(
            ServiceManager::new(runner, debian_target()),
            ReloadPolicy {
                max_attempts,
                wait: Duration::from_secs(5),
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_succeeds_first_try() {
        let runner = runner_with_failures(0);

        let report = supervisor(runner.clone(), 3)
            .graceful_reload(None, None)
            .await
            .unwrap();

        assert_eq!(report.attempts, 1);
        assert!(report.workers_replaced);
        assert_eq!(runner.count("systemctl", "reload"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_third_attempt_succeeds() {
        let runner = runner_with_failures(2);

        let report = supervisor(runner.clone(), 3)
            .graceful_reload(None, None)
            .await
            .unwrap();

        assert_eq!(report.attempts, 3);
        assert_eq!(runner.count("systemctl", "reload"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_exceeds_max_attempts() {
        let runner = runner_with_failures(usize::MAX);

        let err = supervisor(runner.clone(), 4)
            .graceful_reload(None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, RolloutError::ReloadExhausted { attempts: 4, .. }));
        assert_eq!(runner.count("systemctl", "reload"), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_between_attempts() {
        let runner = runner_with_failures(1);
        let started = tokio::time::Instant::now();

        supervisor(runner, 3).graceful_reload(None, None).await.unwrap();

        // one retry wait plus the settle wait
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed < Duration::from_secs(11));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_pre_check_skips_reload() {
        let runner = runner_with_failures(0);
        let gate = StubGate::new(false);

        let err = supervisor(runner.clone(), 3)
            .graceful_reload(Some(&gate), None)
            .await
            .unwrap_err();

        assert!(matches!(err, RolloutError::PreCheck { .. }));
        assert_eq!(gate.calls(), 1);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_post_check_runs_and_can_fail() {
        let runner = runner_with_failures(0);
        let pre = StubGate::new(true);
        let post = StubGate::new(false);

        let err = supervisor(runner.clone(), 3)
            .graceful_reload(Some(&pre), Some(&post))
            .await
            .unwrap_err();

        assert!(matches!(err, RolloutError::PostCheck { .. }));
        assert_eq!(pre.calls(), 1);
        assert_eq!(post.calls(), 1);
        assert_eq!(runner.count("systemctl", "reload"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_workers_only_warn() {
        let runner = Arc::new(ScriptedRunner::new(|cmd| {
            if cmd.program == "pgrep" {
                ProcessOutput::ok("123\n456\n789\n")
            } else {
                ProcessOutput::ok("")
            }
        }));

        let report = supervisor(runner, 3).graceful_reload(None, None).await.unwrap();

        assert!(!report.workers_replaced);
    }
}
