//! Service control primitives
//!
//! Start, stop, reload, liveness and worker enumeration for the managed
//! server, expressed entirely through the target's prebuilt commands.

use rollgate_core::domain::{CommandLine, ServiceTarget, WorkerSnapshot};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Result, RolloutError};
use crate::process::ProcessRunner;

/// Drives the init system for one service target
#[derive(Clone)]
pub struct ServiceManager {
    runner: Arc<dyn ProcessRunner>,
    target: Arc<ServiceTarget>,
}

impl ServiceManager {
    pub fn new(runner: Arc<dyn ProcessRunner>, target: Arc<ServiceTarget>) -> Self {
        Self { runner, target }
    }

    pub fn target(&self) -> &ServiceTarget {
        &self.target
    }

    pub fn runner(&self) -> &Arc<dyn ProcessRunner> {
        &self.runner
    }

    pub fn name(&self) -> &str {
        &self.target.name
    }

    async fn invoke(&self, action: &'static str, command: &CommandLine) -> Result<()> {
        let output = self.runner.run(command).await?;
        if output.success() {
            debug!("{} {} succeeded", action, self.target.name);
            Ok(())
        } else {
            Err(RolloutError::Service {
                action,
                service: self.target.name.clone(),
                detail: format!("'{}' exited {}: {}", command, output.exit_code, output.diagnostics()),
            })
        }
    }

    pub async fn start(&self) -> Result<()> {
        info!("Starting {}", self.target.name);
        self.invoke("start", &self.target.start).await
    }

    pub async fn stop(&self) -> Result<()> {
        info!("Stopping {}", self.target.name);
        self.invoke("stop", &self.target.stop).await
    }

    /// Issues one graceful reload command
    pub async fn reload(&self) -> Result<()> {
        self.invoke("reload", &self.target.reload).await
    }

    /// True if any of the status commands reports the service active
    pub async fn is_active(&self) -> bool {
        for command in &self.target.status {
            match self.runner.run(command).await {
                Ok(output) if output.success() => return true,
                Ok(output) => debug!("'{}' exited {}", command, output.exit_code),
                Err(e) => debug!("'{}' could not run: {}", command, e),
            }
        }
        false
    }

    /// Captures the current worker PIDs; an empty snapshot if enumeration fails
    pub async fn worker_snapshot(&self) -> WorkerSnapshot {
        match self.runner.run(&self.target.list_workers).await {
            Ok(output) if output.success() => WorkerSnapshot::from_pgrep_output(&output.stdout),
            Ok(_) => WorkerSnapshot::empty(),
            Err(e) => {
                warn!("Failed to enumerate {} workers: {}", self.target.name, e);
                WorkerSnapshot::empty()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessOutput;
    use crate::testing::{ScriptedRunner, debian_target};
    use std::collections::BTreeSet;

    #[tokio::test]
    async fn test_worker_snapshot_parses_pids() {
        let runner = Arc::new(ScriptedRunner::new(|_| ProcessOutput::ok("123\n456\n789\n")));
        let services = ServiceManager::new(runner, debian_target());

        let snapshot = services.worker_snapshot().await;

        assert_eq!(snapshot.pids, BTreeSet::from([123, 456, 789]));
    }

    #[tokio::test]
    async fn test_worker_snapshot_empty_when_pgrep_fails() {
        let runner = Arc::new(ScriptedRunner::new(|_| ProcessOutput::failed(1, "")));
        let services = ServiceManager::new(runner, debian_target());

        assert!(services.worker_snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_is_active_falls_back_to_service_status() {
        let runner = Arc::new(ScriptedRunner::new(|cmd| {
            if cmd.program == "service" {
                ProcessOutput::ok("apache2 is running")
            } else {
                ProcessOutput::failed(3, "inactive")
            }
        }));
        let services = ServiceManager::new(runner.clone(), debian_target());

        assert!(services.is_active().await);
        assert_eq!(runner.count("systemctl", "is-active"), 1);
        assert_eq!(runner.count("service", "apache2"), 1);
    }

    #[tokio::test]
    async fn test_is_active_false_when_all_fail() {
        let runner = Arc::new(ScriptedRunner::new(|_| ProcessOutput::failed(3, "")));
        let services = ServiceManager::new(runner, debian_target());

        assert!(!services.is_active().await);
    }

    #[tokio::test]
    async fn test_stop_failure_is_service_error() {
        let runner = Arc::new(ScriptedRunner::new(|_| {
            ProcessOutput::failed(5, "Unit apache2.service not loaded.")
        }));
        let services = ServiceManager::new(runner, debian_target());

        let err = services.stop().await.unwrap_err();

        match err {
            RolloutError::Service { action, service, detail } => {
                assert_eq!(action, "stop");
                assert_eq!(service, "apache2");
                assert!(detail.contains("not loaded"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
