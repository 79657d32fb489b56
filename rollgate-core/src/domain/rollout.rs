//! Staged rollout domain types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// One staged-rollout transaction
///
/// Created when a rollout is requested and updated by the controller as it
/// runs. The configuration change itself is supplied separately as a closure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolloutAttempt {
    pub id: Uuid,
    pub config_path: Option<PathBuf>,
    pub backup_path: Option<PathBuf>,
    pub rollback_on_failure: bool,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    pub outcome: Option<RolloutOutcome>,
}

impl RolloutAttempt {
    /// Attempt with rollback enabled and no backup
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            config_path: None,
            backup_path: None,
            rollback_on_failure: true,
            started_at: None,
            finished_at: None,
            outcome: None,
        }
    }

    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn with_backup_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.backup_path = Some(path.into());
        self
    }

    pub fn with_rollback(mut self, rollback_on_failure: bool) -> Self {
        self.rollback_on_failure = rollback_on_failure;
        self
    }

    /// Both paths, when the caller asked for a backup
    pub fn backup_pair(&self) -> Option<(&PathBuf, &PathBuf)> {
        self.config_path.as_ref().zip(self.backup_path.as_ref())
    }

    pub fn mark_started(&mut self) {
        self.started_at = Some(chrono::Utc::now());
    }

    pub fn finish(&mut self, outcome: RolloutOutcome) {
        self.finished_at = Some(chrono::Utc::now());
        self.outcome = Some(outcome);
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, Some(RolloutOutcome::Applied))
    }
}

impl Default for RolloutAttempt {
    fn default() -> Self {
        Self::new()
    }
}

/// Recorded result of a rollout attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RolloutOutcome {
    /// Change validated, reloaded and passed health checks
    Applied,
    /// Copying the config to its backup path failed; nothing was changed
    BackupFailed,
    /// The caller's mutation failed; nothing was validated or reloaded
    MutationFailed,
    ValidationFailed { restored: bool },
    ReloadFailed { restored: bool },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_attempt_defaults() {
        let attempt = RolloutAttempt::new();

        assert!(attempt.rollback_on_failure);
        assert!(attempt.backup_pair().is_none());
        assert!(attempt.outcome.is_none());
        assert!(!attempt.succeeded());
    }

    #[test]
    fn test_backup_pair_requires_both_paths() {
        let only_config = RolloutAttempt::new().with_config_path("/etc/svc/conf");
        assert!(only_config.backup_pair().is_none());

        let both = only_config.with_backup_path("/etc/svc/conf.bak");
        let (config, backup) = both.backup_pair().unwrap();
        assert_eq!(config, &PathBuf::from("/etc/svc/conf"));
        assert_eq!(backup, &PathBuf::from("/etc/svc/conf.bak"));
    }

    #[test]
    fn test_finish_records_outcome() {
        let mut attempt = RolloutAttempt::new();
        attempt.mark_started();
        attempt.finish(RolloutOutcome::ValidationFailed { restored: true });

        assert!(attempt.started_at.is_some());
        assert!(attempt.finished_at.is_some());
        assert_eq!(
            attempt.outcome,
            Some(RolloutOutcome::ValidationFailed { restored: true })
        );
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(RolloutOutcome::ReloadFailed { restored: false }).unwrap();

        assert_eq!(json["status"], "reload_failed");
        assert_eq!(json["restored"], false);
    }
}
