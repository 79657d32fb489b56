//! Error types for the rollout controller

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for controller operations
pub type Result<T> = std::result::Result<T, RolloutError>;

/// Failures while executing an external command
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The program could not be started
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran past its deadline and was killed
    #[error("'{program}' timed out after {timeout:?}")]
    TimedOut { program: String, timeout: Duration },
}

/// Errors surfaced by rollout operations
#[derive(Debug, Error)]
pub enum RolloutError {
    /// Configuration failed the server's syntax check
    #[error("configuration validation failed: {diagnostics}")]
    Validation { diagnostics: String },

    /// Health gate failed before the reload was attempted
    #[error("pre-reload check failed for {service}")]
    PreCheck { service: String },

    /// Every reload attempt exited nonzero
    #[error("failed to reload {service} after {attempts} attempt(s)")]
    ReloadExhausted { service: String, attempts: u32 },

    /// Health gate failed after a successful reload
    #[error("post-reload check failed for {service}")]
    PostCheck { service: String },

    /// Service never reported active after a blue-green swap and the
    /// previous environment could not be brought back either
    #[error("{service} did not become active after {attempts} check(s), revert failed: {detail}")]
    Liveness {
        service: String,
        attempts: u32,
        detail: String,
    },

    /// Blue-green directories overlap the canonical path or each other
    #[error("invalid blue-green layout: {} overlaps {}", .dir.display(), .config_dir.display())]
    Layout { dir: PathBuf, config_dir: PathBuf },

    /// Health probe could not obtain a response
    #[error("health probe to {address} failed: {detail}")]
    Transport { address: String, detail: String },

    /// Backup was taken on an incompatible host
    #[error(
        "platform mismatch: backup from {backup_platform} {backup_version}, \
         current platform is {host_platform} {host_version}"
    )]
    PlatformMismatch {
        backup_platform: String,
        backup_version: String,
        host_platform: String,
        host_version: String,
    },

    /// Caller-supplied configuration change failed
    #[error("failed to apply configuration changes: {0}")]
    Mutation(String),

    /// Caller-supplied preparation of the inactive environment failed
    #[error("failed to prepare {environment} environment: {detail}")]
    Prepare { environment: String, detail: String },

    /// Service control command failed
    #[error("failed to {action} {service}: {detail}")]
    Service {
        action: &'static str,
        service: String,
        detail: String,
    },

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Creating or extracting a backup archive failed
    #[error("archive operation failed: {0}")]
    Archive(String),

    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Another rollout holds the advisory lock
    #[error("rollout lock {} is held by another process", .path.display())]
    Lock { path: PathBuf },
}

impl RolloutError {
    /// Builds a closure wrapping an io::Error with context, for use with `map_err`
    pub fn io(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> Self {
        let context = context.into();
        move |source| Self::Io { context, source }
    }

    /// True for failures that leave the running configuration untouched
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}
