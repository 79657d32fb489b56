//! Configuration validator
//!
//! Runs the server's built-in syntax check. Read-only: it never retries and
//! never touches the configuration.

use rollgate_core::domain::ServiceTarget;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::RolloutError;
use crate::process::ProcessRunner;

/// Outcome of one syntax check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub ok: bool,
    /// Captured checker output (stderr, falling back to stdout)
    pub diagnostics: String,
}

impl Validation {
    /// Converts a failed check into a `RolloutError::Validation`
    pub fn into_result(self) -> Result<(), RolloutError> {
        if self.ok {
            Ok(())
        } else {
            Err(RolloutError::Validation {
                diagnostics: self.diagnostics,
            })
        }
    }
}

/// Runs syntax checks for one service target
#[derive(Clone)]
pub struct Validator {
    runner: Arc<dyn ProcessRunner>,
    target: Arc<ServiceTarget>,
}

impl Validator {
    pub fn new(runner: Arc<dyn ProcessRunner>, target: Arc<ServiceTarget>) -> Self {
        Self { runner, target }
    }

    /// Checks the live configuration, or `root` when given
    pub async fn validate(&self, root: Option<&Path>) -> Validation {
        let command = self.target.validate_command(root);
        debug!("Validating configuration with '{}'", command);

        match self.runner.run(&command).await {
            Ok(output) if output.success() => Validation {
                ok: true,
                diagnostics: output.diagnostics(),
            },
            Ok(output) => {
                let diagnostics = output.diagnostics();
                warn!(
                    "Configuration check '{}' failed (exit {}): {}",
                    command, output.exit_code, diagnostics
                );
                Validation {
                    ok: false,
                    diagnostics,
                }
            }
            Err(e) => {
                warn!("Configuration check '{}' could not run: {}", command, e);
                Validation {
                    ok: false,
                    diagnostics: e.to_string(),
                }
            }
        }
    }
}
