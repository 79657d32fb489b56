//! Process execution
//!
//! All shell-outs (syntax checks, reloads, service control, worker
//! enumeration, archiving) go through the `ProcessRunner` trait so that the
//! controller can be exercised against a scripted runner in tests.

use async_trait::async_trait;
use rollgate_core::domain::CommandLine;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::error::ProcessError;

/// Captured result of a finished command
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    /// Output of a command that exited 0
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Output of a command that exited with `exit_code`
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stderr, or stdout when stderr is empty, trimmed
    pub fn diagnostics(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Executes external commands synchronously from the caller's point of view
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Runs `command` to completion and captures its output
    ///
    /// A nonzero exit is not an error; only failing to run the command is.
    async fn run(&self, command: &CommandLine) -> Result<ProcessOutput, ProcessError>;
}

/// Runs commands on the local host with a hard deadline
#[derive(Debug, Clone)]
pub struct SystemProcessRunner {
    timeout: Duration,
}

impl SystemProcessRunner {
    /// Creates a runner that kills any command running longer than `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for SystemProcessRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

#[async_trait]
impl ProcessRunner for SystemProcessRunner {
    async fn run(&self, command: &CommandLine) -> Result<ProcessOutput, ProcessError> {
        debug!("Executing: {}", command);

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &command.env {
            cmd.env(key, value);
        }

        let child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            program: command.program.clone(),
            source,
        })?;

        // Dropping the wait future on timeout kills the child via kill_on_drop
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ProcessError::TimedOut {
                program: command.program.clone(),
                timeout: self.timeout,
            })?
            .map_err(|source| ProcessError::Spawn {
                program: command.program.clone(),
                source,
            })?;

        let result = ProcessOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !result.success() {
            debug!(
                "Command '{}' exited {}: stderr='{}'",
                command,
                result.exit_code,
                result.stderr.trim()
            );
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_exit_code_and_output() {
        let runner = SystemProcessRunner::default();
        let cmd = CommandLine::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]);

        let output = runner.run(&cmd).await.unwrap();

        assert_eq!(output.exit_code, 3);
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert!(!output.success());
    }

    #[tokio::test]
    async fn test_applies_env_overrides() {
        let runner = SystemProcessRunner::default();
        let cmd = CommandLine::new("sh")
            .args(["-c", "printf %s \"$APACHE_CONFDIR\""])
            .env("APACHE_CONFDIR", "/etc/apache2-green");

        let output = runner.run(&cmd).await.unwrap();

        assert!(output.success());
        assert_eq!(output.stdout, "/etc/apache2-green");
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let runner = SystemProcessRunner::default();
        let cmd = CommandLine::new("/nonexistent/rollgate-test-binary");

        let err = runner.run(&cmd).await.unwrap_err();

        assert!(matches!(err, ProcessError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_times_out_long_running_command() {
        let runner = SystemProcessRunner::new(Duration::from_millis(100));
        let cmd = CommandLine::new("sleep").arg("5");

        let err = runner.run(&cmd).await.unwrap_err();

        assert!(matches!(err, ProcessError::TimedOut { .. }));
    }

    #[test]
    fn test_diagnostics_prefers_stderr() {
        let output = ProcessOutput {
            exit_code: 1,
            stdout: "stdout text".to_string(),
            stderr: "  AH00526: Syntax error  \n".to_string(),
        };
        assert_eq!(output.diagnostics(), "AH00526: Syntax error");

        let output = ProcessOutput::failed(1, "");
        assert_eq!(output.diagnostics(), "");

        let output = ProcessOutput {
            exit_code: 1,
            stdout: "only stdout\n".to_string(),
            stderr: String::new(),
        };
        assert_eq!(output.diagnostics(), "only stdout");
    }
}
