//! Service target domain type

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::command::CommandLine;
use super::platform::AltRootStyle;

/// The managed server process and every command used to drive it
///
/// Created once from the platform profile and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTarget {
    /// Logical service name as known to the init system
    pub name: String,
    /// Syntax check against the live configuration
    pub validate: CommandLine,
    pub alt_root: AltRootStyle,
    /// Graceful reload
    pub reload: CommandLine,
    pub start: CommandLine,
    pub stop: CommandLine,
    /// Liveness queries, tried in order until one exits 0
    pub status: Vec<CommandLine>,
    /// Worker enumeration, one PID per stdout line
    pub list_workers: CommandLine,
    /// Server version query
    pub version: CommandLine,
    pub process_pattern: String,
}

impl ServiceTarget {
    /// Syntax check command, optionally pointed at an alternate configuration root
    pub fn validate_command(&self, root: Option<&Path>) -> CommandLine {
        let Some(root) = root else {
            return self.validate.clone();
        };

        let root = root.display().to_string();
        match &self.alt_root {
            AltRootStyle::EnvVar(var) => self.validate.clone().env(var.as_str(), root),
            AltRootStyle::ServerRootDirective => self
                .validate
                .clone()
                .arg("-c")
                .arg(format!("ServerRoot {}", root)),
        }
    }
}
