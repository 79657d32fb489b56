//! Blue-green environment domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// One of the two parallel configuration directories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Blue,
    Green,
}

impl Environment {
    /// The opposite label
    pub fn other(self) -> Self {
        match self {
            Self::Blue => Self::Green,
            Self::Green => Self::Blue,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blue => "blue",
            Self::Green => "green",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filesystem layout of a blue-green deployment
///
/// `config_dir` is the canonical path the server reads. Once converted it is a
/// symlink to exactly one of `blue_dir` or `green_dir`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentLayout {
    pub config_dir: PathBuf,
    pub blue_dir: PathBuf,
    pub green_dir: PathBuf,
}

impl EnvironmentLayout {
    /// Layout with the conventional `<config>-blue` / `<config>-green` siblings
    ///
    /// Trailing slashes and `.` components are dropped first so the siblings
    /// never land inside the configuration directory.
    pub fn for_config_dir(config_dir: impl Into<PathBuf>) -> Self {
        let config_dir = normalized(config_dir.into());
        let blue_dir = sibling(&config_dir, "blue");
        let green_dir = sibling(&config_dir, "green");
        Self {
            config_dir,
            blue_dir,
            green_dir,
        }
    }

    /// Replaces the blue directory
    pub fn with_blue_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.blue_dir = normalized(dir.into());
        self
    }

    /// Replaces the green directory
    pub fn with_green_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.green_dir = normalized(dir.into());
        self
    }

    /// Directory holding the given environment
    pub fn dir(&self, env: Environment) -> &Path {
        match env {
            Environment::Blue => &self.blue_dir,
            Environment::Green => &self.green_dir,
        }
    }

    /// First environment directory that cannot hold a separate copy
    ///
    /// An environment inside the canonical path (or equal to the other
    /// environment) would be copied into itself.
    pub fn conflicting_dir(&self) -> Option<&Path> {
        if self.blue_dir == self.green_dir {
            return Some(&self.green_dir);
        }
        [&self.blue_dir, &self.green_dir]
            .into_iter()
            .find(|dir| dir.starts_with(&self.config_dir) || self.config_dir.starts_with(dir))
            .map(PathBuf::as_path)
    }

    /// Temporary link renamed over the canonical path during a switch
    pub fn pending_link(&self) -> PathBuf {
        let name = format!(".{}.rollgate-next", file_name(&self.config_dir));
        match self.config_dir.parent() {
            Some(parent) => parent.join(name),
            None => PathBuf::from(name),
        }
    }

    /// Sidecar name used when the legacy plain directory is first converted
    pub fn original_sidecar(&self, unix_ts: i64) -> PathBuf {
        sibling(&self.config_dir, &format!("original-{}", unix_ts))
    }

    /// Prefix shared by every sidecar created by `original_sidecar`
    pub fn original_sidecar_prefix(&self) -> String {
        format!("{}-original-", file_name(&self.config_dir))
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Drops trailing slashes and `.` components
pub(crate) fn normalized(path: PathBuf) -> PathBuf {
    path.components().collect()
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push("-");
    name.push(suffix);
    PathBuf::from(name)
}

/// How a blue-green invocation ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SwitchOutcome {
    /// The canonical path now points at the previously inactive environment
    Switched,
    /// The inactive environment failed validation; nothing was touched
    Skipped { diagnostics: String },
    /// The new environment never came up and the swap was undone
    Reverted,
}

/// Result of a blue-green invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchReport {
    /// Environment active after the call
    pub active: Environment,
    #[serde(flatten)]
    pub outcome: SwitchOutcome,
}

impl SwitchReport {
    pub fn switched(&self) -> bool {
        matches!(self.outcome, SwitchOutcome::Switched)
    }
}
