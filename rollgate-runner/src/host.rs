//! Host facts
//!
//! Detects the distribution, init system and hardware of the machine the
//! controller runs on. Detection never fails: unreadable sources fall back
//! to empty values, and the sizing heuristics apply their own defaults.

use regex::Regex;
use rollgate_core::domain::{InitSystem, PlatformFamily, PlatformProfile};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

const OS_RELEASE: &str = "/etc/os-release";
const MEMINFO: &str = "/proc/meminfo";

static SERVER_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)version:\s*Apache/(\d+\.\d+\.\d+)").expect("server version pattern is valid")
});

/// Identification fields from `/etc/os-release`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsRelease {
    pub id: String,
    pub id_like: String,
    pub version_id: String,
}

impl OsRelease {
    /// Parses `KEY=value` lines, stripping optional quotes
    pub fn parse(content: &str) -> Self {
        let mut release = Self::default();
        for line in content.lines() {
            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"').trim_matches('\'').to_string();
            match key {
                "ID" => release.id = value,
                "ID_LIKE" => release.id_like = value,
                "VERSION_ID" => release.version_id = value,
                _ => {}
            }
        }
        release
    }

    pub fn family(&self) -> PlatformFamily {
        PlatformFamily::from_os_release(&self.id, &self.id_like)
    }
}

/// Facts about the local machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostFacts {
    pub hostname: String,
    /// Distribution id, e.g. `ubuntu` or `rocky`
    pub platform: String,
    pub platform_version: String,
    pub family: PlatformFamily,
    pub init: InitSystem,
    /// Total memory; `None` if it could not be read
    pub memory_mb: Option<u64>,
    pub cpu_cores: Option<u32>,
}

impl HostFacts {
    /// Detects facts from the running system
    pub fn detect() -> Self {
        let release = fs::read_to_string(OS_RELEASE)
            .map(|content| OsRelease::parse(&content))
            .unwrap_or_default();

        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        let memory_mb = fs::read_to_string(MEMINFO)
            .ok()
            .and_then(|content| parse_meminfo_mb(&content));

        let cpu_cores = std::thread::available_parallelism()
            .ok()
            .map(|n| n.get() as u32);

        let facts = Self {
            hostname,
            platform: if release.id.is_empty() {
                "unknown".to_string()
            } else {
                release.id.clone()
            },
            platform_version: release.version_id.clone(),
            family: release.family(),
            init: detect_init(Path::new("/")),
            memory_mb,
            cpu_cores,
        };
        debug!("Detected host facts: {:?}", facts);
        facts
    }

    /// Platform profile matching this host
    pub fn profile(&self) -> PlatformProfile {
        PlatformProfile::for_family(self.family, self.init)
    }
}

/// Systemd if either of its runtime markers exists under `root`
pub fn detect_init(root: &Path) -> InitSystem {
    let markers = ["run/systemd/system", "sys/fs/cgroup/systemd"];
    if markers.iter().any(|m| root.join(m).exists()) {
        InitSystem::Systemd
    } else {
        InitSystem::SysV
    }
}

/// Total memory in MB from `/proc/meminfo` content
pub fn parse_meminfo_mb(content: &str) -> Option<u64> {
    content.lines().find_map(|line| {
        let rest = line.strip_prefix("MemTotal:")?;
        let kb: u64 = rest.split_whitespace().next()?.parse().ok()?;
        Some(kb / 1024)
    })
}

/// Extracts `x.y.z` from `<server> -v` output, or `unknown`
pub fn parse_server_version(output: &str) -> String {
    SERVER_VERSION
        .captures(output)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
