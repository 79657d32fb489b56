//! Configuration backup domain types

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix of every archive and metadata file
pub const BACKUP_PREFIX: &str = "apache-config";

/// Timestamp format embedded in backup file names
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Sidecar metadata written next to each archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupMetadata {
    pub timestamp: String,
    pub hostname: String,
    pub platform: String,
    pub platform_version: String,
    pub server_version: String,
    pub config_dir: PathBuf,
}

impl BackupMetadata {
    /// Checks that the backup was taken on a compatible host
    ///
    /// Platform names must match exactly, versions only on their leading
    /// integer (`22.04` and `22.10` are compatible, `20.04` is not).
    pub fn is_compatible_with(&self, platform: &str, platform_version: &str) -> bool {
        self.platform == platform
            && leading_integer(&self.platform_version) == leading_integer(platform_version)
    }
}

/// Leading decimal digits of a version string, 0 if there are none
fn leading_integer(version: &str) -> u64 {
    let digits: String = version
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

/// Archive and metadata paths of one backup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupArtifact {
    pub archive: PathBuf,
    pub metadata: PathBuf,
}

impl BackupArtifact {
    /// `<dir>/apache-config-<timestamp>[-<label>].tar.gz` plus its `.json` sibling
    pub fn in_dir(dir: &Path, timestamp: &str, label: Option<&str>) -> Self {
        let stem = match label {
            Some(label) if !label.is_empty() => {
                format!("{}-{}-{}", BACKUP_PREFIX, timestamp, label)
            }
            _ => format!("{}-{}", BACKUP_PREFIX, timestamp),
        };

        Self {
            archive: dir.join(format!("{}.tar.gz", stem)),
            metadata: dir.join(format!("{}.json", stem)),
        }
    }

    /// Metadata path belonging to an existing archive
    pub fn metadata_for(archive: &Path) -> PathBuf {
        let name = archive
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let stem = name.strip_suffix(".tar.gz").unwrap_or(&name);
        archive.with_file_name(format!("{}.json", stem))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(platform: &str, version: &str) -> BackupMetadata {
        BackupMetadata {
            timestamp: "20250101-120000".to_string(),
            hostname: "web-01".to_string(),
            platform: platform.to_string(),
            platform_version: version.to_string(),
            server_version: "2.4.57".to_string(),
            config_dir: PathBuf::from("/etc/apache2"),
        }
    }

    #[test]
    fn test_artifact_paths_with_label() {
        let artifact = BackupArtifact::in_dir(
            Path::new("/var/backups/httpd"),
            "20250101-120000",
            Some("before-green-switch"),
        );

        assert_eq!(
            artifact.archive,
            PathBuf::from("/var/backups/httpd/apache-config-20250101-120000-before-green-switch.tar.gz")
        );
        assert_eq!(
            artifact.metadata,
            PathBuf::from("/var/backups/httpd/apache-config-20250101-120000-before-green-switch.json")
        );
    }

    #[test]
    fn test_artifact_paths_without_label() {
        let artifact = BackupArtifact::in_dir(Path::new("/b"), "20250101-120000", None);

        assert_eq!(artifact.archive, PathBuf::from("/b/apache-config-20250101-120000.tar.gz"));
    }

    #[test]
    fn test_metadata_for_archive() {
        assert_eq!(
            BackupArtifact::metadata_for(Path::new("/b/apache-config-20250101-120000.tar.gz")),
            PathBuf::from("/b/apache-config-20250101-120000.json")
        );
    }

    #[test]
    fn test_compatibility_uses_major_version() {
        let meta = metadata("ubuntu", "22.04");

        assert!(meta.is_compatible_with("ubuntu", "22.10"));
        assert!(!meta.is_compatible_with("ubuntu", "20.04"));
        assert!(!meta.is_compatible_with("debian", "22.04"));
    }

    #[test]
    fn test_metadata_json_field_names() {
        let json = serde_json::to_value(metadata("rocky", "9.3")).unwrap();

        for field in [
            "timestamp",
            "hostname",
            "platform",
            "platform_version",
            "server_version",
            "config_dir",
        ] {
            assert!(json.get(field).is_some(), "missing {}", field);
        }
    }
}
