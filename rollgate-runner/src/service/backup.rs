//! Configuration backup and restore
//!
//! Archives the configuration directory with `tar` and records where and on
//! what it was taken in a JSON sidecar. Restores refuse archives from an
//! incompatible platform unless forced, and fall back to a pre-restore
//! snapshot when the restored configuration does not validate.

use chrono::Local;
use rollgate_core::domain::{
    BACKUP_TIMESTAMP_FORMAT, BackupArtifact, BackupMetadata, CommandLine,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::{Result, RolloutError};
use crate::fsops;
use crate::host::{HostFacts, parse_server_version};
use crate::process::ProcessRunner;
use crate::service::control::ServiceManager;
use crate::service::validator::Validator;

/// Creates and restores configuration archives
#[derive(Clone)]
pub struct BackupService {
    runner: Arc<dyn ProcessRunner>,
    services: ServiceManager,
    validator: Validator,
    host: HostFacts,
    backup_dir: PathBuf,
    config_dir: PathBuf,
}

impl BackupService {
    /// # Arguments
    ///
    /// * `backup_dir` - where archives and their metadata are written
    /// * `config_dir` - configuration directory archived by `backup`
    pub fn new(
        services: ServiceManager,
        validator: Validator,
        host: HostFacts,
        backup_dir: impl Into<PathBuf>,
        config_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner: services.runner().clone(),
            services,
            validator,
            host,
            backup_dir: backup_dir.into(),
            config_dir: config_dir.into(),
        }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Archives the configured configuration directory
    pub async fn backup(&self, label: Option<&str>) -> Result<BackupArtifact> {
        self.backup_of(&self.config_dir, label).await
    }

    /// Archives `config_dir` into the backup directory
    ///
    /// When `config_dir` is a symlink the directory it points to is copied
    /// aside and archived under the link's name.
    pub async fn backup_of(&self, config_dir: &Path, label: Option<&str>) -> Result<BackupArtifact> {
        fs::create_dir_all(&self.backup_dir).map_err(RolloutError::io(format!(
            "failed to create backup directory {}",
            self.backup_dir.display()
        )))?;

        let timestamp = Local::now().format(BACKUP_TIMESTAMP_FORMAT).to_string();
        let artifact = BackupArtifact::in_dir(&self.backup_dir, &timestamp, label);

        let (parent, name) = split_dir(config_dir)?;
        // tar stores a symlinked directory as the link itself
        let snapshot = if fsops::is_symlink(config_dir) {
            let dir = tempfile::Builder::new()
                .prefix("rollgate-backup")
                .tempdir()
                .map_err(RolloutError::io("failed to create temporary directory"))?;
            fsops::copy_dir_contents(config_dir, &dir.path().join(&name))?;
            Some(dir)
        } else {
            None
        };
        let source = snapshot
            .as_ref()
            .map(|dir| dir.path().to_path_buf())
            .unwrap_or(parent);
        let tar = CommandLine::new("tar")
            .arg("-czf")
            .arg(artifact.archive.display().to_string())
            .arg("-C")
            .arg(source.display().to_string())
            .arg(name);

        let output = self.runner.run(&tar).await?;
        drop(snapshot);
        if !output.success() {
            error!("Failed to create backup archive: {}", output.diagnostics());
            return Err(RolloutError::Archive(format!(
                "'{}' exited {}: {}",
                tar,
                output.exit_code,
                output.diagnostics()
            )));
        }

        let metadata = BackupMetadata {
            timestamp,
            hostname: self.host.hostname.clone(),
            platform: self.host.platform.clone(),
            platform_version: self.host.platform_version.clone(),
            server_version: self.server_version().await,
            config_dir: config_dir.to_path_buf(),
        };
        let json = serde_json::to_string_pretty(&metadata)
            .map_err(|e| RolloutError::Archive(format!("failed to encode metadata: {}", e)))?;
        fs::write(&artifact.metadata, json).map_err(RolloutError::io(format!(
            "failed to write {}",
            artifact.metadata.display()
        )))?;

        info!("Configuration backed up to {}", artifact.archive.display());
        Ok(artifact)
    }

    /// Restores the configuration directory from `archive`
    ///
    /// The service is stopped for the swap and started again whether or not
    /// the restored configuration validates.
    pub async fn restore(&self, archive: &Path, force: bool) -> Result<()> {
        if !archive.exists() {
            error!("Backup file not found: {}", archive.display());
            return Err(RolloutError::NotFound(archive.to_path_buf()));
        }

        if !force {
            self.check_platform(archive)?;
        }

        let staging = self.extract(archive).await?;

        self.services.stop().await?;
        let pre_restore = match self.backup(Some("pre-restore")).await {
            Ok(artifact) => Some(artifact),
            Err(e) => {
                warn!("Failed to snapshot configuration before restore: {}", e);
                None
            }
        };

        self.replace_config(&staging)?;
        drop(staging);

        let validation = self.validator.validate(None).await;
        if !validation.ok {
            error!("Restored configuration has syntax errors: {}", validation.diagnostics);
            if let Some(previous) = pre_restore {
                info!("Rolling back to previous configuration");
                match self.extract(&previous.archive).await {
                    Ok(staging) => self.replace_config(&staging)?,
                    Err(e) => error!("Failed to roll back restore: {}", e),
                }
            }
            self.services.start().await?;
            return validation.into_result();
        }

        self.services.start().await?;
        info!("Configuration restored from {}", archive.display());
        Ok(())
    }

    /// Refuses archives whose metadata names an incompatible platform
    fn check_platform(&self, archive: &Path) -> Result<()> {
        let metadata_path = BackupArtifact::metadata_for(archive);
        if !metadata_path.exists() {
            return Ok(());
        }

        let content = fs::read_to_string(&metadata_path).map_err(RolloutError::io(format!(
            "failed to read {}",
            metadata_path.display()
        )))?;
        let metadata: BackupMetadata = serde_json::from_str(&content).map_err(|e| {
            RolloutError::Archive(format!("invalid metadata {}: {}", metadata_path.display(), e))
        })?;

        if metadata.is_compatible_with(&self.host.platform, &self.host.platform_version) {
            return Ok(());
        }

        warn!(
            "Platform mismatch: backup from {} {}, current platform is {} {}",
            metadata.platform,
            metadata.platform_version,
            self.host.platform,
            self.host.platform_version
        );
        Err(RolloutError::PlatformMismatch {
            backup_platform: metadata.platform,
            backup_version: metadata.platform_version,
            host_platform: self.host.platform.clone(),
            host_version: self.host.platform_version.clone(),
        })
    }

    /// Extracts `archive` into a fresh temporary directory
    async fn extract(&self, archive: &Path) -> Result<Staging> {
        let dir = tempfile::Builder::new()
            .prefix("rollgate-restore")
            .tempdir()
            .map_err(RolloutError::io("failed to create temporary directory"))?;

        let tar = CommandLine::new("tar")
            .arg("-xzf")
            .arg(archive.display().to_string())
            .arg("-C")
            .arg(dir.path().display().to_string());
        let output = self.runner.run(&tar).await?;
        if !output.success() {
            return Err(RolloutError::Archive(format!(
                "failed to extract {}: {}",
                archive.display(),
                output.diagnostics()
            )));
        }

        let (_, name) = split_dir(&self.config_dir)?;
        let extracted = dir.path().join(name);
        let is_dir = fs::symlink_metadata(&extracted).is_ok_and(|m| m.file_type().is_dir());
        if !is_dir {
            return Err(RolloutError::Archive(format!(
                "expected configuration directory not found in backup: {}",
                extracted.display()
            )));
        }

        Ok(Staging { _dir: dir, extracted })
    }

    /// Replaces the live configuration with a staged copy
    ///
    /// A symlinked configuration directory keeps its link; the directory it
    /// points to is rewritten instead.
    fn replace_config(&self, staging: &Staging) -> Result<()> {
        let destination = if fsops::is_symlink(&self.config_dir) {
            fs::canonicalize(&self.config_dir).map_err(RolloutError::io(format!(
                "failed to resolve {}",
                self.config_dir.display()
            )))?
        } else {
            self.config_dir.clone()
        };

        fsops::remove_path(&destination)?;
        fsops::copy_dir_contents(&staging.extracted, &destination)
    }

    async fn server_version(&self) -> String {
        match self.runner.run(&self.services.target().version).await {
            Ok(output) if output.success() => parse_server_version(&output.stdout),
            Ok(output) => {
                warn!("Error determining server version: {}", output.diagnostics());
                "unknown".to_string()
            }
            Err(e) => {
                warn!("Error determining server version: {}", e);
                "unknown".to_string()
            }
        }
    }
}

/// Extracted archive, removed from disk on drop
struct Staging {
    _dir: tempfile::TempDir,
    extracted: PathBuf,
}

fn split_dir(dir: &Path) -> Result<(PathBuf, String)> {
    let parent = dir
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/"));
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| RolloutError::Archive(format!("{} has no directory name", dir.display())))?;
    Ok((parent, name))
}
