//! Per-service advisory lock
//!
//! Serializes mutating operations against one service across processes.
//! The lock is an exclusive non-blocking `flock(2)` on
//! `<lock_dir>/<service>.lock`, released when the guard drops.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, RolloutError};

/// Held advisory lock; unlocked on drop
#[derive(Debug)]
pub struct RolloutLock {
    file: File,
    path: PathBuf,
}

impl RolloutLock {
    /// Takes the lock for `service`, failing fast if another holder exists
    pub fn acquire(lock_dir: &Path, service: &str) -> Result<Self> {
        fs::create_dir_all(lock_dir)
            .map_err(RolloutError::io(format!("failed to create {}", lock_dir.display())))?;

        let path = lock_dir.join(format!("{}.lock", service));
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(RolloutError::io(format!("failed to open {}", path.display())))?;

        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock {
                return Err(RolloutError::Lock { path });
            }
            return Err(RolloutError::Io {
                context: format!("failed to lock {}", path.display()),
                source: err,
            });
        }

        debug!("Acquired rollout lock {}", path.display());
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RolloutLock {
    fn drop(&mut self) {
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
        debug!("Released rollout lock {}", self.path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_acquire_fails_while_held() {
        let tmp = TempDir::new().unwrap();

        let held = RolloutLock::acquire(tmp.path(), "apache2").unwrap();
        let err = RolloutLock::acquire(tmp.path(), "apache2").unwrap_err();

        assert!(matches!(err, RolloutError::Lock { ref path } if path == held.path()));
    }

    #[test]
    fn test_lock_released_on_drop() {
        let tmp = TempDir::new().unwrap();

        drop(RolloutLock::acquire(tmp.path(), "apache2").unwrap());

        assert!(RolloutLock::acquire(tmp.path(), "apache2").is_ok());
    }

    #[test]
    fn test_locks_are_per_service() {
        let tmp = TempDir::new().unwrap();

        let _apache = RolloutLock::acquire(tmp.path(), "apache2").unwrap();

        assert!(RolloutLock::acquire(tmp.path(), "httpd").is_ok());
    }

    #[test]
    fn test_creates_missing_lock_dir() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("run/lock/rollgate");

        let lock = RolloutLock::acquire(&dir, "httpd").unwrap();

        assert_eq!(lock.path(), dir.join("httpd.lock"));
        assert!(lock.path().exists());
    }
}
