//! Filesystem helpers
//!
//! Recursive copies that preserve symlinks, plus the small predicates the
//! rollout flows need. All errors carry the path that failed.

use std::fs;
use std::path::Path;

use crate::error::{Result, RolloutError};

/// Copies everything under `src` into `dst`, creating `dst` if needed
///
/// Symlinks are recreated as symlinks rather than followed, so module
/// links such as `mods-enabled/*.load` survive the copy intact.
pub fn copy_dir_contents(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)
        .map_err(RolloutError::io(format!("failed to create {}", dst.display())))?;

    let entries = fs::read_dir(src)
        .map_err(RolloutError::io(format!("failed to read {}", src.display())))?;

    for entry in entries {
        let entry =
            entry.map_err(RolloutError::io(format!("failed to read entry in {}", src.display())))?;
        let file_type = entry
            .file_type()
            .map_err(RolloutError::io(format!("failed to stat {}", entry.path().display())))?;
        let target = dst.join(entry.file_name());

        if file_type.is_symlink() {
            let link = fs::read_link(entry.path()).map_err(RolloutError::io(format!(
                "failed to read link {}",
                entry.path().display()
            )))?;
            replace_symlink(&link, &target)?;
        } else if file_type.is_dir() {
            copy_dir_contents(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target).map_err(RolloutError::io(format!(
                "failed to copy {} to {}",
                entry.path().display(),
                target.display()
            )))?;
        }
    }
    Ok(())
}

/// True if `dir` is missing or has no entries
pub fn is_empty_dir(dir: &Path) -> bool {
    match fs::read_dir(dir) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}

/// Copies a single file, creating the destination's parent directory
pub fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .map_err(RolloutError::io(format!("failed to create {}", parent.display())))?;
    }
    fs::copy(src, dst).map_err(RolloutError::io(format!(
        "failed to copy {} to {}",
        src.display(),
        dst.display()
    )))?;
    Ok(())
}

/// Points `link` at `target`, replacing any existing link at that path
pub fn replace_symlink(target: &Path, link: &Path) -> Result<()> {
    if fs::symlink_metadata(link).is_ok_and(|m| m.file_type().is_symlink()) {
        fs::remove_file(link)
            .map_err(RolloutError::io(format!("failed to remove link {}", link.display())))?;
    }
    std::os::unix::fs::symlink(target, link).map_err(RolloutError::io(format!(
        "failed to link {} to {}",
        link.display(),
        target.display()
    )))
}

/// True if `path` itself is a symlink (not followed)
pub fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink())
}

/// Removes a directory tree, or the link if `path` is a symlink
pub fn remove_path(path: &Path) -> Result<()> {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => Err(e),
    };
    result.map_err(RolloutError::io(format!("failed to remove {}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_preserves_nested_files_and_symlinks() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("mods-available")).unwrap();
        fs::create_dir_all(src.join("mods-enabled")).unwrap();
        fs::write(src.join("apache2.conf"), "ServerName localhost\n").unwrap();
        fs::write(src.join("mods-available/ssl.load"), "LoadModule ssl_module\n").unwrap();
        std::os::unix::fs::symlink("../mods-available/ssl.load", src.join("mods-enabled/ssl.load"))
            .unwrap();

        let dst = tmp.path().join("dst");
        copy_dir_contents(&src, &dst).unwrap();

        assert_eq!(
            fs::read_to_string(dst.join("apache2.conf")).unwrap(),
            "ServerName localhost\n"
        );
        let link = dst.join("mods-enabled/ssl.load");
        assert!(is_symlink(&link));
        assert_eq!(
            fs::read_link(&link).unwrap(),
            Path::new("../mods-available/ssl.load")
        );
        assert_eq!(fs::read_to_string(&link).unwrap(), "LoadModule ssl_module\n");
    }

    #[test]
    fn test_is_empty_dir() {
        let tmp = TempDir::new().unwrap();

        assert!(is_empty_dir(tmp.path()));
        assert!(is_empty_dir(&tmp.path().join("missing")));

        fs::write(tmp.path().join("a"), "").unwrap();
        assert!(!is_empty_dir(tmp.path()));
    }

    #[test]
    fn test_copy_file_creates_parent() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("httpd.conf");
        fs::write(&src, "Listen 80\n").unwrap();

        let dst = tmp.path().join("backups/nested/httpd.conf.bak");
        copy_file(&src, &dst).unwrap();

        assert_eq!(fs::read_to_string(dst).unwrap(), "Listen 80\n");
    }

    #[test]
    fn test_replace_symlink_repoints_existing_link() {
        let tmp = TempDir::new().unwrap();
        let blue = tmp.path().join("blue");
        let green = tmp.path().join("green");
        fs::create_dir_all(&blue).unwrap();
        fs::create_dir_all(&green).unwrap();
        let link = tmp.path().join("conf");

        replace_symlink(&blue, &link).unwrap();
        replace_symlink(&green, &link).unwrap();

        assert_eq!(fs::read_link(&link).unwrap(), green);
    }

    #[test]
    fn test_remove_path_handles_missing_and_links() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("dir");
        fs::create_dir_all(dir.join("sub")).unwrap();
        let link = tmp.path().join("link");
        std::os::unix::fs::symlink(&dir, &link).unwrap();

        remove_path(&link).unwrap();
        assert!(dir.exists());
        assert!(!link.exists());

        remove_path(&dir).unwrap();
        assert!(!dir.exists());

        remove_path(&tmp.path().join("missing")).unwrap();
    }
}
