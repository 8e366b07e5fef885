use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{Error, Result};

const LOCKS_DIR: &str = ".lakehead-locks";

/// RAII guard: holds an exclusive lock on one repository subtree.
///
/// Independent runs publishing into the same subtree queue here, so their
/// copies and metadata regenerations never interleave.
#[derive(Debug)]
pub(crate) struct SubtreeLock {
    file: File,
    path: PathBuf,
}

impl SubtreeLock {
    /// Block until the lock named `label` under `repo_root` is ours.
    pub(crate) fn acquire(repo_root: &Path, label: &str) -> Result<Self> {
        let dir = repo_root.join(LOCKS_DIR);
        fs::create_dir_all(&dir).map_err(|source| Error::Publish {
            path: dir.clone(),
            source,
        })?;
        let path = dir.join(format!("{label}.lock"));

        // Lock files are never unlinked. Removing a file another process
        // still holds would let a third process lock a fresh inode at the
        // same path.
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| Error::Publish {
                path: path.clone(),
                source,
            })?;

        if file.try_lock_exclusive().is_err() {
            tracing::info!(lock = %path.display(), "waiting for another publisher");
            file.lock_exclusive().map_err(|source| Error::Publish {
                path: path.clone(),
                source,
            })?;
        }
        Ok(Self { file, path })
    }
}

impl Drop for SubtreeLock {
    fn drop(&mut self) {
        if let Err(err) = self.file.unlock() {
            tracing::warn!(lock = %self.path.display(), error = %err, "failed to release lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lock_is_exclusive_while_held() {
        let temp = TempDir::new().unwrap();
        let held = SubtreeLock::acquire(temp.path(), "SRPMS").unwrap();

        let other = File::open(&held.path).unwrap();
        assert!(other.try_lock_exclusive().is_err());
        drop(held);
        assert!(other.try_lock_exclusive().is_ok());
    }

    #[test]
    fn lock_files_persist_after_release() {
        let temp = TempDir::new().unwrap();
        drop(SubtreeLock::acquire(temp.path(), "RPMS-noarch").unwrap());
        assert!(temp.path().join(LOCKS_DIR).join("RPMS-noarch.lock").is_file());
    }
}
