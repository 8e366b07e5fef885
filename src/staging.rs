//! Scoped working directories and ephemeral staging areas.
//!
//! Both are RAII guards: dropping a [`DirGuard`] restores the previous
//! working directory, dropping a [`StagingArea`] removes its directory tree
//! unless it was created with `preserve`. The closure helpers
//! [`with_directory`] and [`with_staging_area`] wrap the guards for callers
//! that prefer a lexical scope.
//!
//! The working directory is process-wide state. Nothing here is safe to use
//! from two threads at once; a process runs one pipeline at a time.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{Error, Result};
use crate::trace;

/// Changes into a directory and changes back on drop.
#[derive(Debug)]
pub struct DirGuard {
    previous: PathBuf,
    current: PathBuf,
}

impl DirGuard {
    /// Enter `path`, creating it first when `create_if_missing` is set.
    pub fn enter(path: &Path, create_if_missing: bool) -> Result<Self> {
        let previous = std::env::current_dir().map_err(|source| Error::Staging {
            path: PathBuf::from("."),
            source,
        })?;
        if create_if_missing && !path.is_dir() {
            fs::create_dir_all(path).map_err(|source| Error::Staging {
                path: path.to_path_buf(),
                source,
            })?;
        }
        std::env::set_current_dir(path).map_err(|source| Error::Staging {
            path: path.to_path_buf(),
            source,
        })?;
        let current = std::env::current_dir().unwrap_or_else(|_| path.to_path_buf());
        trace::change_dir(&current);
        Ok(Self { previous, current })
    }

    /// Directory this guard entered.
    pub fn path(&self) -> &Path {
        &self.current
    }
}

impl Drop for DirGuard {
    fn drop(&mut self) {
        if let Err(err) = std::env::set_current_dir(&self.previous) {
            tracing::warn!(
                dir = %self.previous.display(),
                error = %err,
                "failed to restore working directory"
            );
            return;
        }
        trace::change_dir(&self.previous);
    }
}

/// Run `f` inside `path`, restoring the working directory on every exit path.
pub fn with_directory<T>(
    path: &Path,
    create_if_missing: bool,
    f: impl FnOnce(&Path) -> Result<T>,
) -> Result<T> {
    let guard = DirGuard::enter(path, create_if_missing)?;
    f(guard.path())
}

/// A uniquely named temporary directory owned by one pipeline scope.
#[derive(Debug)]
pub struct StagingArea {
    dir: Option<TempDir>,
    path: PathBuf,
    preserve: bool,
}

impl StagingArea {
    /// Allocate a staging area under the system temporary directory.
    pub fn new(prefix: &str, preserve: bool) -> Result<Self> {
        Self::new_in(&std::env::temp_dir(), prefix, preserve)
    }

    /// Allocate a staging area under `root`.
    pub fn new_in(root: &Path, prefix: &str, preserve: bool) -> Result<Self> {
        fs::create_dir_all(root).map_err(|source| Error::Staging {
            path: root.to_path_buf(),
            source,
        })?;
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir_in(root)
            .map_err(|source| Error::Staging {
                path: root.join(prefix),
                source,
            })?;
        let path = dir.path().to_path_buf();
        tracing::debug!(path = %path.display(), preserve, "allocated staging area");
        Ok(Self {
            dir: Some(dir),
            path,
            preserve,
        })
    }

    /// Absolute path of the staging directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the directory survives the end of its scope.
    pub fn is_preserved(&self) -> bool {
        self.preserve
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        if self.preserve {
            let kept = dir.keep();
            tracing::info!(path = %kept.display(), "preserving staging area");
            return;
        }
        // Removal failures are logged, never returned.
        if let Err(err) = dir.close() {
            tracing::warn!(
                path = %self.path.display(),
                error = %err,
                "failed to remove staging area"
            );
        }
    }
}

/// Run `f` with a fresh staging area that is removed afterwards unless
/// `preserve` is set.
pub fn with_staging_area<T>(
    prefix: &str,
    preserve: bool,
    f: impl FnOnce(&Path) -> Result<T>,
) -> Result<T> {
    let area = StagingArea::new(prefix, preserve)?;
    f(area.path())
}
