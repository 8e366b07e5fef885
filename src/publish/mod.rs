//! Repository publishing.
//!
//! The repository tree is append-only with a fixed layout:
//!
//! ```text
//! <root>/SRPMS/
//! <root>/RPMS/noarch/
//! <root>/RPMS/<arch>/
//! ```
//!
//! Each subtree touched by a run gets its packages copied in and its
//! metadata regenerated exactly once, under an exclusive per-subtree lock.
//! A metadata failure aborts the publish and leaves the already copied files
//! in place with stale metadata; re-running the publish repairs it.

mod lock;

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::fs_util::atomic_copy_into;
use crate::paths::absolute;
use crate::process::{CommandRunner, Streams};
use crate::staging::DirGuard;

use lock::SubtreeLock;

const NOARCH_MARKER: &str = "noarch";

/// One subtree of the repository tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Partition {
    /// `SRPMS/`
    Source,
    /// `RPMS/noarch/`
    NoArch,
    /// `RPMS/<arch>/`
    Arch(String),
}

impl Partition {
    /// Route a binary package by file name. Only the noarch split is derived
    /// from the name; everything else lands in the deployment's arch.
    pub fn for_binary(package: &Path, arch: &str) -> Self {
        let noarch = package
            .file_name()
            .map(|name| name.to_string_lossy().contains(NOARCH_MARKER))
            .unwrap_or(false);
        if noarch {
            Self::NoArch
        } else {
            Self::Arch(arch.to_string())
        }
    }

    /// Path of the subtree relative to the repository root.
    pub fn relative_dir(&self) -> PathBuf {
        match self {
            Self::Source => PathBuf::from("SRPMS"),
            Self::NoArch => Path::new("RPMS").join(NOARCH_MARKER),
            Self::Arch(arch) => Path::new("RPMS").join(arch),
        }
    }

    fn lock_label(&self) -> String {
        match self {
            Self::Source => "SRPMS".to_string(),
            Self::NoArch => format!("RPMS-{NOARCH_MARKER}"),
            Self::Arch(arch) => format!("RPMS-{arch}"),
        }
    }
}

/// What a publish changed in the repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Final paths of every copied package, in copy order.
    pub published: Vec<PathBuf>,
    /// Subtrees whose metadata was regenerated, in order.
    pub regenerated: Vec<PathBuf>,
}

/// Copies packages into the repository tree and refreshes its metadata.
pub struct RepositoryPublisher<'a> {
    root: &'a Path,
    arch: &'a str,
    metadata_command: &'a [String],
    runner: &'a dyn CommandRunner,
}

impl<'a> RepositoryPublisher<'a> {
    pub fn new(
        root: &'a Path,
        arch: &'a str,
        metadata_command: &'a [String],
        runner: &'a dyn CommandRunner,
    ) -> Self {
        Self {
            root,
            arch,
            metadata_command,
            runner,
        }
    }

    /// Publish one source package and its binary packages.
    ///
    /// Subtrees are processed in first-touch order: `SRPMS` first, then the
    /// binary partitions in the order their first package appears.
    pub fn publish(
        &self,
        source_package: &Path,
        binary_packages: &[PathBuf],
    ) -> Result<PublishReport> {
        if self.metadata_command.is_empty() {
            return Err(Error::Config {
                path: self.root.to_path_buf(),
                reason: "metadata command is empty".to_string(),
            });
        }

        let root = absolute(self.root)?;
        let _root = DirGuard::enter(&root, true)?;

        let mut groups: Vec<(Partition, Vec<&Path>)> =
            vec![(Partition::Source, vec![source_package])];
        for package in binary_packages {
            let partition = Partition::for_binary(package, self.arch);
            match groups.iter_mut().find(|(p, _)| *p == partition) {
                Some((_, files)) => files.push(package.as_path()),
                None => groups.push((partition, vec![package.as_path()])),
            }
        }

        let mut report = PublishReport::default();
        for (partition, files) in &groups {
            self.publish_partition(&root, partition, files, &mut report)?;
        }
        Ok(report)
    }

    fn publish_partition(
        &self,
        root: &Path,
        partition: &Partition,
        files: &[&Path],
        report: &mut PublishReport,
    ) -> Result<()> {
        let _lock = SubtreeLock::acquire(root, &partition.lock_label())?;
        let dir = root.join(partition.relative_dir());
        let _cwd = DirGuard::enter(&dir, true)?;

        for file in files {
            let dest = atomic_copy_into(file, &dir)?;
            tracing::info!(package = %dest.display(), "published");
            report.published.push(dest);
        }

        self.runner
            .run(self.metadata_command, Some(&dir), Streams::Inherit)?;
        report.regenerated.push(dir);
        Ok(())
    }
}
