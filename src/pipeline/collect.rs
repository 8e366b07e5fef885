use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};

const SOURCE_PACKAGE_SUFFIX: &str = ".src.rpm";
const PACKAGE_SUFFIX: &str = ".rpm";

/// Packages found in a result directory after a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSet {
    /// The single source package.
    pub source_package: PathBuf,
    /// Every other package, sorted by file name.
    pub binary_packages: Vec<PathBuf>,
}

/// Classify the packages at the top level of `result_dir`.
///
/// Build logs and other non-package files are ignored. Exactly one source
/// package and at least one binary package must be present.
pub fn collect_artifacts(result_dir: &Path) -> Result<ArtifactSet> {
    let invalid = |reason: String| Error::Artifacts {
        dir: result_dir.to_path_buf(),
        reason,
    };

    let mut sources = Vec::new();
    let mut binaries = Vec::new();
    for entry in WalkDir::new(result_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|err| invalid(err.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if name.ends_with(SOURCE_PACKAGE_SUFFIX) {
            sources.push(entry.into_path());
        } else if name.ends_with(PACKAGE_SUFFIX) {
            binaries.push(entry.into_path());
        }
    }

    let source_package = match sources.len() {
        1 => sources.remove(0),
        0 => return Err(invalid("no source package produced".to_string())),
        n => return Err(invalid(format!("{n} source packages produced, expected one"))),
    };
    if binaries.is_empty() {
        return Err(invalid("no binary packages produced".to_string()));
    }

    Ok(ArtifactSet {
        source_package,
        binary_packages: binaries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), name).unwrap();
    }

    #[test]
    fn source_package_is_excluded_from_binaries() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "foo-1.0-1.el7.src.rpm");
        touch(temp.path(), "foo-1.0-1.el7.x86_64.rpm");
        touch(temp.path(), "foo-1.0-1.el7.noarch.rpm");
        touch(temp.path(), "build.log");
        touch(temp.path(), "root.log");

        let set = collect_artifacts(temp.path()).unwrap();
        assert_eq!(set.source_package, temp.path().join("foo-1.0-1.el7.src.rpm"));
        assert_eq!(
            set.binary_packages,
            vec![
                temp.path().join("foo-1.0-1.el7.noarch.rpm"),
                temp.path().join("foo-1.0-1.el7.x86_64.rpm"),
            ]
        );
    }

    #[test]
    fn missing_source_package_is_an_error() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "foo-1.0-1.el7.x86_64.rpm");
        assert!(matches!(
            collect_artifacts(temp.path()),
            Err(Error::Artifacts { .. })
        ));
    }

    #[test]
    fn two_source_packages_are_an_error() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "foo-1.0-1.el7.src.rpm");
        touch(temp.path(), "foo-1.0-2.el7.src.rpm");
        touch(temp.path(), "foo-1.0-1.el7.x86_64.rpm");
        let err = collect_artifacts(temp.path()).unwrap_err();
        assert!(err.to_string().contains("2 source packages"), "{err}");
    }

    #[test]
    fn missing_binary_packages_is_an_error() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "foo-1.0-1.el7.src.rpm");
        assert!(collect_artifacts(temp.path()).is_err());
    }

    #[test]
    fn nested_directories_are_ignored() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "foo-1.0-1.el7.src.rpm");
        touch(temp.path(), "foo-1.0-1.el7.x86_64.rpm");
        fs::create_dir_all(temp.path().join("old")).unwrap();
        touch(&temp.path().join("old"), "foo-0.9-1.el7.x86_64.rpm");

        let set = collect_artifacts(temp.path()).unwrap();
        assert_eq!(set.binary_packages.len(), 1);
    }
}
