use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub(crate) fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Anchor `path` at the current directory once, so later directory changes
/// cannot move it.
pub(crate) fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path)
        .map_err(|err| Error::io(format!("resolving '{}'", path.display()), err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_join_base() {
        assert_eq!(
            resolve_against(Path::new("/work/foo"), Path::new("patches/a.patch")),
            PathBuf::from("/work/foo/patches/a.patch")
        );
    }

    #[test]
    fn absolute_paths_are_kept() {
        assert_eq!(
            resolve_against(Path::new("/work"), Path::new("/srv/repo")),
            PathBuf::from("/srv/repo")
        );
    }

    #[test]
    fn absolute_leaves_no_relative_path() {
        assert!(absolute(Path::new("conf/repo")).unwrap().is_absolute());
        assert_eq!(absolute(Path::new("/srv/repo")).unwrap(), Path::new("/srv/repo"));
    }
}
