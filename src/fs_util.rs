use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Copy `src` into `dest_dir` under its own file name without ever exposing a
/// partially written file at the final path.
pub(crate) fn atomic_copy_into(src: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let name = src.file_name().ok_or_else(|| {
        Error::io(
            format!("'{}' has no file name", src.display()),
            std::io::Error::from(std::io::ErrorKind::InvalidInput),
        )
    })?;
    let dest = dest_dir.join(name);
    let tmp = dest_dir.join(format!(
        ".{}.tmp-{}",
        name.to_string_lossy(),
        std::process::id()
    ));
    fs::copy(src, &tmp).map_err(|source| Error::Publish {
        path: tmp.clone(),
        source,
    })?;
    if let Err(source) = fs::rename(&tmp, &dest) {
        let _ = fs::remove_file(&tmp);
        return Err(Error::Publish { path: dest, source });
    }
    Ok(dest)
}

/// Serialize `value` as pretty JSON and move it into place atomically.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        Error::io(
            format!("path without parent '{}'", path.display()),
            std::io::Error::from(std::io::ErrorKind::InvalidInput),
        )
    })?;
    fs::create_dir_all(parent)
        .map_err(|err| Error::io(format!("creating '{}'", parent.display()), err))?;
    let tmp = path.with_extension(format!("tmp-{}", std::process::id()));
    let payload = serde_json::to_vec_pretty(value).map_err(|err| {
        Error::io(
            format!("serializing '{}'", path.display()),
            std::io::Error::other(err),
        )
    })?;
    fs::write(&tmp, payload)
        .map_err(|err| Error::io(format!("writing temp file '{}'", tmp.display()), err))?;
    fs::rename(&tmp, path).map_err(|err| {
        Error::io(
            format!("renaming '{}' to '{}'", tmp.display(), path.display()),
            err,
        )
    })
}

/// Hex SHA-256 of a file's contents.
pub(crate) fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .map_err(|err| Error::io(format!("opening '{}'", path.display()), err))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = file
            .read(&mut buf)
            .map_err(|err| Error::io(format!("reading '{}'", path.display()), err))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_copy_leaves_no_temp_files() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("foo-1.0-1.el7.src.rpm");
        fs::write(&src, b"rpm").unwrap();
        let dest_dir = temp.path().join("SRPMS");
        fs::create_dir_all(&dest_dir).unwrap();

        let dest = atomic_copy_into(&src, &dest_dir).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"rpm");
        let entries: Vec<_> = fs::read_dir(&dest_dir).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn write_json_atomic_creates_parents() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a/b/manifest.json");
        write_json_atomic(&path, &serde_json::json!({"status": "success"})).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"status\": \"success\""));
    }

    #[test]
    fn sha256_of_known_content() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("abc");
        fs::write(&path, b"abc").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
