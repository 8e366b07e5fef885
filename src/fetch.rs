//! Source retrieval into staging directories.
//!
//! A reference is either a remote URL or a local path/glob pattern. Local
//! patterns resolve against an explicit base directory (the project
//! directory), never against the process working directory, which moves as
//! staging scopes nest. Whatever the reference, the file lands in the
//! destination directory under its basename.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Network timeout for remote sources.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// One or many references, as accepted in a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SourceRefs {
    Single(String),
    List(Vec<String>),
}

impl SourceRefs {
    /// Normalize to an ordered sequence.
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::Single(reference) => vec![reference],
            Self::List(references) => references,
        }
    }
}

/// A classified source reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    /// `http://` or `https://` location.
    Url(String),
    /// Local path or glob pattern; `file://` prefixes are stripped.
    Path(String),
}

impl SourceRef {
    pub fn parse(reference: &str) -> Self {
        let trimmed = reference.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Self::Url(trimmed.to_string())
        } else if let Some(path) = trimmed.strip_prefix("file://") {
            Self::Path(path.to_string())
        } else {
            Self::Path(trimmed.to_string())
        }
    }

    /// Raw reference text.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Url(url) => url,
            Self::Path(path) => path,
        }
    }
}

/// Retrieves references into a destination directory.
pub trait Fetcher {
    /// Place the file(s) named by `reference` into `dest_dir`, returning the
    /// paths written.
    fn fetch(&self, reference: &SourceRef, dest_dir: &Path) -> Result<Vec<PathBuf>>;

    /// Fetch a sequence of references in order, stopping at the first
    /// failure.
    fn fetch_all(&self, references: &[String], dest_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for reference in references {
            written.extend(self.fetch(&SourceRef::parse(reference), dest_dir)?);
        }
        Ok(written)
    }
}

/// Fetches URLs over HTTP and copies local files matched by glob patterns.
#[derive(Debug, Clone)]
pub struct SourceFetcher {
    base_dir: PathBuf,
}

impl SourceFetcher {
    /// Local patterns resolve against `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn fetch_local(&self, pattern: &str, dest_dir: &Path) -> Result<Vec<PathBuf>> {
        let base = self.base_dir.to_str().ok_or_else(|| Error::Fetch {
            reference: pattern.to_string(),
            reason: "base directory is not valid UTF-8".to_string(),
        })?;
        // Only the reference is a pattern; the base directory is matched literally.
        let base = glob::Pattern::escape(base);
        let full = crate::paths::resolve_against(Path::new(&base), Path::new(pattern));
        let full_text = full.to_str().ok_or_else(|| Error::Fetch {
            reference: pattern.to_string(),
            reason: "path is not valid UTF-8".to_string(),
        })?;
        let matches = glob::glob(full_text).map_err(|err| Error::Fetch {
            reference: pattern.to_string(),
            reason: format!("invalid pattern: {err}"),
        })?;

        let mut written = Vec::new();
        for entry in matches {
            let src = entry.map_err(|err| Error::Fetch {
                reference: pattern.to_string(),
                reason: err.to_string(),
            })?;
            if !src.is_file() {
                continue;
            }
            let dest = dest_dir.join(basename(&src, pattern)?);
            fs::copy(&src, &dest).map_err(|err| Error::Fetch {
                reference: pattern.to_string(),
                reason: format!("copying '{}' -> '{}': {err}", src.display(), dest.display()),
            })?;
            tracing::debug!(src = %src.display(), dest = %dest.display(), "fetched local source");
            written.push(dest);
        }

        if written.is_empty() {
            return Err(Error::Fetch {
                reference: pattern.to_string(),
                reason: format!("no files match '{}'", full.display()),
            });
        }
        Ok(written)
    }

    fn fetch_remote(&self, url: &str, dest_dir: &Path) -> Result<Vec<PathBuf>> {
        let name = url
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::Fetch {
                reference: url.to_string(),
                reason: "URL has no file name".to_string(),
            })?;
        let dest = dest_dir.join(name);
        let partial = dest_dir.join(format!(".{name}.part"));

        let response = http_agent()
            .get(url)
            .call()
            .map_err(|err| map_ureq_error(url, &err))?;
        let mut file = fs::File::create(&partial).map_err(|err| Error::Fetch {
            reference: url.to_string(),
            reason: format!("creating '{}': {err}", partial.display()),
        })?;
        let copied = std::io::copy(&mut response.into_body().as_reader(), &mut file);
        drop(file);
        if let Err(err) = copied {
            let _ = fs::remove_file(&partial);
            return Err(Error::Fetch {
                reference: url.to_string(),
                reason: format!("download interrupted: {err}"),
            });
        }
        fs::rename(&partial, &dest).map_err(|err| Error::Fetch {
            reference: url.to_string(),
            reason: format!("renaming into '{}': {err}", dest.display()),
        })?;
        tracing::debug!(url, dest = %dest.display(), "downloaded source");
        Ok(vec![dest])
    }
}

impl Fetcher for SourceFetcher {
    fn fetch(&self, reference: &SourceRef, dest_dir: &Path) -> Result<Vec<PathBuf>> {
        match reference {
            SourceRef::Url(url) => self.fetch_remote(url, dest_dir),
            SourceRef::Path(pattern) => self.fetch_local(pattern, dest_dir),
        }
    }
}

fn basename<'a>(path: &'a Path, reference: &str) -> Result<&'a std::ffi::OsStr> {
    path.file_name().ok_or_else(|| Error::Fetch {
        reference: reference.to_string(),
        reason: format!("'{}' has no file name", path.display()),
    })
}

fn http_agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(DOWNLOAD_TIMEOUT))
            .build();
        ureq::Agent::new_with_config(config)
    })
}

fn map_ureq_error(url: &str, err: &ureq::Error) -> Error {
    match err {
        ureq::Error::StatusCode(404) => Error::NotFound {
            url: url.to_string(),
        },
        other => Error::Fetch {
            reference: url.to_string(),
            reason: other.to_string(),
        },
    }
}
