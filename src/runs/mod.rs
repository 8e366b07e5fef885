//! Run ledger.
//!
//! Every invocation gets `<runs_dir>/<project>/<run_id>/run-manifest.json`,
//! written when the run starts (`building`) and rewritten when it ends
//! (`success` or `failed`). Old run directories are pruned by recency.

mod id;

use std::cmp::Reverse;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::fs_util::{sha256_file, write_json_atomic};
use crate::pipeline::Stage;
use crate::project::ProjectDescriptor;
use crate::publish::PublishReport;

pub use id::{generate_run_id, now_utc_compact};

const RUN_MANIFEST_FILENAME: &str = "run-manifest.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Building,
    Success,
    Failed,
}

/// A package copied into the repository by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedPackage {
    pub path: PathBuf,
    pub sha256: String,
    pub size_bytes: u64,
}

/// Contents of `run-manifest.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub project: String,
    pub status: RunStatus,
    pub created_at_utc: String,
    #[serde(default)]
    pub finished_at_utc: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub release: Option<String>,
    #[serde(default)]
    pub dist: Option<String>,
    #[serde(default)]
    pub stages: Vec<String>,
    #[serde(default)]
    pub failed_stage: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub published: Vec<PublishedPackage>,
}

pub fn manifest_path(run_dir: &Path) -> PathBuf {
    run_dir.join(RUN_MANIFEST_FILENAME)
}

/// Manifests of every run recorded under `project_runs_dir`.
///
/// Hidden directories and directories without a manifest are skipped.
pub fn load_runs(project_runs_dir: &Path) -> Result<Vec<RunManifest>> {
    Ok(load_run_dirs(project_runs_dir)?
        .into_iter()
        .map(|(_, manifest)| manifest)
        .collect())
}

/// Each run directory paired with the manifest read from it.
fn load_run_dirs(project_runs_dir: &Path) -> Result<Vec<(PathBuf, RunManifest)>> {
    if !project_runs_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut runs = Vec::new();
    for entry in WalkDir::new(project_runs_dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|err| {
            Error::io(
                format!("reading runs directory '{}'", project_runs_dir.display()),
                std::io::Error::other(err),
            )
        })?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        let path = manifest_path(entry.path());
        if !path.is_file() {
            continue;
        }
        let bytes = fs::read(&path)
            .map_err(|err| Error::io(format!("reading run manifest '{}'", path.display()), err))?;
        let manifest: RunManifest = serde_json::from_slice(&bytes).map_err(|err| Error::Config {
            path: path.clone(),
            reason: err.to_string(),
        })?;
        runs.push((entry.into_path(), manifest));
    }
    Ok(runs)
}

/// Most recent run that finished successfully.
pub fn latest_successful_run(project_runs_dir: &Path) -> Result<Option<RunManifest>> {
    let mut runs = load_runs(project_runs_dir)?;
    runs.retain(|run| run.status == RunStatus::Success);
    runs.sort_by_key(|run| Reverse(run_sort_key(run)));
    Ok(runs.into_iter().next())
}

/// Remove all but the `keep` most recent runs. Returns how many were removed.
pub fn prune_old_runs(project_runs_dir: &Path, keep: usize) -> Result<usize> {
    let mut runs = load_run_dirs(project_runs_dir)?;
    runs.sort_by_key(|(_, run)| Reverse(run_sort_key(run)));
    let mut removed = 0;
    for (path, run) in runs.into_iter().skip(keep) {
        fs::remove_dir_all(&path).map_err(|err| {
            Error::io(
                format!("removing expired run directory '{}'", path.display()),
                err,
            )
        })?;
        tracing::debug!(run = %run.run_id, "pruned run");
        removed += 1;
    }
    Ok(removed)
}

fn run_sort_key(run: &RunManifest) -> (String, String) {
    let stamp = run
        .finished_at_utc
        .clone()
        .unwrap_or_else(|| run.created_at_utc.clone());
    (stamp, run.run_id.clone())
}

/// Writes one run's manifest as the run progresses.
#[derive(Debug)]
pub struct RunRecorder {
    dir: PathBuf,
    manifest: RunManifest,
}

impl RunRecorder {
    /// Allocate a run directory for `project` and record it as `building`.
    pub fn start(runs_dir: &Path, project: &str) -> Result<Self> {
        let run_id = generate_run_id()?;
        let dir = runs_dir.join(project).join(&run_id);
        let manifest = RunManifest {
            run_id,
            project: project.to_string(),
            status: RunStatus::Building,
            created_at_utc: now_utc_compact(),
            finished_at_utc: None,
            version: None,
            release: None,
            dist: None,
            stages: Vec::new(),
            failed_stage: None,
            error: None,
            published: Vec::new(),
        };
        let recorder = Self { dir, manifest };
        recorder.write()?;
        Ok(recorder)
    }

    pub fn run_id(&self) -> &str {
        &self.manifest.run_id
    }

    pub fn run_dir(&self) -> &Path {
        &self.dir
    }

    /// Finish the run as successful, recording a digest of each published file.
    pub fn succeed(
        mut self,
        descriptor: Option<&ProjectDescriptor>,
        history: &[Stage],
        report: &PublishReport,
    ) -> Result<RunManifest> {
        for path in &report.published {
            let size_bytes = fs::metadata(path)
                .map_err(|err| Error::io(format!("inspecting '{}'", path.display()), err))?
                .len();
            self.manifest.published.push(PublishedPackage {
                path: path.clone(),
                sha256: sha256_file(path)?,
                size_bytes,
            });
        }
        self.finish(RunStatus::Success, descriptor, history)
    }

    /// Finish the run as failed.
    pub fn fail(
        mut self,
        descriptor: Option<&ProjectDescriptor>,
        history: &[Stage],
        failed_at: Option<Stage>,
        error: &Error,
    ) -> Result<RunManifest> {
        self.manifest.failed_stage = failed_at.map(|stage| stage.label().to_string());
        self.manifest.error = Some(error.to_string());
        self.finish(RunStatus::Failed, descriptor, history)
    }

    fn finish(
        mut self,
        status: RunStatus,
        descriptor: Option<&ProjectDescriptor>,
        history: &[Stage],
    ) -> Result<RunManifest> {
        if let Some(descriptor) = descriptor {
            self.manifest.version = Some(descriptor.version.clone());
            self.manifest.release = Some(descriptor.release.clone());
            self.manifest.dist = Some(descriptor.dist.clone());
        }
        self.manifest.stages = history.iter().map(|stage| stage.label().to_string()).collect();
        self.manifest.status = status;
        self.manifest.finished_at_utc = Some(now_utc_compact());
        self.write()?;
        Ok(self.manifest)
    }

    fn write(&self) -> Result<()> {
        write_json_atomic(&manifest_path(&self.dir), &self.manifest)
    }
}
