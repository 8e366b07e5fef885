//! Build pipeline orchestration.
//!
//! One run walks a fixed sequence of stages:
//!
//! ```text
//! Init → StageConfig → StageSources → BuildSrpm → BuildRpm → Collect → Publish → Done
//!                                  (any stage) → Failed
//! ```
//!
//! Three staging areas are allocated along the way (builder config, build
//! results, sources). They are plain locals of [`BuildPipeline::execute`], so
//! whichever way the run ends they drop in reverse order: sources, then
//! results, then config. Each one is removed unless the run preserves
//! staging for debugging.

pub mod collect;

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::fetch::{Fetcher, SourceRef};
use crate::interrupt;
use crate::process::{CommandRunner, Streams};
use crate::project::{ProjectConfig, ProjectDescriptor};
use crate::publish::{PublishReport, RepositoryPublisher};
use crate::settings::Settings;
use crate::staging::{DirGuard, StagingArea};
use crate::template;

pub use collect::{collect_artifacts, ArtifactSet};

const CONFIG_STAGING_PREFIX: &str = "lakehead-config-";
const RESULT_STAGING_PREFIX: &str = "lakehead-result-";
const SOURCE_STAGING_PREFIX: &str = "lakehead-source-";

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    StageConfig,
    StageSources,
    BuildSrpm,
    BuildRpm,
    Collect,
    Publish,
    Done,
    Failed,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::StageConfig => "stage-config",
            Self::StageSources => "stage-sources",
            Self::BuildSrpm => "build-srpm",
            Self::BuildRpm => "build-rpm",
            Self::Collect => "collect",
            Self::Publish => "publish",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

/// Per-run switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    /// Leave staging areas on disk after the run.
    pub preserve: bool,
}

/// Drives one project from descriptor to published packages.
pub struct BuildPipeline<'a> {
    settings: &'a Settings,
    runner: &'a dyn CommandRunner,
    fetcher: &'a dyn Fetcher,
    options: PipelineOptions,
    history: Vec<Stage>,
    failed_at: Option<Stage>,
    descriptor: Option<ProjectDescriptor>,
}

impl<'a> BuildPipeline<'a> {
    pub fn new(
        settings: &'a Settings,
        runner: &'a dyn CommandRunner,
        fetcher: &'a dyn Fetcher,
        options: PipelineOptions,
    ) -> Self {
        Self {
            settings,
            runner,
            fetcher,
            options,
            history: Vec::new(),
            failed_at: None,
            descriptor: None,
        }
    }

    /// Current stage; `Init` before the run starts.
    pub fn stage(&self) -> Stage {
        self.history.last().copied().unwrap_or(Stage::Init)
    }

    /// Every stage entered so far, in order.
    pub fn history(&self) -> &[Stage] {
        &self.history
    }

    /// Stage that was running when the pipeline failed.
    pub fn failed_at(&self) -> Option<Stage> {
        self.failed_at
    }

    /// Descriptor loaded during `Init`, once the run got that far.
    pub fn descriptor(&self) -> Option<&ProjectDescriptor> {
        self.descriptor.as_ref()
    }

    /// Build and publish `project`.
    pub fn run(&mut self, project: &str) -> Result<PublishReport> {
        match self.execute(project) {
            Ok(report) => {
                self.enter(Stage::Done);
                Ok(report)
            }
            Err(err) => {
                let at = self.stage();
                self.failed_at = Some(at);
                self.enter(Stage::Failed);
                tracing::error!(project, stage = at.label(), error = %err, "pipeline failed");
                Err(err)
            }
        }
    }

    fn execute(&mut self, project: &str) -> Result<PublishReport> {
        self.advance(Stage::Init)?;
        let project_dir = resolve_project_dir(self.settings, project)?;
        let mut config = ProjectConfig::load(&project_dir, project)?;
        self.descriptor = Some(config.to_descriptor());
        config.set("spec", resolve_spec_path(&project_dir, project)?)?;
        let templates = builder_config_templates(&self.settings.builder_config_dir)?;

        self.advance(Stage::StageConfig)?;
        let config_area = self.staging_area(CONFIG_STAGING_PREFIX)?;
        {
            let _cwd = DirGuard::enter(config_area.path(), false)?;
            self.fetcher.fetch_all(&templates, config_area.path())?;
        }
        config.set("configdir", config_area.path())?;

        self.advance(Stage::StageSources)?;
        let result_area = self.staging_area(RESULT_STAGING_PREFIX)?;
        let source_area = self.staging_area(SOURCE_STAGING_PREFIX)?;
        {
            let _cwd = DirGuard::enter(source_area.path(), false)?;
            self.fetcher
                .fetch(&SourceRef::parse(config.source()), source_area.path())?;
            self.fetcher
                .fetch_all(config.other_sources(), source_area.path())?;
        }
        config.set("resultdir", result_area.path())?;
        config.set("sourcedir", source_area.path())?;

        self.advance(Stage::BuildSrpm)?;
        let srpm_argv = template::render(&self.settings.srpm_command, &config)?;
        self.runner
            .run(&srpm_argv, Some(result_area.path()), Streams::Inherit)?;

        self.advance(Stage::BuildRpm)?;
        let expected_srpm = result_area.path().join(config.source_package_name());
        if !expected_srpm.is_file() {
            tracing::warn!(
                path = %expected_srpm.display(),
                "builder did not write the expected source package name"
            );
        }
        let rpm_argv = template::render(&self.settings.rpm_command, &config)?;
        self.runner
            .run(&rpm_argv, Some(result_area.path()), Streams::Inherit)?;

        self.advance(Stage::Collect)?;
        let artifacts = collect_artifacts(result_area.path())?;
        tracing::info!(
            source = %artifacts.source_package.display(),
            binaries = artifacts.binary_packages.len(),
            "collected build results"
        );

        self.advance(Stage::Publish)?;
        let publisher = RepositoryPublisher::new(
            &self.settings.repo_root,
            &self.settings.arch,
            &self.settings.metadata_command,
            self.runner,
        );
        publisher.publish(&artifacts.source_package, &artifacts.binary_packages)
    }

    fn advance(&mut self, stage: Stage) -> Result<()> {
        interrupt::check()?;
        self.enter(stage);
        Ok(())
    }

    fn enter(&mut self, stage: Stage) {
        tracing::info!(stage = stage.label(), "pipeline stage");
        self.history.push(stage);
    }

    fn staging_area(&self, prefix: &str) -> Result<StagingArea> {
        let root = self
            .settings
            .staging_root
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        StagingArea::new_in(&root, prefix, self.options.preserve)
    }
}

/// Canonical directory of `project` under the configured projects directory.
///
/// Names that could escape the projects directory are rejected.
pub fn resolve_project_dir(settings: &Settings, project: &str) -> Result<PathBuf> {
    if project.is_empty()
        || project.contains('/')
        || project.contains('\\')
        || project.starts_with('.')
    {
        return Err(Error::Config {
            path: settings.projects_dir.clone(),
            reason: format!("invalid project name '{project}'"),
        });
    }
    let dir = settings.project_dir(project);
    fs::canonicalize(&dir).map_err(|err| Error::Config {
        path: dir.clone(),
        reason: format!("project directory unavailable: {err}"),
    })
}

fn resolve_spec_path(project_dir: &Path, project: &str) -> Result<PathBuf> {
    let spec = project_dir.join(format!("{project}.spec"));
    if !spec.is_file() {
        return Err(Error::Config {
            path: spec,
            reason: "spec file not found".to_string(),
        });
    }
    Ok(spec)
}

/// Regular files directly under `dir`, sorted, as escaped glob references.
fn builder_config_templates(dir: &Path) -> Result<Vec<String>> {
    let mut templates = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|err| Error::Config {
            path: dir.to_path_buf(),
            reason: format!("reading builder config templates: {err}"),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path().to_str().ok_or_else(|| Error::Config {
            path: entry.path().to_path_buf(),
            reason: "template path is not valid UTF-8".to_string(),
        })?;
        templates.push(glob::Pattern::escape(path));
    }
    if templates.is_empty() {
        return Err(Error::Config {
            path: dir.to_path_buf(),
            reason: "no builder config templates found".to_string(),
        });
    }
    Ok(templates)
}
