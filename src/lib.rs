//! Build-and-publish orchestration for RPM projects.
//!
//! A project directory holds `<project>.json` (the descriptor) and
//! `<project>.spec`. One run stages the builder configuration and sources into
//! ephemeral directories, drives an external chroot builder to produce a
//! source package and then binary packages, and publishes the results into an
//! append-only repository tree, regenerating metadata for every subtree it
//! touched.
//!
//! # Architecture
//!
//! ```text
//! lakehead (binary)
//!     │
//!     ├── settings ── tool-wide TOML settings
//!     ├── preflight ─ host tool checks
//!     └── pipeline ── BuildPipeline
//!             │
//!             ├── project ─── descriptor + pipeline-assigned paths
//!             ├── staging ─── DirGuard / StagingArea
//!             ├── fetch ───── Fetcher (local globs, http)
//!             ├── template ── command argv rendering
//!             ├── process ─── CommandRunner (mock, createrepo)
//!             └── publish ─── RepositoryPublisher
//!
//! runs ── per-run manifests under the runs directory
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use lakehead::{BuildPipeline, PipelineOptions, Settings, SourceFetcher, SystemRunner};
//!
//! let settings = Settings::discover()?;
//! let fetcher = SourceFetcher::new(settings.project_dir("foo"));
//! let mut pipeline =
//!     BuildPipeline::new(&settings, &SystemRunner, &fetcher, PipelineOptions::default());
//! let report = pipeline.run("foo")?;
//! ```

pub mod error;
pub mod fetch;
mod fs_util;
pub mod interrupt;
mod paths;
pub mod pipeline;
pub mod preflight;
pub mod process;
pub mod project;
pub mod publish;
pub mod runs;
pub mod settings;
pub mod staging;
pub mod template;
mod trace;

pub use error::{Error, Result};
pub use fetch::{Fetcher, SourceFetcher, SourceRef, SourceRefs};
pub use pipeline::{collect_artifacts, ArtifactSet, BuildPipeline, PipelineOptions, Stage};
pub use process::{CommandRunner, Streams, SystemRunner};
pub use project::{ConfigKey, ProjectConfig, ProjectDescriptor};
pub use publish::{Partition, PublishReport, RepositoryPublisher};
pub use runs::{RunManifest, RunRecorder, RunStatus};
pub use settings::Settings;
pub use staging::{with_directory, with_staging_area, DirGuard, StagingArea};
