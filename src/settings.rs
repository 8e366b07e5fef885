//! Deployment settings: where the repository lives, which architecture it
//! serves, and the command templates for the builder and metadata generator.
//!
//! Settings come from a TOML file; every field is optional and falls back to
//! a default. Relative paths resolve against the directory holding the file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::paths::{absolute, resolve_against};

/// Environment variable naming an explicit settings file.
pub const CONFIG_ENV: &str = "LAKEHEAD_CONFIG";

const SETTINGS_FILENAME: &str = "lakehead.toml";
const DEFAULT_REPO_ROOT: &str = "/srv/repo";
const DEFAULT_BUILDER_CONFIG_DIR: &str = "/etc/lakehead/mock";
const DEFAULT_KEEP_RUNS: usize = 20;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsToml {
    repo_root: Option<PathBuf>,
    arch: Option<String>,
    projects_dir: Option<PathBuf>,
    builder_config_dir: Option<PathBuf>,
    staging_root: Option<PathBuf>,
    srpm_command: Option<Vec<String>>,
    rpm_command: Option<Vec<String>>,
    metadata_command: Option<Vec<String>>,
    runs_dir: Option<PathBuf>,
    keep_runs: Option<usize>,
}

/// Resolved settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root of the published repository tree.
    pub repo_root: PathBuf,
    /// Architecture directory for non-noarch binary packages.
    pub arch: String,
    /// Directory holding one sub-directory per project.
    pub projects_dir: PathBuf,
    /// Builder configuration templates copied into every run.
    pub builder_config_dir: PathBuf,
    /// Parent of the staging areas; the system temp dir when unset.
    pub staging_root: Option<PathBuf>,
    /// Builder invocation producing the source package.
    pub srpm_command: Vec<String>,
    /// Builder invocation rebuilding binaries from the source package.
    pub rpm_command: Vec<String>,
    /// Metadata regeneration, run inside each touched repository subtree.
    pub metadata_command: Vec<String>,
    /// Where run manifests are recorded.
    pub runs_dir: PathBuf,
    /// How many run records to keep per project.
    pub keep_runs: usize,
}

impl Settings {
    /// Built-in defaults with relative paths anchored at `base_dir`.
    pub fn defaults(base_dir: &Path) -> Self {
        Self::from_toml(base_dir, SettingsToml::default())
    }

    /// Resolve settings from `$LAKEHEAD_CONFIG`, then the per-user config
    /// directory, then built-in defaults.
    pub fn discover() -> Result<Self> {
        if let Ok(explicit) = std::env::var(CONFIG_ENV) {
            return Self::load(Path::new(&explicit));
        }
        if let Some(user) = dirs::config_dir().map(|d| d.join("lakehead").join(SETTINGS_FILENAME)) {
            if user.is_file() {
                return Self::load(&user);
            }
        }
        let cwd = std::env::current_dir()
            .map_err(|err| Error::io("resolving current directory", err))?;
        tracing::debug!("no settings file found; using defaults");
        Ok(Self::defaults(&cwd))
    }

    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|err| Error::Config {
            path: path.to_path_buf(),
            reason: format!("reading settings: {err}"),
        })?;
        let parsed: SettingsToml = toml::from_str(&text).map_err(|err| Error::Config {
            path: path.to_path_buf(),
            reason: format!("parsing settings: {err}"),
        })?;
        let base = absolute(
            path.parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new(".")),
        )?;
        let settings = Self::from_toml(&base, parsed);
        settings.validate(path)?;
        Ok(settings)
    }

    fn from_toml(base: &Path, raw: SettingsToml) -> Self {
        let resolve = |p: PathBuf| resolve_against(base, &p);
        Self {
            repo_root: resolve(raw.repo_root.unwrap_or_else(|| DEFAULT_REPO_ROOT.into())),
            arch: raw
                .arch
                .map(|a| a.trim().to_string())
                .unwrap_or_else(|| std::env::consts::ARCH.to_string()),
            projects_dir: resolve(raw.projects_dir.unwrap_or_else(|| PathBuf::from("."))),
            builder_config_dir: resolve(
                raw.builder_config_dir
                    .unwrap_or_else(|| DEFAULT_BUILDER_CONFIG_DIR.into()),
            ),
            staging_root: raw.staging_root.map(resolve),
            srpm_command: raw.srpm_command.unwrap_or_else(default_srpm_command),
            rpm_command: raw.rpm_command.unwrap_or_else(default_rpm_command),
            metadata_command: raw.metadata_command.unwrap_or_else(default_metadata_command),
            runs_dir: raw.runs_dir.map(resolve).unwrap_or_else(default_runs_dir),
            keep_runs: raw.keep_runs.unwrap_or(DEFAULT_KEEP_RUNS),
        }
    }

    fn validate(&self, path: &Path) -> Result<()> {
        let invalid = |reason: String| Error::Config {
            path: path.to_path_buf(),
            reason,
        };
        for (field, command) in [
            ("srpm_command", &self.srpm_command),
            ("rpm_command", &self.rpm_command),
            ("metadata_command", &self.metadata_command),
        ] {
            if command.is_empty() || command[0].trim().is_empty() {
                return Err(invalid(format!("{field} must name a program")));
            }
        }
        if self.arch.is_empty() || self.arch == "noarch" || self.arch.contains('/') {
            return Err(invalid(format!("unsupported arch '{}'", self.arch)));
        }
        if self.keep_runs == 0 {
            return Err(invalid("keep_runs must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Project directory for `project`.
    pub fn project_dir(&self, project: &str) -> PathBuf {
        self.projects_dir.join(project)
    }
}

fn default_srpm_command() -> Vec<String> {
    [
        "mock",
        "--configdir={configdir}",
        "--buildsrpm",
        "--spec={spec}",
        "--sources={sourcedir}",
        "--resultdir={resultdir}",
    ]
    .map(String::from)
    .to_vec()
}

fn default_rpm_command() -> Vec<String> {
    [
        "mock",
        "--configdir={configdir}",
        "--resultdir={resultdir}",
        "{resultdir}/{name}-{version}-{release}.{dist}.src.rpm",
    ]
    .map(String::from)
    .to_vec()
}

fn default_metadata_command() -> Vec<String> {
    ["createrepo", "--update", "."].map(String::from).to_vec()
}

fn default_runs_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("lakehead")
        .join("runs")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn defaults_cover_every_field() {
        let settings = Settings::defaults(Path::new("/work"));
        assert_eq!(settings.repo_root, PathBuf::from(DEFAULT_REPO_ROOT));
        assert_eq!(settings.projects_dir, PathBuf::from("/work/."));
        assert_eq!(settings.srpm_command[0], "mock");
        assert!(settings.srpm_command.contains(&"--buildsrpm".to_string()));
        assert_eq!(settings.metadata_command, ["createrepo", "--update", "."]);
        assert_eq!(settings.keep_runs, DEFAULT_KEEP_RUNS);
    }

    #[test]
    fn partial_file_keeps_defaults_and_resolves_relative_paths() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(SETTINGS_FILENAME);
        fs::write(
            &path,
            r#"
repo_root = "repo"
arch = "x86_64"
metadata_command = ["createrepo_c", "--update", "."]
"#,
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.repo_root, temp.path().join("repo"));
        assert_eq!(settings.arch, "x86_64");
        assert_eq!(settings.metadata_command[0], "createrepo_c");
        assert_eq!(settings.rpm_command[0], "mock");
    }

    #[test]
    #[serial]
    fn relative_settings_path_yields_absolute_paths() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("conf")).unwrap();
        fs::write(
            temp.path().join("conf").join(SETTINGS_FILENAME),
            "repo_root = \"repo\"\nprojects_dir = \"projects\"\n",
        )
        .unwrap();

        let settings = crate::staging::with_directory(temp.path(), false, |_| {
            Settings::load(&Path::new("conf").join(SETTINGS_FILENAME))
        })
        .unwrap();

        let conf = temp.path().canonicalize().unwrap().join("conf");
        assert!(settings.repo_root.is_absolute());
        assert_eq!(settings.repo_root, conf.join("repo"));
        assert_eq!(settings.projects_dir, conf.join("projects"));
        assert!(settings.builder_config_dir.is_absolute());
    }

    #[test]
    fn unknown_field_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(SETTINGS_FILENAME);
        fs::write(&path, "repository = \"/srv\"\n").unwrap();
        let err = Settings::load(&path).unwrap_err();
        assert!(matches!(err, Error::Config { .. }), "{err}");
    }

    #[test]
    fn empty_command_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(SETTINGS_FILENAME);
        fs::write(&path, "srpm_command = []\n").unwrap();
        assert!(Settings::load(&path).is_err());
    }

    #[test]
    fn noarch_is_not_a_deployment_arch() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(SETTINGS_FILENAME);
        fs::write(&path, "arch = \"noarch\"\n").unwrap();
        assert!(Settings::load(&path).is_err());
    }

    #[test]
    fn missing_file_is_config_error() {
        let temp = TempDir::new().unwrap();
        let err = Settings::load(&temp.path().join("absent.toml")).unwrap_err();
        assert!(err.is_configuration());
    }
}
