//! Project descriptor loading and key-based lookup.
//!
//! A project lives in its own directory next to a `<project>.json`
//! descriptor and a `<project>.spec` recipe. The descriptor is parsed once per
//! run; the pipeline then assigns the staging paths exactly once each, and
//! command templates resolve `{key}` placeholders against the result.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fetch::SourceRefs;

/// Keys a project configuration answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigKey {
    Name,
    Version,
    Release,
    Dist,
    Source,
    ConfigDir,
    ResultDir,
    SourceDir,
    Spec,
}

impl ConfigKey {
    /// Every declared key, descriptor keys first.
    pub const ALL: [ConfigKey; 9] = [
        ConfigKey::Name,
        ConfigKey::Version,
        ConfigKey::Release,
        ConfigKey::Dist,
        ConfigKey::Source,
        ConfigKey::ConfigDir,
        ConfigKey::ResultDir,
        ConfigKey::SourceDir,
        ConfigKey::Spec,
    ];

    /// Parse a template key. Unknown keys are an error, never a default.
    pub fn parse(key: &str) -> Result<Self> {
        match key {
            "name" => Ok(Self::Name),
            "version" => Ok(Self::Version),
            "release" => Ok(Self::Release),
            "dist" | "distribution_tag" => Ok(Self::Dist),
            "source" => Ok(Self::Source),
            "configdir" | "config_dir" => Ok(Self::ConfigDir),
            "resultdir" | "result_dir" => Ok(Self::ResultDir),
            "sourcedir" | "source_dir" => Ok(Self::SourceDir),
            "spec" | "spec_path" => Ok(Self::Spec),
            other => Err(Error::UnknownKey(other.to_string())),
        }
    }

    /// Canonical template spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Version => "version",
            Self::Release => "release",
            Self::Dist => "dist",
            Self::Source => "source",
            Self::ConfigDir => "configdir",
            Self::ResultDir => "resultdir",
            Self::SourceDir => "sourcedir",
            Self::Spec => "spec",
        }
    }

    /// Whether the pipeline (rather than the descriptor) supplies the value.
    pub fn is_pipeline_assigned(self) -> bool {
        matches!(
            self,
            Self::ConfigDir | Self::ResultDir | Self::SourceDir | Self::Spec
        )
    }
}

#[derive(Debug, Deserialize)]
struct DescriptorJson {
    name: Option<String>,
    version: Option<String>,
    release: Option<String>,
    #[serde(alias = "distribution_tag")]
    dist: Option<String>,
    source: Option<String>,
    #[serde(default)]
    other_sources: Option<SourceRefs>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

/// The recognized descriptor keys, in the shape they are written on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectDescriptor {
    pub name: String,
    pub version: String,
    pub release: String,
    pub dist: String,
    pub source: String,
    pub other_sources: Vec<String>,
}

/// A loaded project plus the paths the pipeline assigns while staging.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    descriptor_path: PathBuf,
    descriptor: ProjectDescriptor,
    config_dir: Option<PathBuf>,
    result_dir: Option<PathBuf>,
    source_dir: Option<PathBuf>,
    spec_path: Option<PathBuf>,
}

impl ProjectConfig {
    /// Load `<project_dir>/<project>.json`.
    pub fn load(project_dir: &Path, project: &str) -> Result<Self> {
        Self::from_path(&project_dir.join(format!("{project}.json")))
    }

    /// Load a descriptor from an explicit path.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = fs::read_to_string(path).map_err(|err| Error::Config {
            path: path.to_path_buf(),
            reason: format!("reading project descriptor: {err}"),
        })?;
        Self::from_json(path, &bytes)
    }

    fn from_json(path: &Path, text: &str) -> Result<Self> {
        let raw: DescriptorJson = serde_json::from_str(text).map_err(|err| Error::Config {
            path: path.to_path_buf(),
            reason: format!("parsing project descriptor: {err}"),
        })?;

        for key in raw.extra.keys() {
            tracing::debug!(path = %path.display(), key, "ignoring unrecognized descriptor key");
        }

        let required = |value: Option<String>, field: &'static str| -> Result<String> {
            match value {
                Some(v) if !v.trim().is_empty() => Ok(v),
                _ => Err(Error::MissingField {
                    path: path.to_path_buf(),
                    field,
                }),
            }
        };

        let descriptor = ProjectDescriptor {
            name: required(raw.name, "name")?,
            version: required(raw.version, "version")?,
            release: required(raw.release, "release")?,
            dist: required(raw.dist, "dist")?,
            source: required(raw.source, "source")?,
            other_sources: raw.other_sources.map(SourceRefs::into_vec).unwrap_or_default(),
        };

        Ok(Self {
            descriptor_path: path.to_path_buf(),
            descriptor,
            config_dir: None,
            result_dir: None,
            source_dir: None,
            spec_path: None,
        })
    }

    pub fn descriptor_path(&self) -> &Path {
        &self.descriptor_path
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn version(&self) -> &str {
        &self.descriptor.version
    }

    pub fn release(&self) -> &str {
        &self.descriptor.release
    }

    pub fn distribution_tag(&self) -> &str {
        &self.descriptor.dist
    }

    pub fn source(&self) -> &str {
        &self.descriptor.source
    }

    pub fn other_sources(&self) -> &[String] {
        &self.descriptor.other_sources
    }

    pub fn config_dir(&self) -> Option<&Path> {
        self.config_dir.as_deref()
    }

    pub fn result_dir(&self) -> Option<&Path> {
        self.result_dir.as_deref()
    }

    pub fn source_dir(&self) -> Option<&Path> {
        self.source_dir.as_deref()
    }

    pub fn spec_path(&self) -> Option<&Path> {
        self.spec_path.as_deref()
    }

    /// File name of the source package the builder produces first:
    /// `<name>-<version>-<release>.<dist>.src.rpm`.
    pub fn source_package_name(&self) -> String {
        format!(
            "{}-{}-{}.{}.src.rpm",
            self.descriptor.name,
            self.descriptor.version,
            self.descriptor.release,
            self.descriptor.dist
        )
    }

    /// Look up a key by its template name.
    pub fn get(&self, key: &str) -> Result<String> {
        self.value(ConfigKey::parse(key)?)
    }

    /// Look up a typed key.
    pub fn value(&self, key: ConfigKey) -> Result<String> {
        let path_value = |value: &Option<PathBuf>| {
            value
                .as_ref()
                .map(|p| p.display().to_string())
                .ok_or_else(|| Error::Unassigned(key.as_str().to_string()))
        };
        match key {
            ConfigKey::Name => Ok(self.descriptor.name.clone()),
            ConfigKey::Version => Ok(self.descriptor.version.clone()),
            ConfigKey::Release => Ok(self.descriptor.release.clone()),
            ConfigKey::Dist => Ok(self.descriptor.dist.clone()),
            ConfigKey::Source => Ok(self.descriptor.source.clone()),
            ConfigKey::ConfigDir => path_value(&self.config_dir),
            ConfigKey::ResultDir => path_value(&self.result_dir),
            ConfigKey::SourceDir => path_value(&self.source_dir),
            ConfigKey::Spec => path_value(&self.spec_path),
        }
    }

    /// Assign one of the pipeline keys. Each may be written once.
    pub fn set(&mut self, key: &str, value: impl Into<PathBuf>) -> Result<()> {
        let key = ConfigKey::parse(key)?;
        let slot = match key {
            ConfigKey::ConfigDir => &mut self.config_dir,
            ConfigKey::ResultDir => &mut self.result_dir,
            ConfigKey::SourceDir => &mut self.source_dir,
            ConfigKey::Spec => &mut self.spec_path,
            _ => return Err(Error::NotAssignable(key.as_str().to_string())),
        };
        if slot.is_some() {
            return Err(Error::AlreadyAssigned(key.as_str().to_string()));
        }
        *slot = Some(value.into());
        Ok(())
    }

    /// Every declared key that currently has a value.
    pub fn snapshot(&self) -> BTreeMap<&'static str, String> {
        ConfigKey::ALL
            .iter()
            .filter_map(|key| self.value(*key).ok().map(|v| (key.as_str(), v)))
            .collect()
    }

    /// The recognized descriptor keys as loaded.
    pub fn to_descriptor(&self) -> ProjectDescriptor {
        self.descriptor.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const FOO: &str = r#"{
        "name": "foo",
        "version": "1.0",
        "release": "1",
        "dist": "el7",
        "source": "http://example/foo-1.0.tar.gz",
        "other_sources": ["patches/*.patch", "foo.conf"]
    }"#;

    fn write_descriptor(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(format!("{name}.json"));
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn load_reads_all_descriptor_keys() {
        let temp = TempDir::new().unwrap();
        write_descriptor(temp.path(), "foo", FOO);

        let config = ProjectConfig::load(temp.path(), "foo").unwrap();
        assert_eq!(config.name(), "foo");
        assert_eq!(config.version(), "1.0");
        assert_eq!(config.release(), "1");
        assert_eq!(config.distribution_tag(), "el7");
        assert_eq!(config.source(), "http://example/foo-1.0.tar.gz");
        assert_eq!(config.other_sources(), ["patches/*.patch", "foo.conf"]);
        assert_eq!(config.source_package_name(), "foo-1.0-1.el7.src.rpm");
    }

    #[test]
    fn recognized_keys_survive_reserialization() {
        let temp = TempDir::new().unwrap();
        write_descriptor(temp.path(), "foo", FOO);
        let config = ProjectConfig::load(temp.path(), "foo").unwrap();

        let original: serde_json::Value = serde_json::from_str(FOO).unwrap();
        let written = serde_json::to_value(config.to_descriptor()).unwrap();
        assert_eq!(written, original);
    }

    #[test]
    fn surrounding_whitespace_is_kept_verbatim() {
        let temp = TempDir::new().unwrap();
        let body = r#"{"name":"foo","version":"1.0 ","release":" 1","dist":"el7",
                       "source":"foo.tar.gz","other_sources":[]}"#;
        write_descriptor(temp.path(), "foo", body);
        let config = ProjectConfig::load(temp.path(), "foo").unwrap();

        assert_eq!(config.version(), "1.0 ");
        let original: serde_json::Value = serde_json::from_str(body).unwrap();
        let written = serde_json::to_value(config.to_descriptor()).unwrap();
        assert_eq!(written, original);
    }

    #[test]
    fn scalar_other_sources_is_normalized() {
        let temp = TempDir::new().unwrap();
        let body = r#"{"name":"foo","version":"1.0","release":"1","dist":"el7",
                       "source":"foo.tar.gz","other_sources":"foo.conf"}"#;
        write_descriptor(temp.path(), "foo", body);
        let config = ProjectConfig::load(temp.path(), "foo").unwrap();
        assert_eq!(config.other_sources(), ["foo.conf"]);
    }

    #[test]
    fn missing_other_sources_is_empty() {
        let temp = TempDir::new().unwrap();
        let body = r#"{"name":"foo","version":"1.0","release":"1","dist":"el7","source":"s"}"#;
        write_descriptor(temp.path(), "foo", body);
        let config = ProjectConfig::load(temp.path(), "foo").unwrap();
        assert!(config.other_sources().is_empty());
    }

    #[test]
    fn missing_descriptor_is_config_error() {
        let temp = TempDir::new().unwrap();
        let err = ProjectConfig::load(temp.path(), "absent").unwrap_err();
        assert!(matches!(err, Error::Config { .. }), "{err}");
    }

    #[test]
    fn malformed_descriptor_is_config_error() {
        let temp = TempDir::new().unwrap();
        write_descriptor(temp.path(), "foo", "{ not json");
        let err = ProjectConfig::load(temp.path(), "foo").unwrap_err();
        assert!(matches!(err, Error::Config { .. }), "{err}");
    }

    #[test]
    fn missing_required_field_is_named() {
        let temp = TempDir::new().unwrap();
        let body = r#"{"name":"foo","version":"1.0","release":"1","source":"s"}"#;
        write_descriptor(temp.path(), "foo", body);
        let err = ProjectConfig::load(temp.path(), "foo").unwrap_err();
        assert!(matches!(err, Error::MissingField { field: "dist", .. }), "{err}");
    }

    #[test]
    fn empty_required_field_is_missing() {
        let temp = TempDir::new().unwrap();
        let body = r#"{"name":"foo","version":" ","release":"1","dist":"el7","source":"s"}"#;
        write_descriptor(temp.path(), "foo", body);
        let err = ProjectConfig::load(temp.path(), "foo").unwrap_err();
        assert!(matches!(err, Error::MissingField { field: "version", .. }));
    }

    #[test]
    fn numeric_version_is_rejected_not_coerced() {
        let temp = TempDir::new().unwrap();
        let body = r#"{"name":"foo","version":1.0,"release":"1","dist":"el7","source":"s"}"#;
        write_descriptor(temp.path(), "foo", body);
        assert!(ProjectConfig::load(temp.path(), "foo").is_err());
    }

    #[test]
    fn unknown_key_lookup_fails() {
        let temp = TempDir::new().unwrap();
        write_descriptor(temp.path(), "foo", FOO);
        let config = ProjectConfig::load(temp.path(), "foo").unwrap();
        assert!(matches!(config.get("arch"), Err(Error::UnknownKey(k)) if k == "arch"));
    }

    #[test]
    fn pipeline_keys_are_assigned_once() {
        let temp = TempDir::new().unwrap();
        write_descriptor(temp.path(), "foo", FOO);
        let mut config = ProjectConfig::load(temp.path(), "foo").unwrap();

        assert!(matches!(config.get("resultdir"), Err(Error::Unassigned(_))));
        config.set("resultdir", "/tmp/result").unwrap();
        assert_eq!(config.get("resultdir").unwrap(), "/tmp/result");
        assert!(matches!(
            config.set("resultdir", "/tmp/other"),
            Err(Error::AlreadyAssigned(_))
        ));
        assert!(matches!(config.set("name", "bar"), Err(Error::NotAssignable(k)) if k == "name"));
        assert_eq!(config.name(), "foo");
    }

    #[test]
    fn snapshot_lists_assigned_keys_only() {
        let temp = TempDir::new().unwrap();
        write_descriptor(temp.path(), "foo", FOO);
        let mut config = ProjectConfig::load(temp.path(), "foo").unwrap();
        config.set("spec", "/work/foo/foo.spec").unwrap();

        let snapshot = config.snapshot();
        assert_eq!(snapshot.get("name").map(String::as_str), Some("foo"));
        assert_eq!(snapshot.get("spec").map(String::as_str), Some("/work/foo/foo.spec"));
        assert!(!snapshot.contains_key("configdir"));
        assert_eq!(snapshot.len(), 6);
    }
}
