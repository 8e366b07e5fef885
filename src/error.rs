//! Error type shared by every pipeline component.
//!
//! Variants group into the failure classes the pipeline distinguishes:
//! configuration, fetch, external command, staging, artifact collection and
//! publishing. Staging *cleanup* failures never show up here; they are logged
//! and dropped where they happen.

use std::path::PathBuf;

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while staging, building or publishing a project.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A descriptor or settings file is missing or malformed.
    #[error("invalid configuration '{}': {reason}", path.display())]
    Config {
        /// File that failed to load.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// A required descriptor field is absent or empty.
    #[error("project descriptor '{}' is missing required field '{field}'", path.display())]
    MissingField {
        /// Descriptor file.
        path: PathBuf,
        /// Name of the absent field.
        field: &'static str,
    },

    /// A template or lookup asked for a key the project does not declare.
    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),

    /// A declared pipeline key was read before the pipeline assigned it.
    #[error("configuration key '{0}' has not been assigned yet")]
    Unassigned(String),

    /// A descriptor key was targeted by an assignment; only pipeline keys
    /// can be assigned.
    #[error("configuration key '{0}' is not assignable")]
    NotAssignable(String),

    /// A pipeline-assigned key was written twice.
    #[error("configuration key '{0}' is already assigned")]
    AlreadyAssigned(String),

    /// A source or builder-config reference could not be retrieved.
    #[error("failed to fetch '{reference}': {reason}")]
    Fetch {
        /// The reference as written in the descriptor.
        reference: String,
        /// What went wrong.
        reason: String,
    },

    /// A remote reference answered 404.
    #[error("source not found: {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// An external command exited with a non-zero status.
    #[error("command failed ({}): {}", describe_status(*status), argv.join(" "))]
    BuildCommandFailed {
        /// The exact argv that was executed.
        argv: Vec<String>,
        /// Exit code, `None` when the process was killed by a signal.
        status: Option<i32>,
    },

    /// An external command could not be started at all.
    #[error("failed to execute '{program}'")]
    Spawn {
        /// Program name from argv[0].
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A staging area or working directory could not be created or entered.
    #[error("staging directory '{}' unavailable", path.display())]
    Staging {
        /// Directory involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The result directory does not hold a valid artifact set.
    #[error("invalid build results in '{}': {reason}", dir.display())]
    Artifacts {
        /// Result directory that was scanned.
        dir: PathBuf,
        /// What was wrong with its contents.
        reason: String,
    },

    /// Copying into the repository tree or locking a subtree failed.
    #[error("failed to publish into '{}'", path.display())]
    Publish {
        /// Repository path involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Host tools named by the command templates are not installed.
    #[error("missing required host tools:\n{0}")]
    MissingTools(String),

    /// SIGINT or SIGTERM was received while the pipeline was running.
    #[error("interrupted")]
    Interrupted,

    /// Any other filesystem failure.
    #[error("{context}")]
    Io {
        /// What was being done.
        context: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether this error belongs to the configuration family.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config { .. }
                | Self::MissingField { .. }
                | Self::UnknownKey(_)
                | Self::Unassigned(_)
                | Self::NotAssignable(_)
                | Self::AlreadyAssigned(_)
        )
    }
}

fn describe_status(status: Option<i32>) -> String {
    match status {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_command_failed_mentions_argv_and_code() {
        let err = Error::BuildCommandFailed {
            argv: vec!["mock".into(), "--buildsrpm".into()],
            status: Some(30),
        };
        let text = err.to_string();
        assert!(text.contains("exit code 30"), "{text}");
        assert!(text.ends_with("mock --buildsrpm"), "{text}");
    }

    #[test]
    fn configuration_family() {
        assert!(Error::UnknownKey("nope".into()).is_configuration());
        assert!(Error::NotAssignable("name".into()).is_configuration());
        assert!(!Error::Interrupted.is_configuration());
    }
}
