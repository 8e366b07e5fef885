//! Preflight checks run before any staging happens.
//!
//! Validates that the host has the programs the command templates invoke, so
//! a missing `mock` or `createrepo` surfaces up front instead of after the
//! sources have been downloaded.
//!
//! # Example
//!
//! ```rust
//! use lakehead::preflight::{command_exists, check_required_tools};
//!
//! if !command_exists("mock") {
//!     println!("mock not installed");
//! }
//!
//! let tools = &[("mock", "mock"), ("createrepo", "createrepo_c")];
//! if let Err(e) = check_required_tools(tools) {
//!     eprintln!("{}", e);
//! }
//! ```

use crate::error::{Error, Result};
use crate::settings::Settings;

/// Check if a command exists on the host system.
///
/// Absolute and relative paths are checked directly, bare names through
/// `PATH`.
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Packages that usually provide the programs lakehead drives.
///
/// Each tuple is (command_name, package_name).
pub const KNOWN_TOOLS: &[(&str, &str)] = &[
    ("mock", "mock"),
    ("createrepo", "createrepo_c"),
    ("createrepo_c", "createrepo_c"),
];

/// Check that specific tools are available.
///
/// # Returns
///
/// * `Ok(())` if all tools are found
/// * `Err` with list of missing tools and their packages
pub fn check_required_tools(tools: &[(&str, &str)]) -> Result<()> {
    let mut missing = Vec::new();

    for (tool, package) in tools {
        if !command_exists(tool) {
            missing.push((*tool, *package));
        }
    }

    if !missing.is_empty() {
        let msg = missing
            .iter()
            .map(|(t, p)| format!("  {} (install: {})", t, p))
            .collect::<Vec<_>>()
            .join("\n");
        return Err(Error::MissingTools(msg));
    }

    Ok(())
}

/// Check the programs named by every command template in `settings`.
pub fn check_settings_tools(settings: &Settings) -> Result<()> {
    let mut programs: Vec<&str> = [
        &settings.srpm_command,
        &settings.rpm_command,
        &settings.metadata_command,
    ]
    .into_iter()
    .filter_map(|argv| argv.first().map(String::as_str))
    .collect();
    programs.sort_unstable();
    programs.dedup();

    let tools: Vec<(&str, &str)> = programs
        .into_iter()
        .map(|program| (program, package_hint(program)))
        .collect();
    check_required_tools(&tools)
}

fn package_hint(program: &str) -> &str {
    KNOWN_TOOLS
        .iter()
        .find(|(tool, _)| *tool == program)
        .map(|(_, package)| *package)
        .unwrap_or(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_command_exists() {
        // 'sh' should exist on any Unix system
        assert!(command_exists("sh"));
        assert!(!command_exists("definitely_not_a_real_command_12345"));
    }

    #[test]
    fn test_check_required_tools_success() {
        let tools = &[("sh", "coreutils"), ("cat", "coreutils")];
        assert!(check_required_tools(tools).is_ok());
    }

    #[test]
    fn test_check_required_tools_failure_names_package() {
        let tools = &[("nonexistent_command_xyz", "fake-package")];
        let err = check_required_tools(tools).unwrap_err();
        assert!(err.to_string().contains("install: fake-package"));
    }

    #[test]
    fn test_check_settings_tools_uses_template_programs() {
        let mut settings = Settings::defaults(Path::new("/"));
        settings.srpm_command = vec!["sh".into()];
        settings.rpm_command = vec!["sh".into(), "-c".into(), "true".into()];
        settings.metadata_command = vec!["cat".into()];
        assert!(check_settings_tools(&settings).is_ok());

        settings.metadata_command = vec!["nonexistent_createrepo_xyz".into()];
        assert!(matches!(
            check_settings_tools(&settings),
            Err(Error::MissingTools(_))
        ));
    }

    #[test]
    fn test_package_hint() {
        assert_eq!(package_hint("createrepo"), "createrepo_c");
        assert_eq!(package_hint("custom-tool"), "custom-tool");
    }
}
