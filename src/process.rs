//! External command execution.
//!
//! Every command is echoed to the run trace before it starts and waited on
//! to completion. Exit status zero is success; anything else, including
//! death by signal, is [`Error::BuildCommandFailed`] carrying the exact argv.
//! Nothing is retried.

use std::path::Path;
use std::process::{Command, Stdio};

use crate::error::{Error, Result};
use crate::trace;

/// How a command's standard streams are wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Streams {
    /// Share the parent's stdout/stderr.
    #[default]
    Inherit,
    /// Capture output; stderr is logged when the command fails.
    Capture,
}

/// Seam between the pipeline and the processes it launches.
pub trait CommandRunner {
    /// Run `argv` to completion, optionally inside `cwd`.
    fn run(&self, argv: &[String], cwd: Option<&Path>, streams: Streams) -> Result<()>;
}

/// Runs commands on the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, argv: &[String], cwd: Option<&Path>, streams: Streams) -> Result<()> {
        let (program, args) = argv.split_first().ok_or_else(|| Error::Config {
            path: cwd.map(Path::to_path_buf).unwrap_or_default(),
            reason: "empty command line".to_string(),
        })?;

        trace::command(argv);

        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let status = match streams {
            Streams::Inherit => cmd
                .stdin(Stdio::null())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .status()
                .map_err(|source| Error::Spawn {
                    program: program.clone(),
                    source,
                })?,
            Streams::Capture => {
                let output = cmd.stdin(Stdio::null()).output().map_err(|source| Error::Spawn {
                    program: program.clone(),
                    source,
                })?;
                if !output.status.success() {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    tracing::error!(command = %argv.join(" "), stderr = %stderr.trim(), "command failed");
                }
                output.status
            }
        };

        if status.success() {
            return Ok(());
        }
        Err(Error::BuildCommandFailed {
            argv: argv.to_vec(),
            status: status.code(),
        })
    }
}

/// Run `argv` on the host with inherited streams.
pub fn run(argv: &[String]) -> Result<()> {
    SystemRunner.run(argv, None, Streams::Inherit)
}
