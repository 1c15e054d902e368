// src/script/mod.rs

//! Build-script generation and materialization.
//!
//! The script text itself comes from an external generator. This module
//! only defines the seam ([`ScriptGenerator`]), the production generator
//! that shells out to a configured command, and [`materialize`], which
//! writes the text to its fixed location.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::{BootrunError, Result};
use crate::fs::FileSystem;

/// Produces the source text of the build script.
///
/// Implementations signal an unbuildable project with
/// [`BootrunError::CannotBuild`]; any other error is treated as an
/// unexpected failure by the supervisor.
pub trait ScriptGenerator: Send {
    fn generate(&mut self) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>>;
}

/// Generator that runs a shell command and uses its stdout as the script.
///
/// A non-zero exit status (or a command that cannot be started) means the
/// project cannot be built; the command's stderr becomes the reason.
#[derive(Debug, Clone)]
pub struct CommandScriptGenerator {
    cmd: String,
    working_dir: PathBuf,
}

impl CommandScriptGenerator {
    pub fn new(cmd: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            cmd: cmd.into(),
            working_dir: working_dir.into(),
        }
    }
}

impl ScriptGenerator for CommandScriptGenerator {
    fn generate(&mut self) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
        Box::pin(async move {
            debug!(cmd = %self.cmd, "generating build script");

            let mut command = shell_command(&self.cmd);
            command
                .current_dir(&self.working_dir)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());

            let output = command.output().await.map_err(|e| {
                BootrunError::CannotBuild(format!(
                    "failed to run script generator '{}': {e}",
                    self.cmd
                ))
            })?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                let code = output.status.code().unwrap_or(-1);
                return Err(BootrunError::CannotBuild(if stderr.is_empty() {
                    format!("script generator exited with status {code}")
                } else {
                    stderr
                }));
            }

            String::from_utf8(output.stdout).map_err(|e| {
                BootrunError::CannotBuild(format!("script generator produced invalid UTF-8: {e}"))
            })
        })
    }
}

/// Build a shell command appropriate for the platform.
pub(crate) fn shell_command(line: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(line);
        c
    }
}

/// Write the script to `path` unless the file already holds exactly
/// `contents`.
///
/// Returns whether the file was (re)written.
pub fn materialize(fs: &dyn FileSystem, path: &Path, contents: &str) -> Result<bool> {
    if fs.exists(path) {
        match fs.read_to_string(path) {
            Ok(existing) if existing == contents => {
                debug!(script = %path.display(), "build script unchanged");
                return Ok(false);
            }
            Ok(_) => {}
            Err(e) => {
                debug!(
                    script = %path.display(),
                    error = %e,
                    "could not read the existing build script; overwriting it"
                );
            }
        }
    }

    fs.write(path, contents.as_bytes())?;
    info!(script = %path.display(), "build script updated");
    Ok(true)
}
