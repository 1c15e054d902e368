// src/artifact/compiler.rs

//! Pluggable compiler abstraction.
//!
//! The artifact cache talks to an `ArtifactCompiler` instead of spawning
//! the compiler directly, so tests can swap in a fake that writes to a
//! `MockFileSystem` while production uses [`ProcessCompiler`].

use std::ffi::OsString;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Instant;

use anyhow::Context;
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::Result;

/// What a compiler invocation left behind besides (maybe) the artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOutput {
    /// Captured standard error of the compiler.
    pub stderr: String,
    /// Exit code of the compiler process, if it had one.
    ///
    /// Informational only: success is judged by the artifact existing.
    pub exit_code: Option<i32>,
}

/// Trait abstracting how a script is turned into a launchable artifact.
pub trait ArtifactCompiler: Send {
    /// Compile `script` into `artifact`.
    ///
    /// `Err` means the compiler could not be run at all.
    fn compile(
        &mut self,
        artifact: PathBuf,
        script: PathBuf,
    ) -> Pin<Box<dyn Future<Output = Result<CompileOutput>> + Send + '_>>;
}

/// Runs `<program> [args...] --snapshot=<artifact> <script>`.
#[derive(Debug, Clone)]
pub struct ProcessCompiler {
    program: String,
    args: Vec<String>,
}

impl ProcessCompiler {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl ArtifactCompiler for ProcessCompiler {
    fn compile(
        &mut self,
        artifact: PathBuf,
        script: PathBuf,
    ) -> Pin<Box<dyn Future<Output = Result<CompileOutput>> + Send + '_>> {
        Box::pin(async move {
            if let Some(parent) = artifact.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .with_context(|| format!("creating artifact dir {:?}", parent))?;
                }
            }

            let mut snapshot_flag = OsString::from("--snapshot=");
            snapshot_flag.push(&artifact);

            info!(
                program = %self.program,
                artifact = %artifact.display(),
                "precompiling build script"
            );
            let started = Instant::now();

            let output = Command::new(&self.program)
                .args(&self.args)
                .arg(snapshot_flag)
                .arg(&script)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output()
                .await
                .with_context(|| format!("spawning compiler '{}'", self.program))?;

            let stdout = String::from_utf8_lossy(&output.stdout);
            for line in stdout.lines() {
                debug!(program = %self.program, "compiler stdout: {}", line);
            }

            info!(
                exit_code = ?output.status.code(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "precompiling build script finished"
            );

            Ok(CompileOutput {
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                exit_code: output.status.code(),
            })
        })
    }
}
