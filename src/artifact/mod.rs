// src/artifact/mod.rs

//! Cache of the compiled build script.
//!
//! The artifact lives at a fixed path and is reused across runs. It is only
//! created when missing and only deleted by the supervisor after a failed
//! launch (see [`ArtifactCache::invalidate`]).

pub mod compiler;

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error};

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::types::{BootstrapPaths, CONFIG_ERROR, SUCCESS};

pub use compiler::{ArtifactCompiler, CompileOutput, ProcessCompiler};

#[derive(Debug)]
pub struct ArtifactCache<C: ArtifactCompiler> {
    fs: Arc<dyn FileSystem>,
    compiler: C,
    paths: BootstrapPaths,
}

impl<C: ArtifactCompiler> ArtifactCache<C> {
    pub fn new(fs: Arc<dyn FileSystem>, compiler: C, paths: BootstrapPaths) -> Self {
        Self {
            fs,
            compiler,
            paths,
        }
    }

    pub fn artifact_path(&self) -> &Path {
        &self.paths.artifact
    }

    pub fn script_path(&self) -> &Path {
        &self.paths.script
    }

    pub fn is_present(&self) -> bool {
        self.fs.exists(&self.paths.artifact)
    }

    /// Make sure a launchable artifact exists.
    ///
    /// Returns [`SUCCESS`] when the artifact was already there or the
    /// compiler produced it, [`CONFIG_ERROR`] otherwise. Never retries.
    pub async fn ensure_artifact(&mut self) -> i32 {
        if self.is_present() {
            debug!(artifact = %self.paths.artifact.display(), "reusing compiled build script");
            return SUCCESS;
        }

        let artifact = self.paths.artifact.clone();
        let script = self.paths.script.clone();

        let (diagnostics, exit_code) = match self.compiler.compile(artifact, script).await {
            Ok(output) => (output.stderr, output.exit_code),
            Err(e) => (format!("{e:#}"), None),
        };

        if self.is_present() {
            return SUCCESS;
        }

        error!(
            artifact = %self.paths.artifact.display(),
            script = %self.paths.script.display(),
            exit_code = ?exit_code,
            "failed to precompile the build script"
        );
        let diagnostics = diagnostics.trim();
        if !diagnostics.is_empty() {
            error!("{}", diagnostics);
        }
        CONFIG_ERROR
    }

    /// Delete the artifact so the next `ensure_artifact` rebuilds it.
    pub fn invalidate(&self) -> Result<()> {
        self.fs.remove_file(&self.paths.artifact)?;
        debug!(artifact = %self.paths.artifact.display(), "compiled build script deleted");
        Ok(())
    }
}
