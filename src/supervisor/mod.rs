// src/supervisor/mod.rs

//! Launch supervisor: the bounded retry loop around a worker launch.
//!
//! Each attempt walks `Materialize → EnsureArtifact → Spawn`:
//!
//! - Materialize: generate the build script and write it to its fixed path.
//!   An unbuildable project ends the whole operation with [`CONFIG_ERROR`].
//! - EnsureArtifact: delegate to [`ArtifactCache`]; a non-zero status is
//!   returned as is.
//! - Spawn: allocate a fresh channel set and launch the worker.
//!   [`SpawnOutcome::Spawned`] hands over to the [`aggregator`];
//!   [`SpawnOutcome::SpawnFailed`] deletes the artifact and either retries
//!   or gives up after [`MAX_ATTEMPTS`]. If the artifact cannot be deleted
//!   the run ends with [`CONFIG_ERROR`] right away.

pub mod aggregator;
pub mod diagnostics;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::artifact::{ArtifactCache, ArtifactCompiler};
use crate::errors::{BootrunError, Result};
use crate::fs::FileSystem;
use crate::script::{materialize, ScriptGenerator};
use crate::types::{BootstrapPaths, CONFIG_ERROR, SUCCESS};
use crate::worker::{worker_channels, LaunchError, WorkerHandle, WorkerLauncher};

pub use aggregator::{aggregate, ResultAggregator};

/// Total number of launch attempts per invocation.
pub const MAX_ATTEMPTS: u32 = 2;

/// Result of the `Spawn` state.
#[derive(Debug)]
pub enum SpawnOutcome {
    Spawned(WorkerHandle),
    SpawnFailed(LaunchError),
}

#[derive(Debug)]
pub struct LaunchSupervisor<G, C, L>
where
    C: ArtifactCompiler,
{
    fs: Arc<dyn FileSystem>,
    generator: G,
    cache: ArtifactCache<C>,
    launcher: L,
}

impl<G, C, L> LaunchSupervisor<G, C, L>
where
    G: ScriptGenerator,
    C: ArtifactCompiler,
    L: WorkerLauncher,
{
    pub fn new(
        fs: Arc<dyn FileSystem>,
        paths: BootstrapPaths,
        generator: G,
        compiler: C,
        launcher: L,
    ) -> Self {
        let cache = ArtifactCache::new(Arc::clone(&fs), compiler, paths);
        Self {
            fs,
            generator,
            cache,
            launcher,
        }
    }

    pub fn artifact_cache(&self) -> &ArtifactCache<C> {
        &self.cache
    }

    /// Bootstrap and supervise one worker run, returning its status.
    ///
    /// Worker faults go to `err`. `Err` is only returned for unexpected
    /// failures (filesystem errors, a broken worker protocol); every
    /// configuration or launch problem is reduced to a status.
    pub async fn run<W: Write>(&mut self, args: &[String], err: &mut W) -> Result<i32> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(attempt, "starting bootstrap attempt");

            if !self.materialize().await? {
                return Ok(CONFIG_ERROR);
            }

            let status = self.cache.ensure_artifact().await;
            if status != SUCCESS {
                return Ok(status);
            }

            match self.spawn(args).await {
                SpawnOutcome::Spawned(handle) => {
                    return aggregate(handle, err).await;
                }
                SpawnOutcome::SpawnFailed(launch_error) => {
                    if let Err(e) = self.cache.invalidate() {
                        error!(
                            attempt,
                            launch_error = %launch_error,
                            error = %e,
                            artifact = %self.cache.artifact_path().display(),
                            "failed to delete the compiled build script after a failed launch; \
                             delete it manually and try again"
                        );
                        return Ok(CONFIG_ERROR);
                    }

                    if attempt < MAX_ATTEMPTS {
                        warn!(
                            attempt,
                            error = %launch_error,
                            "error launching the build script worker, this is likely due to a \
                             runtime or toolchain update; deleting the compiled build script and retrying"
                        );
                        continue;
                    }

                    error!(
                        attempt,
                        error = %launch_error,
                        artifact = %self.cache.artifact_path().display(),
                        "failed to launch the build script worker after retrying; this is likely \
                         caused by a misconfigured dependency, inspect the compiled build script \
                         location for details"
                    );
                    return Ok(CONFIG_ERROR);
                }
            }
        }
    }

    /// `Materialize` state. Returns `false` when the project cannot be built.
    async fn materialize(&mut self) -> Result<bool> {
        let contents = match self.generator.generate().await {
            Ok(contents) => contents,
            Err(BootrunError::CannotBuild(reason)) => {
                error!(reason = %reason, "unable to generate the build script");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        materialize(self.fs.as_ref(), self.cache.script_path(), &contents)?;
        Ok(true)
    }

    /// `Spawn` state. A failed launch releases this attempt's channels
    /// before reporting.
    async fn spawn(&mut self, args: &[String]) -> SpawnOutcome {
        let (ports, mut handle) = worker_channels();
        let artifact: PathBuf = self.cache.artifact_path().to_path_buf();

        match self.launcher.launch(artifact, args.to_vec(), ports).await {
            Ok(()) => {
                info!(artifact = %self.cache.artifact_path().display(), "build script worker launched");
                SpawnOutcome::Spawned(handle)
            }
            Err(launch_error) => {
                handle.close();
                drop(handle);
                SpawnOutcome::SpawnFailed(launch_error)
            }
        }
    }
}
