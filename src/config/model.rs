// src/config/model.rs

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::types::BootstrapPaths;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [paths]
/// script = ".bootrun/entrypoint/build.script"
/// artifact = ".bootrun/entrypoint/build.snapshot"
///
/// [generator]
/// cmd = "my-tool generate-build-script"
///
/// [compiler]
/// program = "my-runtime"
///
/// [worker]
/// runtime = "my-runtime"
/// ```
///
/// This is the unvalidated form; convert with `ConfigFile::try_from`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub paths: PathsSection,

    pub generator: GeneratorSection,

    pub compiler: CompilerSection,

    #[serde(default)]
    pub worker: WorkerSection,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub paths: PathsSection,
    pub generator: GeneratorSection,
    pub compiler: CompilerSection,
    pub worker: WorkerSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            paths: raw.paths,
            generator: raw.generator,
            compiler: raw.compiler,
            worker: raw.worker,
        }
    }

    /// Script and artifact locations, with relative paths resolved against
    /// `root` (normally the directory holding the config file).
    pub fn bootstrap_paths(&self, root: &Path) -> BootstrapPaths {
        BootstrapPaths {
            script: root.join(&self.paths.script),
            artifact: root.join(&self.paths.artifact),
        }
    }
}

/// `[paths]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    /// Where the generated build script is written.
    #[serde(default = "default_script_path")]
    pub script: PathBuf,

    /// Where the compiled build script is cached.
    #[serde(default = "default_artifact_path")]
    pub artifact: PathBuf,
}

fn default_script_path() -> PathBuf {
    PathBuf::from(".bootrun/entrypoint/build.script")
}

fn default_artifact_path() -> PathBuf {
    PathBuf::from(".bootrun/entrypoint/build.snapshot")
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            script: default_script_path(),
            artifact: default_artifact_path(),
        }
    }
}

/// `[generator]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorSection {
    /// Shell command whose stdout is the build script.
    pub cmd: String,
}

/// `[compiler]` section.
///
/// The compiler is invoked as `program args... --snapshot=<artifact> <script>`.
#[derive(Debug, Clone, Deserialize)]
pub struct CompilerSection {
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,
}

/// `[worker]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct WorkerSection {
    /// Program used to run the artifact. If `None`, the artifact is
    /// executed directly.
    #[serde(default)]
    pub runtime: Option<String>,
}
