#![allow(dead_code)]

use std::path::PathBuf;

use bootrun::config::{
    CompilerSection, ConfigFile, GeneratorSection, PathsSection, RawConfigFile, WorkerSection,
};
use bootrun::types::BootstrapPaths;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                paths: PathsSection::default(),
                generator: GeneratorSection {
                    cmd: "cat build.template".to_string(),
                },
                compiler: CompilerSection {
                    program: "runtime".to_string(),
                    args: vec![],
                },
                worker: WorkerSection::default(),
            },
        }
    }

    pub fn script_path(mut self, path: &str) -> Self {
        self.config.paths.script = PathBuf::from(path);
        self
    }

    pub fn artifact_path(mut self, path: &str) -> Self {
        self.config.paths.artifact = PathBuf::from(path);
        self
    }

    pub fn generator_cmd(mut self, cmd: &str) -> Self {
        self.config.generator.cmd = cmd.to_string();
        self
    }

    pub fn compiler(mut self, program: &str, args: &[&str]) -> Self {
        self.config.compiler.program = program.to_string();
        self.config.compiler.args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn worker_runtime(mut self, runtime: &str) -> Self {
        self.config.worker.runtime = Some(runtime.to_string());
        self
    }

    /// The unvalidated config, for exercising validation failures.
    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed script/artifact locations used with the mock filesystem.
pub fn mock_paths() -> BootstrapPaths {
    BootstrapPaths {
        script: PathBuf::from("/project/.bootrun/entrypoint/build.script"),
        artifact: PathBuf::from("/project/.bootrun/entrypoint/build.snapshot"),
    }
}
