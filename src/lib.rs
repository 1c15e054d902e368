// src/lib.rs

pub mod artifact;
pub mod cli;
pub mod config;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod script;
pub mod supervisor;
pub mod types;
pub mod worker;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::artifact::ProcessCompiler;
use crate::cli::CliArgs;
use crate::config::{config_root_dir, load_and_validate, ConfigFile};
use crate::errors::Result;
use crate::fs::{FileSystem, RealFileSystem};
use crate::script::CommandScriptGenerator;
use crate::supervisor::LaunchSupervisor;
use crate::types::{BootstrapPaths, RESTART_REQUESTED, SUCCESS};
use crate::worker::ProcessLauncher;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the command-based script generator
/// - the process compiler and process launcher
/// - the launch supervisor
///
/// and returns the status the process should exit with. A worker reporting
/// [`RESTART_REQUESTED`] makes this function bootstrap again from scratch.
pub async fn run(args: CliArgs) -> Result<i32> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let root = config_root_dir(&config_path);
    let paths = cfg.bootstrap_paths(&root);

    if args.dry_run {
        print_dry_run(&cfg, &paths, &args.worker_args);
        return Ok(SUCCESS);
    }

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let generator = CommandScriptGenerator::new(cfg.generator.cmd.clone(), root.clone());
    let compiler = ProcessCompiler::new(cfg.compiler.program.clone(), cfg.compiler.args.clone());
    let launcher = ProcessLauncher::new(cfg.worker.runtime.clone());

    let mut supervisor = LaunchSupervisor::new(fs, paths, generator, compiler, launcher);
    let mut stderr = std::io::stderr();

    loop {
        let status = supervisor.run(&args.worker_args, &mut stderr).await?;
        if status != RESTART_REQUESTED {
            info!(status, "build script worker finished");
            return Ok(status);
        }
        info!("build script worker requested a restart; bootstrapping again");
    }
}

/// Simple dry-run output: print resolved paths and commands.
fn print_dry_run(cfg: &ConfigFile, paths: &BootstrapPaths, worker_args: &[String]) {
    println!("bootrun dry-run");
    println!("  script:   {}", paths.script.display());
    println!("  artifact: {}", paths.artifact.display());
    println!();

    println!("generator:");
    println!("  cmd: {}", cfg.generator.cmd);

    println!("compiler:");
    let mut compile_line = vec![cfg.compiler.program.clone()];
    compile_line.extend(cfg.compiler.args.iter().cloned());
    compile_line.push(format!("--snapshot={}", paths.artifact.display()));
    compile_line.push(paths.script.display().to_string());
    println!("  {}", compile_line.join(" "));

    println!("worker:");
    let mut launch_line = Vec::new();
    if let Some(ref runtime) = cfg.worker.runtime {
        launch_line.push(runtime.clone());
    }
    launch_line.push(paths.artifact.display().to_string());
    launch_line.extend(worker_args.iter().cloned());
    println!("  {}", launch_line.join(" "));

    debug!("dry-run complete (no execution)");
}
