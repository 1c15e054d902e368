//! Fake collaborators for the launch supervisor.
//!
//! All fakes record what they were asked to do behind an `Arc<Mutex<..>>`
//! so a test can keep a handle after moving the fake into the supervisor.

use std::collections::VecDeque;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use bootrun::artifact::{ArtifactCompiler, CompileOutput};
use bootrun::errors::{BootrunError, Result};
use bootrun::fs::mock::MockFileSystem;
use bootrun::fs::FileSystem;
use bootrun::script::ScriptGenerator;
use bootrun::worker::{LaunchError, WorkerFault, WorkerLauncher, WorkerMessage, WorkerPorts};

/// A generator that always yields the same script, or always refuses.
pub struct FakeGenerator {
    script: Option<String>,
    calls: Arc<Mutex<usize>>,
}

impl FakeGenerator {
    pub fn script(contents: &str) -> Self {
        Self {
            script: Some(contents.to_string()),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn cannot_build() -> Self {
        Self {
            script: None,
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<Mutex<usize>> {
        Arc::clone(&self.calls)
    }
}

impl ScriptGenerator for FakeGenerator {
    fn generate(&mut self) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
        *self.calls.lock().unwrap() += 1;
        let result = match &self.script {
            Some(contents) => Ok(contents.clone()),
            None => Err(BootrunError::CannotBuild("no build configuration".to_string())),
        };
        Box::pin(async move { result })
    }
}

/// How a [`FakeCompiler`] behaves on every invocation.
#[derive(Debug, Clone)]
pub enum CompilePlan {
    /// Write the artifact into the mock filesystem.
    Produce,
    /// Run "successfully" but leave no artifact, printing `stderr`.
    LeaveNothing { stderr: String },
    /// The compiler cannot even be started.
    FailToStart,
}

/// A compiler that writes into a shared [`MockFileSystem`].
pub struct FakeCompiler {
    fs: MockFileSystem,
    plan: CompilePlan,
    calls: Arc<Mutex<Vec<(PathBuf, PathBuf)>>>,
}

impl FakeCompiler {
    pub fn new(fs: MockFileSystem, plan: CompilePlan) -> Self {
        Self {
            fs,
            plan,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// `(artifact, script)` for every invocation.
    pub fn calls(&self) -> Arc<Mutex<Vec<(PathBuf, PathBuf)>>> {
        Arc::clone(&self.calls)
    }
}

impl ArtifactCompiler for FakeCompiler {
    fn compile(
        &mut self,
        artifact: PathBuf,
        script: PathBuf,
    ) -> Pin<Box<dyn Future<Output = Result<CompileOutput>> + Send + '_>> {
        self.calls
            .lock()
            .unwrap()
            .push((artifact.clone(), script.clone()));

        let result = match &self.plan {
            CompilePlan::Produce => {
                let source = self.fs.read_to_string(&script).unwrap_or_default();
                self.fs.add_file(&artifact, format!("compiled:{source}"));
                Ok(CompileOutput {
                    stderr: String::new(),
                    exit_code: Some(0),
                })
            }
            CompilePlan::LeaveNothing { stderr } => Ok(CompileOutput {
                stderr: stderr.clone(),
                exit_code: Some(1),
            }),
            CompilePlan::FailToStart => Err(BootrunError::Other(anyhow!(
                "spawning compiler 'fake': No such file or directory"
            ))),
        };
        Box::pin(async move { result })
    }
}

/// Something a fake worker does before it exits.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Message(WorkerMessage),
    Fault(WorkerFault),
}

impl WorkerEvent {
    pub fn status(code: i32) -> Self {
        WorkerEvent::Message(WorkerMessage::Status(code))
    }

    pub fn fault(error: &str, trace: &str) -> Self {
        WorkerEvent::Fault(WorkerFault::new(error, trace))
    }
}

/// Scripted outcome of one launch attempt.
#[derive(Debug, Clone)]
pub enum LaunchPlan {
    /// The launch itself fails with this reason.
    Fail(String),
    /// The worker starts, emits these events in order, then exits.
    Run(Vec<WorkerEvent>),
}

/// What the supervisor asked a [`FakeLauncher`] to start.
#[derive(Debug, Clone)]
pub struct LaunchRecord {
    pub artifact: PathBuf,
    pub args: Vec<String>,
    /// Whether the artifact existed when the launch was attempted.
    pub artifact_present: bool,
}

/// A launcher that plays back [`LaunchPlan`]s, one per attempt.
///
/// Once the plans run out every further launch fails.
pub struct FakeLauncher {
    fs: MockFileSystem,
    plans: VecDeque<LaunchPlan>,
    launches: Arc<Mutex<Vec<LaunchRecord>>>,
}

impl FakeLauncher {
    pub fn new(fs: MockFileSystem, plans: Vec<LaunchPlan>) -> Self {
        Self {
            fs,
            plans: plans.into(),
            launches: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn launches(&self) -> Arc<Mutex<Vec<LaunchRecord>>> {
        Arc::clone(&self.launches)
    }
}

impl WorkerLauncher for FakeLauncher {
    fn launch(
        &mut self,
        artifact: PathBuf,
        args: Vec<String>,
        ports: WorkerPorts,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<(), LaunchError>> + Send + '_>> {
        self.launches.lock().unwrap().push(LaunchRecord {
            artifact: artifact.clone(),
            args,
            artifact_present: self.fs.exists(&artifact),
        });

        let plan = self
            .plans
            .pop_front()
            .unwrap_or_else(|| LaunchPlan::Fail("no launch plan left".to_string()));

        Box::pin(async move {
            match plan {
                LaunchPlan::Fail(reason) => {
                    drop(ports);
                    Err(LaunchError::new(artifact, reason))
                }
                LaunchPlan::Run(events) => {
                    tokio::spawn(play_worker(events, ports));
                    Ok(())
                }
            }
        })
    }
}

async fn play_worker(events: Vec<WorkerEvent>, ports: WorkerPorts) {
    for event in events {
        match event {
            WorkerEvent::Message(message) => ports.send_message(message),
            WorkerEvent::Fault(fault) => ports.send_fault(fault),
        }
        tokio::task::yield_now().await;
    }
    ports.exit();
}

/// `artifact_present` of every recorded launch, in order.
pub fn launched_artifact_states(launches: &Arc<Mutex<Vec<LaunchRecord>>>) -> Vec<bool> {
    launches
        .lock()
        .unwrap()
        .iter()
        .map(|record| record.artifact_present)
        .collect()
}
