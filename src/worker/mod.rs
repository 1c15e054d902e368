// src/worker/mod.rs

//! Worker launch layer.
//!
//! A worker is an isolated execution unit running the compiled artifact. It
//! shares no state with the coordinator; everything flows over three
//! one-directional channels allocated per launch attempt:
//!
//! - exit: fires once when the worker terminates, for any reason.
//! - fault: uncaught faults that did not terminate the worker.
//! - message: application-level values, normally one integer status.
//!
//! [`worker_channels`] creates a fresh set. The worker keeps the
//! [`WorkerPorts`] half, the coordinator keeps the [`WorkerHandle`] half.
//!
//! - [`process`] launches the artifact as an OS child process.
//! - [`protocol`] is the stdout line format a process worker uses to talk
//!   back over the channels.

pub mod process;
pub mod protocol;

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

pub use process::ProcessLauncher;

/// Value delivered on the message channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerMessage {
    /// The worker's own completion status.
    Status(i32),
    /// Anything that is not an integer status.
    Other(String),
}

/// An uncaught fault reported by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerFault {
    pub error: String,
    pub stack_trace: String,
}

impl WorkerFault {
    pub fn new(error: impl Into<String>, stack_trace: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            stack_trace: stack_trace.into(),
        }
    }
}

/// Worker side of a channel set.
///
/// Sends never block and silently drop values once the coordinator has
/// released its handle.
#[derive(Debug)]
pub struct WorkerPorts {
    exit: oneshot::Sender<()>,
    faults: mpsc::UnboundedSender<WorkerFault>,
    messages: mpsc::UnboundedSender<WorkerMessage>,
}

impl WorkerPorts {
    pub fn send_message(&self, message: WorkerMessage) {
        let _ = self.messages.send(message);
    }

    pub fn send_status(&self, status: i32) {
        self.send_message(WorkerMessage::Status(status));
    }

    pub fn send_fault(&self, fault: WorkerFault) {
        let _ = self.faults.send(fault);
    }

    /// Signal termination. Consumes the ports, closing all three channels.
    ///
    /// Dropping the ports without calling this is observed as an exit too.
    pub fn exit(self) {
        let _ = self.exit.send(());
    }
}

/// Coordinator side of a channel set.
#[derive(Debug)]
pub struct WorkerHandle {
    pub(crate) exit: oneshot::Receiver<()>,
    pub(crate) faults: mpsc::UnboundedReceiver<WorkerFault>,
    pub(crate) messages: mpsc::UnboundedReceiver<WorkerMessage>,
}

impl WorkerHandle {
    /// Stop accepting fault and message events.
    ///
    /// Values already queued can still be drained.
    pub fn close(&mut self) {
        self.faults.close();
        self.messages.close();
        self.exit.close();
    }
}

/// Allocate a fresh exit/fault/message channel set.
pub fn worker_channels() -> (WorkerPorts, WorkerHandle) {
    let (exit_tx, exit_rx) = oneshot::channel();
    let (fault_tx, fault_rx) = mpsc::unbounded_channel();
    let (message_tx, message_rx) = mpsc::unbounded_channel();

    (
        WorkerPorts {
            exit: exit_tx,
            faults: fault_tx,
            messages: message_tx,
        },
        WorkerHandle {
            exit: exit_rx,
            faults: fault_rx,
            messages: message_rx,
        },
    )
}

/// The worker could not be started at all (as opposed to failing while
/// running), e.g. because the artifact no longer matches the runtime.
#[derive(Debug, Error)]
#[error("could not launch worker from {}: {reason}", artifact.display())]
pub struct LaunchError {
    pub artifact: PathBuf,
    pub reason: String,
}

impl LaunchError {
    pub fn new(artifact: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            artifact: artifact.into(),
            reason: reason.into(),
        }
    }
}

/// Trait abstracting how a worker is started.
///
/// Production code uses [`ProcessLauncher`]; tests provide launchers that
/// drive the ports from a Tokio task instead of a real process.
pub trait WorkerLauncher: Send {
    /// Start a worker running `artifact` with `args`, bound to `ports`.
    ///
    /// On success the launcher owns `ports` for the lifetime of the worker
    /// and must eventually signal exit (or drop them). On failure the ports
    /// are dropped before returning.
    fn launch(
        &mut self,
        artifact: PathBuf,
        args: Vec<String>,
        ports: WorkerPorts,
    ) -> Pin<Box<dyn Future<Output = Result<(), LaunchError>> + Send + '_>>;
}
