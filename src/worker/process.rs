// src/worker/process.rs

//! Worker launcher backed by an OS child process.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::{debug, info, warn};

use super::protocol::{parse_line, Frame};
use super::{LaunchError, WorkerFault, WorkerLauncher, WorkerMessage, WorkerPorts};

/// Lines of worker stderr kept for a launch error.
const MAX_CAPTURED_STDERR_LINES: usize = 20;

type StdoutLines = Lines<BufReader<ChildStdout>>;

/// Runs the artifact as a child process.
///
/// - Without a runtime the artifact itself is executed.
/// - With a runtime, `<runtime> <artifact> args...` is executed instead.
///
/// stdout is parsed with the [`protocol`](super::protocol); stdin is
/// inherited and stderr is echoed to ours.
///
/// `launch` only succeeds once the worker has confirmed it is running by
/// printing a protocol line (normally the ready line). A process that exits
/// unsuccessfully before that, e.g. a runtime rejecting an artifact built
/// by another version, is reported as a [`LaunchError`].
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher {
    runtime: Option<String>,
}

impl ProcessLauncher {
    pub fn new(runtime: Option<String>) -> Self {
        Self { runtime }
    }
}

enum Handshake {
    Confirmed { reported_status: bool },
    ClosedEarly,
}

impl WorkerLauncher for ProcessLauncher {
    fn launch(
        &mut self,
        artifact: PathBuf,
        args: Vec<String>,
        ports: WorkerPorts,
    ) -> Pin<Box<dyn Future<Output = Result<(), LaunchError>> + Send + '_>> {
        Box::pin(async move {
            let mut cmd = match &self.runtime {
                Some(runtime) => {
                    let mut c = Command::new(runtime);
                    c.arg(&artifact);
                    c
                }
                None => Command::new(&artifact),
            };

            cmd.args(&args)
                .stdin(Stdio::inherit())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);

            let mut child = cmd
                .spawn()
                .map_err(|e| LaunchError::new(&artifact, e.to_string()))?;

            info!(
                artifact = %artifact.display(),
                pid = ?child.id(),
                "worker process started"
            );

            let stderr = child.stderr.take().map(|s| tokio::spawn(pump_stderr(s)));
            let Some(stdout) = child.stdout.take() else {
                return Err(LaunchError::new(&artifact, "worker stdout was not captured"));
            };
            let mut lines = BufReader::new(stdout).lines();

            match await_handshake(&mut lines, &ports).await {
                Handshake::Confirmed { reported_status } => {
                    debug!(artifact = %artifact.display(), "worker confirmed start");
                    tokio::spawn(supervise_child(child, lines, ports, reported_status));
                    Ok(())
                }
                Handshake::ClosedEarly => {
                    let status = child
                        .wait()
                        .await
                        .map_err(|e| LaunchError::new(&artifact, e.to_string()))?;

                    if status.success() {
                        debug!("worker finished without reporting anything");
                        ports.exit();
                        return Ok(());
                    }

                    let captured = match stderr {
                        Some(task) => task.await.unwrap_or_default(),
                        None => Vec::new(),
                    };
                    Err(early_exit_error(&artifact, status, &captured))
                }
            }
        })
    }
}

/// Read stdout until the worker prints its first protocol line.
///
/// Plain output is echoed. A status or fault line counts as confirmation
/// and is forwarded to `ports`.
async fn await_handshake(lines: &mut StdoutLines, ports: &WorkerPorts) -> Handshake {
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match parse_line(&line) {
                Some(Frame::Ready) => return Handshake::Confirmed { reported_status: false },
                Some(Frame::Message(message)) => {
                    let reported_status = matches!(message, WorkerMessage::Status(_));
                    ports.send_message(message);
                    return Handshake::Confirmed { reported_status };
                }
                Some(Frame::Fault(fault)) => {
                    ports.send_fault(fault);
                    return Handshake::Confirmed { reported_status: false };
                }
                None => println!("{line}"),
            },
            Ok(None) => return Handshake::ClosedEarly,
            Err(e) => {
                warn!(error = %e, "failed to read worker stdout");
                return Handshake::ClosedEarly;
            }
        }
    }
}

fn early_exit_error(artifact: &Path, status: ExitStatus, stderr: &[String]) -> LaunchError {
    let mut reason = match status.code() {
        Some(code) => format!("worker exited with status {code} before confirming start"),
        None => "worker was terminated by a signal before confirming start".to_string(),
    };
    if !stderr.is_empty() {
        reason.push_str(": ");
        reason.push_str(&stderr.join("\n"));
    }
    LaunchError::new(artifact, reason)
}

/// Echo the worker's stderr until EOF, returning its first lines.
async fn pump_stderr(stderr: ChildStderr) -> Vec<String> {
    let mut captured = Vec::new();
    let mut lines = BufReader::new(stderr).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                eprintln!("{line}");
                if captured.len() < MAX_CAPTURED_STDERR_LINES {
                    captured.push(line);
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "failed to read worker stderr");
                break;
            }
        }
    }
    captured
}

/// Pump the rest of the child's stdout into the ports until EOF, then wait
/// for it and fire the exit channel.
///
/// Everything the worker printed is forwarded before exit fires, so the
/// coordinator sees every report that precedes termination.
async fn supervise_child(
    mut child: Child,
    mut lines: StdoutLines,
    ports: WorkerPorts,
    mut reported_status: bool,
) {
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match parse_line(&line) {
                Some(Frame::Message(message)) => {
                    reported_status |= matches!(message, WorkerMessage::Status(_));
                    ports.send_message(message);
                }
                Some(Frame::Fault(fault)) => ports.send_fault(fault),
                Some(Frame::Ready) => debug!("ignoring repeated ready line"),
                None => println!("{line}"),
            },
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "failed to read worker stdout");
                break;
            }
        }
    }

    match child.wait().await {
        Ok(status) => {
            let code = status.code();
            info!(exit_code = ?code, success = status.success(), "worker process exited");

            if !status.success() && !reported_status {
                let error = match code {
                    Some(code) => format!("worker process exited with status {code}"),
                    None => "worker process was terminated by a signal".to_string(),
                };
                ports.send_fault(WorkerFault::new(error, ""));
            }
        }
        Err(e) => {
            warn!(error = %e, "failed to wait for worker process");
            ports.send_fault(WorkerFault::new(format!("lost track of worker process: {e}"), ""));
        }
    }

    debug!("signalling worker exit");
    ports.exit();
}
