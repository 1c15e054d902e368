// src/supervisor/aggregator.rs

//! Reduction of a running worker's channels into one exit status.

use std::io::Write;

use tracing::{debug, warn};

use crate::errors::{BootrunError, Result};
use crate::types::{FAULT_FALLBACK, SUCCESS};
use crate::worker::{WorkerFault, WorkerHandle, WorkerMessage};

use super::diagnostics::render_fault;

/// Owns the status cell of a single worker run.
///
/// The cell starts unset. A status message assigns it; a fault only moves
/// it to [`FAULT_FALLBACK`] while it is still unset. An unset cell resolves
/// to [`SUCCESS`].
#[derive(Debug, Default)]
pub struct ResultAggregator {
    status: Option<i32>,
    faults: usize,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of the cell, if any.
    pub fn status(&self) -> Option<i32> {
        self.status
    }

    /// Number of faults seen so far.
    pub fn fault_count(&self) -> usize {
        self.faults
    }

    pub fn apply_message(&mut self, message: WorkerMessage) -> Result<()> {
        match message {
            WorkerMessage::Status(code) => {
                if let Some(previous) = self.status {
                    debug!(previous, code, "worker reported status more than once");
                }
                self.status = Some(code);
                Ok(())
            }
            WorkerMessage::Other(value) => Err(BootrunError::ProtocolViolation(format!(
                "expected an integer status on the message channel, got {value:?}"
            ))),
        }
    }

    pub fn apply_fault<W: Write>(&mut self, fault: &WorkerFault, err: &mut W) -> Result<()> {
        self.faults += 1;
        err.write_all(render_fault(fault).as_bytes())?;
        err.flush()?;

        if self.status.is_none() {
            self.status = Some(FAULT_FALLBACK);
        }
        Ok(())
    }

    /// Final status once the worker has exited.
    pub fn finish(self) -> i32 {
        self.status.unwrap_or(SUCCESS)
    }

    /// Listen on all three channels of `handle` until the worker exits.
    ///
    /// Faults and messages the worker sent before terminating are applied
    /// even if the exit event happens to be observed first.
    pub async fn run<W: Write>(mut self, mut handle: WorkerHandle, err: &mut W) -> Result<i32> {
        loop {
            tokio::select! {
                biased;

                Some(message) = handle.messages.recv() => self.apply_message(message)?,
                Some(fault) = handle.faults.recv() => self.apply_fault(&fault, err)?,
                _ = &mut handle.exit => break,
            }
        }

        handle.close();
        while let Ok(message) = handle.messages.try_recv() {
            self.apply_message(message)?;
        }
        while let Ok(fault) = handle.faults.try_recv() {
            self.apply_fault(&fault, err)?;
        }

        if self.fault_count() > 0 {
            warn!(
                status = ?self.status,
                faults = self.fault_count(),
                "worker reported uncaught faults"
            );
        } else {
            debug!(status = ?self.status, "worker exited");
        }
        Ok(self.finish())
    }
}

/// Convenience wrapper: aggregate `handle` with a fresh cell.
pub async fn aggregate<W: Write>(handle: WorkerHandle, err: &mut W) -> Result<i32> {
    ResultAggregator::new().run(handle, err).await
}
