use std::path::PathBuf;

/// The worker finished and reported success (also the value of a status
/// that was never set).
pub const SUCCESS: i32 = 0;

/// Status used when the worker hit an uncaught fault but never reported a
/// status of its own.
pub const FAULT_FALLBACK: i32 = 1;

/// Convention with the caller: re-invoke the whole bootstrap.
///
/// Never produced by the supervisor itself; only a worker can report it.
/// Matches `EX_TEMPFAIL` from `sysexits.h`.
pub const RESTART_REQUESTED: i32 = 75;

/// Unbuildable script, failed artifact creation or exhausted launch
/// retries. Matches `EX_CONFIG` from `sysexits.h`.
pub const CONFIG_ERROR: i32 = 78;

/// Fixed locations of the generated script and its compiled artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapPaths {
    pub script: PathBuf,
    pub artifact: PathBuf,
}
