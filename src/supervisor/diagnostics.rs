// src/supervisor/diagnostics.rs

//! Rendering of worker faults for the error stream.

use std::sync::LazyLock;

use regex::Regex;

use crate::worker::WorkerFault;

/// Printed before every uncaught worker fault.
pub const FAULT_BANNER: &str = "You have hit a bug in the build script worker.\n\
Please file an issue with the error and stack trace below, including the\n\
build script and the command you ran.";

/// Maximum number of frames kept by [`terse_trace`].
pub const MAX_TERSE_FRAMES: usize = 20;

/// Frames from the runtime and standard library rather than the build script.
static INTERNAL_FRAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:\d+:\s*)?(?:at\s+)?<?(?:std|core|alloc|tokio|futures(?:_\w+)?)::")
        .expect("internal frame pattern is valid")
});

/// Full text written to the error stream for one fault.
pub fn render_fault(fault: &WorkerFault) -> String {
    let mut out = format!("\n\n{FAULT_BANNER}\n\n{}\n", fault.error);
    let trace = terse_trace(&fault.stack_trace);
    if !trace.is_empty() {
        out.push_str(&trace);
        out.push('\n');
    }
    out
}

/// Shorten a stack trace for display.
///
/// Runs of internal frames collapse into a single `...`, blank lines are
/// dropped and at most [`MAX_TERSE_FRAMES`] frames are kept.
pub fn terse_trace(trace: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut frames = 0;
    let mut truncated = false;

    for line in trace.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if INTERNAL_FRAME.is_match(line) {
            if lines.last() != Some(&"...") {
                lines.push("...");
            }
            continue;
        }
        if frames == MAX_TERSE_FRAMES {
            truncated = true;
            break;
        }
        lines.push(line.trim_end());
        frames += 1;
    }

    if truncated && lines.last() != Some(&"...") {
        lines.push("...");
    }
    lines.join("\n")
}
