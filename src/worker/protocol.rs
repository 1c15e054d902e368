// src/worker/protocol.rs

//! Line protocol spoken by process workers on stdout.
//!
//! ```text
//! ::bootrun-ready::
//! ::bootrun-status::0
//! ::bootrun-fault::<error>\t<stack trace>
//! ```
//!
//! A worker confirms it started with the ready line, or with any other
//! protocol line. Inside a fault line, backslash, newline and tab are escaped as `\\`,
//! `\n` and `\t`. Lines without a recognised prefix are ordinary worker
//! output.

use super::{WorkerFault, WorkerMessage};

pub const READY_LINE: &str = "::bootrun-ready::";
pub const STATUS_PREFIX: &str = "::bootrun-status::";
pub const FAULT_PREFIX: &str = "::bootrun-fault::";

/// A decoded protocol line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Ready,
    Message(WorkerMessage),
    Fault(WorkerFault),
}

/// Decode a single stdout line. `None` means plain output.
pub fn parse_line(line: &str) -> Option<Frame> {
    let line = line.strip_suffix('\r').unwrap_or(line);

    if line.trim_end() == READY_LINE {
        return Some(Frame::Ready);
    }

    if let Some(payload) = line.strip_prefix(STATUS_PREFIX) {
        let payload = payload.trim();
        let message = match payload.parse::<i32>() {
            Ok(code) => WorkerMessage::Status(code),
            Err(_) => WorkerMessage::Other(payload.to_string()),
        };
        return Some(Frame::Message(message));
    }

    if let Some(payload) = line.strip_prefix(FAULT_PREFIX) {
        let (error, trace) = payload.split_once('\t').unwrap_or((payload, ""));
        return Some(Frame::Fault(WorkerFault {
            error: unescape(error),
            stack_trace: unescape(trace),
        }));
    }

    None
}

/// The start-up confirmation line.
pub fn encode_ready() -> String {
    READY_LINE.to_string()
}

/// Encode a status report as a protocol line (without trailing newline).
pub fn encode_status(status: i32) -> String {
    format!("{STATUS_PREFIX}{status}")
}

/// Encode an uncaught fault as a protocol line (without trailing newline).
pub fn encode_fault(error: &str, stack_trace: &str) -> String {
    format!("{FAULT_PREFIX}{}\t{}", escape(error), escape(stack_trace))
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => {}
            other => out.push(other),
        }
    }
    out
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            // Unknown escape: keep it verbatim.
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
