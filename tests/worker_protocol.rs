// tests/worker_protocol.rs

use bootrun::worker::protocol::{encode_fault, encode_ready, encode_status, parse_line, Frame};
use bootrun::worker::{WorkerFault, WorkerMessage};

#[test]
fn status_lines_become_messages() {
    assert_eq!(
        parse_line("::bootrun-status::0"),
        Some(Frame::Message(WorkerMessage::Status(0)))
    );
    assert_eq!(
        parse_line("::bootrun-status:: -3 \r"),
        Some(Frame::Message(WorkerMessage::Status(-3)))
    );
    assert_eq!(parse_line(&encode_status(75)), Some(Frame::Message(WorkerMessage::Status(75))));
}

#[test]
fn ready_line_confirms_start() {
    assert_eq!(parse_line(&encode_ready()), Some(Frame::Ready));
    assert_eq!(parse_line("::bootrun-ready::\r"), Some(Frame::Ready));
    assert_eq!(parse_line("::bootrun-ready::now"), None);
}

#[test]
fn non_integer_status_payload_is_kept_as_other() {
    assert_eq!(
        parse_line("::bootrun-status::done"),
        Some(Frame::Message(WorkerMessage::Other("done".to_string())))
    );
    // Out of i32 range is not a status either.
    assert_eq!(
        parse_line("::bootrun-status::99999999999"),
        Some(Frame::Message(WorkerMessage::Other("99999999999".to_string())))
    );
}

#[test]
fn fault_lines_carry_error_and_multiline_trace() {
    let line = encode_fault(
        "Bad state: C:\\temp\tnot found",
        "#0 main (build.script:3)\n#1 run (build.script:9)",
    );
    assert!(!line.contains('\n'));

    assert_eq!(
        parse_line(&line),
        Some(Frame::Fault(WorkerFault::new(
            "Bad state: C:\\temp\tnot found",
            "#0 main (build.script:3)\n#1 run (build.script:9)",
        )))
    );
}

#[test]
fn fault_line_without_trace_has_empty_trace() {
    assert_eq!(
        parse_line("::bootrun-fault::oops"),
        Some(Frame::Fault(WorkerFault::new("oops", "")))
    );
}

#[test]
fn ordinary_output_is_not_a_frame() {
    assert_eq!(parse_line("[INFO] Building 3 targets"), None);
    assert_eq!(parse_line(""), None);
    assert_eq!(parse_line(" ::bootrun-status::0"), None);
}
