//! End-to-end dispatch over generated capture files.

use std::fs::File;
use std::time::Duration;

use pcap_file::pcap::{PcapPacket, PcapWriter};

use luacap::cancel::CancelController;
use luacap::dispatch::{DispatchLoop, Outcome};
use luacap::error::Error;
use luacap::script::{ScriptEnv, ScriptInstance, ScriptPayload, ScriptRegistry};

// Minimal Ethernet/IPv4/TCP frame; enough for BPF classification.
fn tcp_frame() -> Vec<u8> {
    let mut frame = vec![
        0x02, 0x00, 0x00, 0x00, 0x00, 0x01, // dst mac
        0x02, 0x00, 0x00, 0x00, 0x00, 0x02, // src mac
        0x08, 0x00, // ethertype IPv4
    ];
    frame.extend_from_slice(&[
        0x45, 0x00, 0x00, 0x28, // version/ihl, tos, total length 40
        0x00, 0x01, 0x00, 0x00, // id, flags/frag
        0x40, 0x06, 0x00, 0x00, // ttl, proto TCP, checksum
        10, 0, 0, 1, // src ip
        10, 0, 0, 2, // dst ip
    ]);
    frame.extend_from_slice(&[
        0x1f, 0x90, 0x00, 0x50, // ports 8080 -> 80
        0x00, 0x00, 0x00, 0x01, // seq
        0x00, 0x00, 0x00, 0x00, // ack
        0x50, 0x02, 0x20, 0x00, // offset, SYN, window
        0x00, 0x00, 0x00, 0x00, // checksum, urgent
    ]);
    frame
}

fn udp_frame() -> Vec<u8> {
    let mut frame = vec![
        0x02, 0x00, 0x00, 0x00, 0x00, 0x01, // dst mac
        0x02, 0x00, 0x00, 0x00, 0x00, 0x02, // src mac
        0x08, 0x00, // ethertype IPv4
    ];
    frame.extend_from_slice(&[
        0x45, 0x00, 0x00, 0x1c, // version/ihl, tos, total length 28
        0x00, 0x02, 0x00, 0x00, // id, flags/frag
        0x40, 0x11, 0x00, 0x00, // ttl, proto UDP, checksum
        10, 0, 0, 1, // src ip
        10, 0, 0, 2, // dst ip
    ]);
    frame.extend_from_slice(&[
        0x00, 0x35, 0x00, 0x35, // ports 53 -> 53
        0x00, 0x08, 0x00, 0x00, // length, checksum
    ]);
    frame
}

fn write_capture(path: &std::path::Path, frames: &[(Vec<u8>, Duration)]) {
    let mut writer = PcapWriter::new(File::create(path).unwrap()).unwrap();
    for (frame, timestamp) in frames {
        writer
            .write_packet(&PcapPacket::new(*timestamp, frame.len() as u32, frame))
            .unwrap();
    }
}

const RECORDING_SCRIPT: &str = r#"
sources = {}
seen_len = {}
seen_ts = {}
seen_idx = {}
return {
    begin = function(source, linktype)
        sources[#sources + 1] = source .. ":" .. linktype
    end,
    each = function(data, ts, idx)
        seen_len[#seen_len + 1] = #data
        seen_ts[#seen_ts + 1] = ts
        seen_idx[#seen_idx + 1] = idx
    end,
}
"#;

fn run_over(
    captures: &[String],
    filter: Option<&str>,
) -> (luacap::Result<Outcome>, ScriptRegistry) {
    let mut registry = ScriptRegistry::new();
    registry.push(ScriptInstance::new(ScriptPayload::inline(RECORDING_SCRIPT)));
    let env = ScriptEnv::detect(vec![]);
    let mut cancel = CancelController::new();

    let result = DispatchLoop::new(&mut registry, &env, &mut cancel).run(captures, filter);
    (result, registry)
}

#[test]
fn test_capture_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mixed.pcap");
    write_capture(
        &path,
        &[
            (tcp_frame(), Duration::from_micros(1_500_000)),
            (udp_frame(), Duration::from_micros(2_250_000)),
        ],
    );

    let captures = vec![path.to_str().unwrap().to_string()];
    let (result, registry) = run_over(&captures, None);
    assert_eq!(result.unwrap(), Outcome::Completed);

    let globals = registry.primary().unwrap().lua().globals();
    let sources: Vec<String> = globals.get("sources").unwrap();
    assert_eq!(sources.len(), 1);
    assert!(sources[0].starts_with(path.to_str().unwrap()));

    let seen_len: Vec<i64> = globals.get("seen_len").unwrap();
    assert_eq!(seen_len, [tcp_frame().len() as i64, udp_frame().len() as i64]);

    let seen_idx: Vec<i64> = globals.get("seen_idx").unwrap();
    assert_eq!(seen_idx, [1, 2]);

    let seen_ts: Vec<f64> = globals.get("seen_ts").unwrap();
    assert!((seen_ts[0] - 1.5).abs() < 1e-6);
    assert!((seen_ts[1] - 2.25).abs() < 1e-6);
}

#[test]
fn test_filter_narrows_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mixed.pcap");
    write_capture(
        &path,
        &[
            (tcp_frame(), Duration::from_micros(100)),
            (udp_frame(), Duration::from_micros(200)),
            (tcp_frame(), Duration::from_micros(300)),
        ],
    );

    let captures = vec![path.to_str().unwrap().to_string()];
    let (result, registry) = run_over(&captures, Some("tcp"));
    assert_eq!(result.unwrap(), Outcome::Completed);

    let globals = registry.primary().unwrap().lua().globals();
    let seen_idx: Vec<i64> = globals.get("seen_idx").unwrap();
    // Only the two TCP frames pass the filter; numbering follows delivery.
    assert_eq!(seen_idx, [1, 2]);
    let seen_len: Vec<i64> = globals.get("seen_len").unwrap();
    assert_eq!(seen_len, [tcp_frame().len() as i64, tcp_frame().len() as i64]);
}

#[test]
fn test_two_captures_reset_numbering() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.pcap");
    let second = dir.path().join("second.pcap");
    write_capture(
        &first,
        &[
            (tcp_frame(), Duration::from_micros(100)),
            (tcp_frame(), Duration::from_micros(200)),
        ],
    );
    write_capture(&second, &[(udp_frame(), Duration::from_micros(300))]);

    let captures = vec![
        first.to_str().unwrap().to_string(),
        second.to_str().unwrap().to_string(),
    ];
    let (result, registry) = run_over(&captures, None);
    assert_eq!(result.unwrap(), Outcome::Completed);

    let globals = registry.primary().unwrap().lua().globals();
    let sources: Vec<String> = globals.get("sources").unwrap();
    assert_eq!(sources.len(), 2);
    let seen_idx: Vec<i64> = globals.get("seen_idx").unwrap();
    assert_eq!(seen_idx, [1, 2, 1]);
}

#[test]
fn test_bad_filter_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plain.pcap");
    write_capture(&path, &[(tcp_frame(), Duration::from_micros(100))]);

    let captures = vec![path.to_str().unwrap().to_string()];
    let (result, _) = run_over(&captures, Some("not a valid bpf ((("));
    assert!(matches!(result, Err(Error::Filter { .. })));
}

#[test]
fn test_missing_capture_is_fatal() {
    let captures = vec!["/no/such/file.pcap".to_string()];
    let (result, _) = run_over(&captures, None);
    assert!(matches!(result, Err(Error::CaptureOpen { .. })));
}
