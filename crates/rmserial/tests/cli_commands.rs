#![cfg(all(unix, feature = "cli"))]

use std::process::{Command, Output};

const REFERENCE_FRAME: &str = "5a010000c03f000000bf1697";

fn rmserial(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_rmserial"))
        .args(["--log-level", "error"])
        .args(args)
        .env_remove("RMSERIAL_DEVICE")
        .env_remove("RMSERIAL_LOG_LEVEL")
        .output()
        .expect("rmserial should run")
}

fn stdout_lines(output: &Output) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("stdout line should be json"))
        .collect()
}

#[test]
fn encode_receive_prints_reference_hex() {
    let output = rmserial(&[
        "--format", "pretty", "encode", "receive", "--color", "1", "--pitch", "1.5", "--yaw",
        "-0.5",
    ]);

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        REFERENCE_FRAME
    );
}

#[test]
fn decode_reference_frame_as_json() {
    let output = rmserial(&["--format", "json", "decode", REFERENCE_FRAME]);

    assert!(output.status.success());
    let records = stdout_lines(&output);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["result"], "receive");
    assert_eq!(records[0]["robot_color"], 1);
    assert_eq!(records[0]["color"], "blue");
    assert_eq!(records[0]["pitch"], 1.5);
    assert_eq!(records[0]["yaw"], -0.5);
}

#[test]
fn decode_reports_dropped_bytes_with_data_invalid() {
    let input = format!("13 {REFERENCE_FRAME}");
    let output = rmserial(&["--format", "json", "decode", &input]);

    assert_eq!(output.status.code(), Some(60));
    let records = stdout_lines(&output);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["result"], "invalid_header");
    assert_eq!(records[0]["byte"], "0x13");
    assert_eq!(records[1]["result"], "receive");
    assert_eq!(records[1]["offset"], 1);
}

#[test]
fn encoded_send_frame_decodes_back() {
    let encoded = rmserial(&[
        "--format",
        "json",
        "encode",
        "send",
        "--found",
        "--position=1,2,3",
    ]);
    assert!(encoded.status.success());
    let encoded = &stdout_lines(&encoded)[0];
    assert_eq!(encoded["kind"], "send");
    assert_eq!(encoded["size"], 29);
    let hex = encoded["hex"].as_str().expect("hex should be a string");
    assert!(hex.ends_with("3a04"));

    let decoded = rmserial(&["--format", "json", "decode", "--kind", "send", hex]);
    assert!(decoded.status.success());
    let records = stdout_lines(&decoded);
    assert_eq!(records[0]["result"], "send");
    assert_eq!(records[0]["target_found"], true);
    assert_eq!(records[0]["target_color"], false);
    assert_eq!(records[0]["position"], serde_json::json!([1.0, 2.0, 3.0]));
}

#[test]
fn decode_rejects_odd_hex_with_usage() {
    let output = rmserial(&["decode", "5a0"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn run_without_device_is_usage_error() {
    let output = rmserial(&["run"]);
    assert_eq!(output.status.code(), Some(64));
    assert!(String::from_utf8_lossy(&output.stderr).contains("--device"));
}

#[test]
fn run_with_missing_device_fails_at_startup() {
    let output = rmserial(&["run", "--device", "/dev/rmserial-does-not-exist"]);
    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("/dev/rmserial-does-not-exist"));
}

#[test]
fn run_rejects_zero_baud_rate() {
    let output = rmserial(&["run", "--device", "/dev/null", "--baud-rate", "0"]);
    assert_eq!(output.status.code(), Some(78));
}

#[test]
fn version_prints_package_version() {
    let output = rmserial(&["version"]);
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        format!("rmserial {}", env!("CARGO_PKG_VERSION"))
    );
}
