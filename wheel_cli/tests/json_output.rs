use assert_cmd::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[motor]
disable_delay_ms = 0

[servo]
settle_ms = 0
confirm_ms = 0

[calibration]
sample_interval_ms = 0

[store]
path = "state.toml"
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn run_json(cfg: &PathBuf, args: &[&str]) -> std::process::Output {
    let mut cmd = Command::cargo_bin("wheel").unwrap();
    cmd.arg("--json")
        .arg("--log-level")
        .arg("error")
        .arg("--config")
        .arg(cfg);
    for a in args {
        cmd.arg(a);
    }
    cmd.output().unwrap()
}

/// Last stderr line that is a structured error (log lines have no `reason`).
fn last_json_line(bytes: &[u8]) -> serde_json::Value {
    let text = String::from_utf8_lossy(bytes);
    text.lines()
        .rev()
        .filter_map(|l| serde_json::from_str::<serde_json::Value>(l).ok())
        .find(|v| v.get("reason").is_some())
        .unwrap_or_else(|| panic!("no JSON error line in: {text}"))
}

/// Validate the JSON schema for a successful move.
#[rstest]
fn move_success_schema() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = run_json(&cfg, &["move", "--slot", "3"]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let v: serde_json::Value =
        serde_json::from_str(String::from_utf8_lossy(&out.stdout).trim()).unwrap();

    assert_eq!(v["slot"], 3);
    assert_eq!(v["strategy"], "servo");
    assert!(v["servo_iterations"].as_u64().unwrap() >= 1);
    assert!(v["steps_issued"].as_i64().unwrap() > 0);
    let angle = v["final_angle"].as_f64().unwrap();
    assert!((angle - 144.0).abs() < 1.0, "angle {angle}");
    assert_eq!(v["needs_calibration"], false);
}

#[rstest]
fn status_schema() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = run_json(&cfg, &["status"]);
    assert!(out.status.success());
    let v: serde_json::Value =
        serde_json::from_str(String::from_utf8_lossy(&out.stdout).trim()).unwrap();
    for key in [
        "slot",
        "name",
        "filter_count",
        "motion",
        "calibrated",
        "needs_calibration",
        "steps_per_revolution",
        "backlash_steps",
        "encoder_healthy",
        "angle",
        "session",
        "last_error",
    ] {
        assert!(v.get(key).is_some(), "missing key {key} in {v}");
    }
    assert_eq!(v["slot"], 1);
    assert_eq!(v["filter_count"], 5);
    assert_eq!(v["motion"], "idle");
    assert!(v["session"].is_null());
}

#[rstest]
#[case(&["move", "--slot", "7"], "INVALID_POSITION", 3)]
#[case(&["filter-count", "--count", "2"], "INVALID_PARAMETER", 2)]
fn error_schema(#[case] args: &[&str], #[case] reason: &str, #[case] exit_code: i32) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = run_json(&cfg, args);
    assert_eq!(out.status.code(), Some(exit_code));
    let v = last_json_line(&out.stderr);
    assert_eq!(v["reason"], reason);
    assert_eq!(v["exit_code"], exit_code);
    assert!(v["code"].as_u64().is_some());
    assert!(v["message"].as_str().unwrap().contains("What happened"));
}

#[rstest]
fn config_error_schema() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("cfg.toml");
    fs::write(&cfg, "[safety]\nestop_debounce_n = 0\n").unwrap();

    let out = run_json(&cfg, &["status"]);
    assert_eq!(out.status.code(), Some(2));
    let v = last_json_line(&out.stderr);
    assert_eq!(v["reason"], "CONFIG");
    assert!(v["message"].as_str().unwrap().contains("estop_debounce_n"));
}
