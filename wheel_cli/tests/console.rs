use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use assert_cmd::Command;
use tempfile::tempdir;

fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[motor]
disable_delay_ms = 0

[servo]
settle_ms = 0
confirm_ms = 0

[store]
path = "state.toml"
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn console(cfg: &PathBuf, script: &str) -> assert_cmd::assert::Assert {
    Command::cargo_bin("wheel")
        .unwrap()
        .arg("--config")
        .arg(cfg)
        .arg("--log-level")
        .arg("warn")
        .arg("console")
        .write_stdin(script)
        .assert()
}

#[test]
fn moves_and_reports_status() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    console(&cfg, "move 2\nstatus\nquit\n")
        .success()
        .stdout(predicate::str::contains("moved to slot 2"))
        .stdout(predicate::str::contains("slot 2/5"));
}

#[test]
fn errors_do_not_end_the_session() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    console(&cfg, "move 7\nbogus\nstatus\n")
        .success()
        .stdout(predicate::str::contains("invalid position"))
        .stdout(predicate::str::contains("slot 1/5"))
        .stdout(predicate::str::contains("last error: E01 INVALID_POSITION"));
}

#[test]
fn revolution_calibration_step_by_step() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    console(
        &cfg,
        "rev start\nmove 2\nrev adjust 5\nrev adjust -1\nrev finish\nquit\n",
    )
    .success()
    .stdout(predicate::str::contains("turned 2048 steps"))
    .stdout(predicate::str::contains("system busy"))
    .stdout(predicate::str::contains("total 2053 steps"))
    .stdout(predicate::str::contains("steps per revolution set to 2052"));

    let state = fs::read_to_string(dir.path().join("state.toml")).unwrap();
    assert!(state.contains("steps_per_revolution = 2052"), "{state}");
}

#[test]
fn backlash_calibration_step_by_step() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    console(
        &cfg,
        "backlash start\nbacklash step 3\nbacklash step 2\nbacklash mark\nbacklash step 7\nbacklash mark\nbacklash finish\n",
    )
    .success()
    .stdout(predicate::str::contains("forward play 5 steps"))
    .stdout(predicate::str::contains("measured 7 steps"))
    .stdout(predicate::str::contains("backlash set to 7 steps"));
}

#[test]
fn guided_calibration_with_jog() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    console(&cfg, "guided start\njog 100\njog -40\nguided finish\nstatus\n")
        .success()
        .stdout(predicate::str::contains("position 100"))
        .stdout(predicate::str::contains("position 60"))
        .stdout(predicate::str::contains("slot 1 captured"))
        .stdout(predicate::str::contains("idle, calibrated"));
}

#[test]
fn abandon_discards_the_session() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    console(&cfg, "rev start\nabandon\nabandon\nrev finish\n")
        .success()
        .stdout(predicate::str::contains("calibration abandoned"))
        .stdout(predicate::str::contains("no matching calibration session"));
}

#[test]
fn stop_and_check() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    console(&cfg, "stop\ncheck\nexit\n")
        .success()
        .stdout(predicate::str::contains("stopped"))
        .stdout(predicate::str::contains("slot 1 confirmed"));
}
