//! Human-readable error descriptions, structured JSON errors and exit codes.

use serde_json::json;
use wheel_core::error::{BuildError, WheelError};

/// Config file could not be read, parsed or validated.
#[derive(Debug, thiserror::Error)]
#[error("invalid configuration: {0}")]
pub struct ConfigError(pub String);

fn wheel_error(err: &eyre::Report) -> Option<&WheelError> {
    err.chain().find_map(|e| e.downcast_ref::<WheelError>())
}

fn is_config_error(err: &eyre::Report) -> bool {
    err.chain().any(|e| {
        e.is::<ConfigError>() || matches!(e.downcast_ref::<BuildError>(), Some(BuildError::InvalidConfig(_)))
    })
}

/// Map an `eyre::Report` to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.chain().find_map(|e| e.downcast_ref::<BuildError>()) {
        return match be {
            BuildError::MissingMotor => {
                "What happened: No motor was provided to the wheel controller.\nLikely causes: The motor driver failed to initialize or was not wired into the builder.\nHow to fix: Check [motor].driver and the [pins] section, then rerun.".to_string()
            }
            BuildError::MissingStore => {
                "What happened: No state store was provided to the wheel controller.\nLikely causes: The state file could not be opened.\nHow to fix: Check [store].path and its directory permissions.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(ce) = err.chain().find_map(|e| e.downcast_ref::<ConfigError>()) {
        return format!(
            "What happened: {ce}.\nLikely causes: Wrong --config path, a TOML syntax error, or an out-of-range value.\nHow to fix: Fix the config file (or the slot table CSV it names) and rerun."
        );
    }

    if let Some(we) = wheel_error(err) {
        return match we {
            WheelError::InvalidPosition { filter_count, .. } => format!(
                "What happened: {we}.\nLikely causes: Slot number out of range for a {filter_count}-slot wheel.\nHow to fix: Pick a slot in 1..={filter_count}, or change the count with `wheel filter-count`."
            ),
            WheelError::SystemBusy(_) => format!(
                "What happened: {we}.\nLikely causes: A move or calibration session is still in progress.\nHow to fix: Wait for the move to finish, or finish/abandon the calibration first."
            ),
            WheelError::MovementFailed(_) => format!(
                "What happened: {we}.\nLikely causes: Motor driver fault, loose wiring or missing coil power.\nHow to fix: Check the driver board and [pins], then run `wheel self-check`."
            ),
            WheelError::MovementTimeout(_) => format!(
                "What happened: {we}.\nLikely causes: Very low motor speed, a stalled wheel, or a timeout configured too low.\nHow to fix: Check the mechanics, then raise safety.move_timeout_ms or motor.speed."
            ),
            WheelError::EncoderUnavailable => format!(
                "What happened: {we}.\nLikely causes: Sensor not connected, magnet missing or too far away.\nHow to fix: Check the I2C wiring and magnet, then run `wheel self-check`."
            ),
            WheelError::CalibrationNotActive
            | WheelError::CalibrationAlreadyActive
            | WheelError::InvalidState(_) => format!(
                "What happened: {we}.\nLikely causes: Calibration steps issued out of order.\nHow to fix: Start the calibration again and follow its steps in order."
            ),
            WheelError::InvalidParameter(_) => format!(
                "What happened: {we}.\nLikely causes: A value outside its allowed range.\nHow to fix: Check the command arguments against the limits in the config."
            ),
            WheelError::EmergencyStop => format!(
                "What happened: {we}.\nLikely causes: Ctrl-C or the e-stop input was triggered during motion.\nHow to fix: Make sure the wheel is clear, then issue the move again."
            ),
            WheelError::Hardware(_) | WheelError::Store(_) => format!(
                "What happened: {we}.\nLikely causes: Hardware or storage fault.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // Generic fallback
    let msg = err.to_string();
    let mut cause = String::new();
    if let Some(src) = err.chain().nth(1) {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Error: {msg}"
    )
}

/// Stable process exit code for a failed command.
///
/// 2 usage/config, 3 invalid position, 4 busy, 5 movement failed, 6 timeout,
/// 7 encoder unavailable, 8 calibration session, 9 emergency stop,
/// 10 hardware or storage, 1 anything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if is_config_error(err) {
        return 2;
    }
    match wheel_error(err) {
        Some(WheelError::InvalidParameter(_)) => 2,
        Some(WheelError::InvalidPosition { .. }) => 3,
        Some(WheelError::SystemBusy(_)) => 4,
        Some(WheelError::MovementFailed(_)) => 5,
        Some(WheelError::MovementTimeout(_)) => 6,
        Some(WheelError::EncoderUnavailable) => 7,
        Some(
            WheelError::CalibrationNotActive
            | WheelError::CalibrationAlreadyActive
            | WheelError::InvalidState(_),
        ) => 8,
        Some(WheelError::EmergencyStop) => 9,
        Some(WheelError::Hardware(_) | WheelError::Store(_)) => 10,
        None => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    let exit_code = exit_code_for_error(err);
    let msg = humanize(err);
    if let Some(we) = wheel_error(err) {
        let code = we.code();
        return json!({
            "reason": code.name(),
            "code": code.as_u16(),
            "exit_code": exit_code,
            "message": msg,
        })
        .to_string();
    }
    let reason = if is_config_error(err) { "CONFIG" } else { "Error" };
    json!({ "reason": reason, "exit_code": exit_code, "message": msg }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(WheelError::InvalidPosition { slot: 9, filter_count: 5 }, 3)]
    #[case(WheelError::SystemBusy("move in progress"), 4)]
    #[case(WheelError::MovementFailed("driver".into()), 5)]
    #[case(WheelError::MovementTimeout(30_000), 6)]
    #[case(WheelError::EncoderUnavailable, 7)]
    #[case(WheelError::CalibrationNotActive, 8)]
    #[case(WheelError::EmergencyStop, 9)]
    #[case(WheelError::Store("disk full".into()), 10)]
    #[case(WheelError::InvalidParameter("jog"), 2)]
    fn exit_codes_follow_error_kind(#[case] err: WheelError, #[case] code: i32) {
        let report = eyre::Report::new(err).wrap_err("running command");
        assert_eq!(exit_code_for_error(&report), code);
    }

    #[test]
    fn config_errors_exit_two() {
        let report = eyre::Report::new(ConfigError("bad toml".into()));
        assert_eq!(exit_code_for_error(&report), 2);
        let report = eyre::Report::new(BuildError::InvalidConfig("chunk"));
        assert_eq!(exit_code_for_error(&report), 2);
        assert!(humanize(&report).contains("Invalid configuration"));
    }

    #[test]
    fn unknown_errors_exit_one() {
        let report = eyre::eyre!("something odd");
        assert_eq!(exit_code_for_error(&report), 1);
        assert!(humanize(&report).starts_with("Something went wrong."));
    }

    #[test]
    fn json_carries_reason_and_code() {
        let report = eyre::Report::new(WheelError::EmergencyStop).wrap_err("moving to slot 2");
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&report)).unwrap();
        assert_eq!(v["reason"], "EMERGENCY_STOP");
        assert_eq!(v["code"], 10);
        assert_eq!(v["exit_code"], 9);
        assert!(v["message"].as_str().unwrap().contains("emergency stop"));
    }
}
