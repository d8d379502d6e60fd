//! Command execution against a built wheel, with human or JSON output.

use eyre::WrapErr;
use serde_json::{Value, json};
use wheel_core::backlash::MarkOutcome;
use wheel_core::{FilterWheel, MotionState, MoveReport, Result, RevolutionResult, Strategy};

use crate::cli::{CalibrateCmd, Commands};

/// Print `value` as one JSON line, or `human` as plain text.
pub fn emit(json_mode: bool, value: &Value, human: &str) {
    if json_mode {
        println!("{value}");
    } else {
        println!("{human}");
    }
}

fn strategy_name(s: Strategy) -> &'static str {
    match s {
        Strategy::Servo => "servo",
        Strategy::Steps => "steps",
    }
}

fn motion_name(m: MotionState) -> String {
    match m {
        MotionState::Idle => "idle".to_string(),
        MotionState::Moving { target } => format!("moving to {target}"),
        MotionState::Error { code } => format!("error {code}"),
    }
}

/// Run a one-shot subcommand. `console` is dispatched by the caller.
pub fn execute(
    wheel: &mut FilterWheel,
    cmd: &Commands,
    cfg: &wheel_config::Config,
    json_mode: bool,
) -> Result<()> {
    match cmd {
        Commands::Move { slot } => move_to(wheel, *slot, json_mode),
        Commands::SetSlot { slot } => set_slot(wheel, *slot, json_mode),
        Commands::Home => home(wheel, json_mode),
        Commands::Status => {
            status(wheel, json_mode);
            Ok(())
        }
        Commands::SelfCheck => {
            self_check(wheel, json_mode);
            Ok(())
        }
        Commands::FilterCount { count } => filter_count(wheel, *count, json_mode),
        Commands::Calibrate(CalibrateCmd::Revolution { adjust }) => {
            calibrate_revolution(wheel, adjust, json_mode)
        }
        Commands::Calibrate(CalibrateCmd::Backlash {
            forward_steps,
            backward_steps,
        }) => calibrate_backlash(
            wheel,
            *forward_steps,
            *backward_steps,
            cfg.calibration.backlash_max_test_steps,
            json_mode,
        ),
        Commands::Calibrate(CalibrateCmd::Guided) => calibrate_guided(wheel, json_mode),
        Commands::Console => Err(eyre::eyre!("console is not a one-shot command")),
    }
}

pub fn report_move(wheel: &FilterWheel, r: &MoveReport, json_mode: bool) {
    let name = wheel.slot_name(r.slot);
    let value = json!({
        "slot": r.slot,
        "name": name,
        "strategy": strategy_name(r.strategy),
        "servo_iterations": r.servo_iterations,
        "steps_issued": r.steps_issued,
        "final_angle": r.final_angle,
        "needs_calibration": r.needs_calibration,
    });
    let mut human = format!(
        "moved to slot {} ({name}) via {}, {} steps",
        r.slot,
        strategy_name(r.strategy),
        r.steps_issued
    );
    if let Some(a) = r.final_angle {
        human.push_str(&format!(", angle {a:.2}°"));
    }
    if r.needs_calibration {
        human.push_str("; position check failed, recalibration recommended");
    }
    emit(json_mode, &value, &human);
}

pub fn move_to(wheel: &mut FilterWheel, slot: u8, json_mode: bool) -> Result<()> {
    let report = wheel
        .move_to_slot(slot)
        .wrap_err_with(|| format!("moving to slot {slot}"))?;
    report_move(wheel, &report, json_mode);
    Ok(())
}

pub fn set_slot(wheel: &mut FilterWheel, slot: u8, json_mode: bool) -> Result<()> {
    wheel.set_slot(slot)?;
    emit(
        json_mode,
        &json!({ "slot": slot, "name": wheel.slot_name(slot) }),
        &format!("current slot set to {slot} ({})", wheel.slot_name(slot)),
    );
    Ok(())
}

pub fn home(wheel: &mut FilterWheel, json_mode: bool) -> Result<()> {
    let report = wheel.calibrate_home()?;
    let human = match report.offset_deg {
        Some(o) => format!(
            "home set to slot 1; encoder offset {o:.2}° from {} samples",
            report.samples
        ),
        None => "home set to slot 1 (no encoder)".to_string(),
    };
    emit(
        json_mode,
        &json!({ "slot": 1, "offset_deg": report.offset_deg, "samples": report.samples }),
        &human,
    );
    Ok(())
}

pub fn status(wheel: &mut FilterWheel, json_mode: bool) {
    let angle = wheel.encoder_angle();
    let snap = wheel.snapshot();
    let slot_name = wheel.slot_name(snap.current_slot);
    let session = snap.session.map(|s| s.as_str());
    let last_error = snap.last_error.map(|c| c.name());
    let value = json!({
        "slot": snap.current_slot,
        "name": slot_name,
        "filter_count": snap.filter_count,
        "motion": motion_name(snap.motion),
        "calibrated": snap.calibrated,
        "needs_calibration": snap.needs_calibration,
        "steps_per_revolution": snap.steps_per_revolution,
        "backlash_steps": snap.backlash_steps,
        "backlash_enabled": snap.backlash_enabled,
        "angle_offset": snap.angle_offset,
        "encoder_healthy": wheel.encoder_healthy(),
        "angle": angle,
        "session": session,
        "last_error": last_error,
    });
    let mut human = format!(
        "slot {}/{} ({slot_name}), {}, {}",
        snap.current_slot,
        snap.filter_count,
        motion_name(snap.motion),
        if snap.calibrated { "calibrated" } else { "not calibrated" },
    );
    if snap.needs_calibration {
        human.push_str(", needs calibration");
    }
    human.push_str(&format!(
        "\nsteps/rev {}, backlash {} ({})",
        snap.steps_per_revolution,
        snap.backlash_steps,
        if snap.backlash_enabled { "on" } else { "off" }
    ));
    match angle {
        Some(a) => human.push_str(&format!("\nencoder angle {a:.2}°")),
        None => human.push_str("\nencoder unavailable"),
    }
    if let Some(s) = session {
        human.push_str(&format!("\ncalibration in progress: {s}"));
    }
    if let Some(e) = snap.last_error {
        human.push_str(&format!("\nlast error: {e}"));
    }
    emit(json_mode, &value, &human);
}

pub fn self_check(wheel: &mut FilterWheel, json_mode: bool) {
    let c = wheel.self_check();
    let value = json!({
        "motor_driver": c.motor_driver,
        "motor_version": c.motor_version,
        "motor_enabled": c.motor_enabled,
        "stall_detected": c.stall_detected,
        "encoder_present": c.encoder_present,
        "encoder_available": c.encoder_available,
        "encoder_healthy": c.encoder_healthy,
        "encoder_type": c.encoder_type,
        "angle": c.angle,
        "raw_counts": c.raw_counts,
    });
    let encoder = match (&c.encoder_type, c.angle) {
        (Some(t), Some(a)) => format!("{t} at {a:.2}° ({})", if c.encoder_healthy { "healthy" } else { "degraded" }),
        (Some(t), None) => format!("{t}, no reading"),
        (None, _) => "none".to_string(),
    };
    emit(
        json_mode,
        &value,
        &format!(
            "motor: {} {} ({}{})\nencoder: {encoder}\nok",
            c.motor_driver,
            c.motor_version,
            if c.motor_enabled { "energized" } else { "idle" },
            if c.stall_detected == Some(true) { ", stalled" } else { "" }
        ),
    );
}

pub fn filter_count(wheel: &mut FilterWheel, count: u8, json_mode: bool) -> Result<()> {
    wheel.set_filter_count(count)?;
    emit(
        json_mode,
        &json!({ "filter_count": count, "slot": wheel.current_slot() }),
        &format!("filter count set to {count}; current slot {}", wheel.current_slot()),
    );
    Ok(())
}

/// Run `f` inside an open calibration session; abandon it on failure so the
/// wheel is left idle.
fn within_session<T>(
    wheel: &mut FilterWheel,
    f: impl FnOnce(&mut FilterWheel) -> Result<T>,
) -> Result<T> {
    let out = f(wheel);
    if out.is_err()
        && wheel.session().is_some()
        && let Err(e) = wheel.abandon_calibration()
    {
        tracing::warn!(error = %e, "could not abandon calibration");
    }
    out
}

pub fn report_revolution(r: &RevolutionResult, json_mode: bool) {
    let human = if r.accepted {
        format!("steps per revolution set to {}", r.steps_per_revolution)
    } else {
        format!(
            "measured {} steps is implausible; keeping {}",
            r.measured, r.steps_per_revolution
        )
    };
    emit(
        json_mode,
        &json!({
            "steps_per_revolution": r.steps_per_revolution,
            "measured": r.measured,
            "accepted": r.accepted,
        }),
        &human,
    );
}

pub fn calibrate_revolution(wheel: &mut FilterWheel, adjust: &[i32], json_mode: bool) -> Result<()> {
    wheel.start_revolution_calibration()?;
    let result = within_session(wheel, |w| {
        for &n in adjust {
            let total = w.adjust_revolution_calibration(n)?;
            tracing::info!(adjust = n, total, "revolution adjusted");
        }
        w.finish_revolution_calibration()
    })?;
    report_revolution(&result, json_mode);
    Ok(())
}

/// Issue `steps` test steps in chunks no larger than `max_test`.
fn backlash_steps(wheel: &mut FilterWheel, steps: u32, max_test: u32) -> Result<()> {
    let mut left = steps;
    while left > 0 {
        let n = left.min(max_test.max(1));
        let progress = wheel.test_backlash_step(n)?;
        tracing::debug!(phase = ?progress.phase, steps = progress.phase_steps, angle = progress.angle, "backlash test");
        left -= n;
    }
    Ok(())
}

pub fn calibrate_backlash(
    wheel: &mut FilterWheel,
    forward: u32,
    backward: u32,
    max_test: u32,
    json_mode: bool,
) -> Result<()> {
    wheel.start_backlash_calibration()?;
    let backlash = within_session(wheel, |w| {
        backlash_steps(w, forward, max_test)?;
        w.mark_backlash_phase()?;
        backlash_steps(w, backward, max_test)?;
        match w.mark_backlash_phase()? {
            MarkOutcome::Complete { .. } => w.finish_backlash_calibration(),
            MarkOutcome::Forward { .. } => Err(eyre::Report::new(
                wheel_core::WheelError::InvalidState("backward phase not marked".into()),
            )),
        }
    })?;
    emit(
        json_mode,
        &json!({ "forward": forward, "backward": backward, "backlash_steps": backlash }),
        &format!("backlash set to {backlash} steps (forward {forward}, backward {backward})"),
    );
    Ok(())
}

pub fn calibrate_guided(wheel: &mut FilterWheel, json_mode: bool) -> Result<()> {
    wheel.start_guided_calibration()?;
    let offset = wheel.finish_guided_calibration()?;
    emit(
        json_mode,
        &json!({ "slot": 1, "offset_deg": offset }),
        &format!("slot 1 captured; encoder offset {offset:.2}°"),
    );
    Ok(())
}
