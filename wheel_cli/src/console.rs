//! Line console over stdin. One wheel lives for the whole session, so
//! calibration procedures can be driven step by step.

use std::io::{BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{Parser, Subcommand};
use serde_json::json;
use wheel_core::backlash::MarkOutcome;
use wheel_core::{FilterWheel, Result};

use crate::error_fmt::{format_error_json, humanize};
use crate::ops::{self, emit};

#[derive(Parser, Debug)]
#[command(name = "console", no_binary_name = true, disable_version_flag = true)]
struct Line {
    #[command(subcommand)]
    cmd: LineCmd,
}

#[derive(Subcommand, Debug)]
enum LineCmd {
    /// Rotate to a slot
    Move { slot: u8 },
    /// Declare the current position to be a slot
    SetSlot { slot: u8 },
    /// Declare the current position as slot 1
    Home,
    Status,
    SelfCheck,
    FilterCount { count: u8 },
    /// Relative manual move in steps (negative turns backward)
    Jog {
        #[arg(allow_negative_numbers = true)]
        steps: i32,
    },
    /// Absolute manual move in motor steps
    StepTo {
        #[arg(allow_negative_numbers = true)]
        position: i64,
    },
    /// Compare the encoder against the believed slot
    Check,
    /// Halt the motor immediately
    Stop,
    /// Revolution calibration
    #[command(subcommand)]
    Rev(RevCmd),
    /// Backlash calibration
    #[command(subcommand)]
    Backlash(BacklashCmd),
    /// Guided offset calibration
    #[command(subcommand)]
    Guided(GuidedCmd),
    /// Drop the active calibration without saving
    Abandon,
    /// Leave the console
    #[command(alias = "exit")]
    Quit,
}

#[derive(Subcommand, Debug)]
enum RevCmd {
    Start,
    Adjust {
        #[arg(allow_negative_numbers = true)]
        steps: i32,
    },
    Finish,
}

#[derive(Subcommand, Debug)]
enum BacklashCmd {
    Start,
    Step { steps: u32 },
    Mark,
    Finish,
}

#[derive(Subcommand, Debug)]
enum GuidedCmd {
    Start,
    Finish,
}

enum Flow {
    Continue,
    Quit,
}

/// Read commands until `quit` or end of input. Command errors are printed
/// and the console keeps going.
pub fn run(
    wheel: &mut FilterWheel,
    input: impl BufRead,
    estop: &Arc<AtomicBool>,
    json_mode: bool,
) -> eyre::Result<()> {
    if !json_mode {
        println!("wheel console; `help` lists commands, `quit` leaves");
    }
    prompt(json_mode);
    for line in input.lines() {
        let line = line?;
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() || words[0].starts_with('#') {
            prompt(json_mode);
            continue;
        }
        match Line::try_parse_from(words.iter().copied()) {
            Ok(parsed) => {
                // A Ctrl-C at the prompt must not abort the next move.
                estop.store(false, Ordering::Relaxed);
                match dispatch(wheel, parsed.cmd, json_mode) {
                    Ok(Flow::Quit) => return Ok(()),
                    Ok(Flow::Continue) => {}
                    Err(e) => {
                        tracing::debug!(error = ?e, "console command failed");
                        if json_mode {
                            println!("{}", format_error_json(&e));
                        } else {
                            println!("error: {e}\n{}", humanize(&e));
                        }
                    }
                }
            }
            Err(e) => {
                if json_mode {
                    println!("{}", json!({ "reason": "USAGE", "message": e.to_string() }));
                } else {
                    print!("{e}");
                }
            }
        }
        prompt(json_mode);
    }
    Ok(())
}

fn prompt(json_mode: bool) {
    if !json_mode {
        print!("> ");
        // Prompt is cosmetic; a closed stdout shows up on the next println.
        let _ = std::io::stdout().flush();
    }
}

fn dispatch(wheel: &mut FilterWheel, cmd: LineCmd, json_mode: bool) -> Result<Flow> {
    match cmd {
        LineCmd::Move { slot } => ops::move_to(wheel, slot, json_mode)?,
        LineCmd::SetSlot { slot } => ops::set_slot(wheel, slot, json_mode)?,
        LineCmd::Home => ops::home(wheel, json_mode)?,
        LineCmd::Status => ops::status(wheel, json_mode),
        LineCmd::SelfCheck => ops::self_check(wheel, json_mode),
        LineCmd::FilterCount { count } => ops::filter_count(wheel, count, json_mode)?,
        LineCmd::Jog { steps } => {
            let pos = wheel.jog(steps)?;
            emit(json_mode, &json!({ "position": pos }), &format!("position {pos}"));
        }
        LineCmd::StepTo { position } => {
            let pos = wheel.step_to(position)?;
            emit(json_mode, &json!({ "position": pos }), &format!("position {pos}"));
        }
        LineCmd::Check => {
            let believed = wheel.current_slot();
            let observed = wheel.check_position();
            let human = match observed {
                Some(s) if s == believed => format!("slot {s} confirmed"),
                Some(s) => format!("encoder says slot {s}, expected {believed}; recalibration needed"),
                None => "position cannot be checked right now".to_string(),
            };
            emit(
                json_mode,
                &json!({ "expected": believed, "observed": observed, "needs_calibration": wheel.needs_calibration() }),
                &human,
            );
        }
        LineCmd::Stop => {
            wheel.emergency_stop();
            emit(json_mode, &json!({ "status": "STOPPED" }), "stopped");
        }
        LineCmd::Rev(sub) => revolution(wheel, sub, json_mode)?,
        LineCmd::Backlash(sub) => backlash(wheel, sub, json_mode)?,
        LineCmd::Guided(GuidedCmd::Start) => {
            wheel.start_guided_calibration()?;
            emit(
                json_mode,
                &json!({ "session": "guided" }),
                "jog the wheel until slot 1 is aligned, then `guided finish`",
            );
        }
        LineCmd::Guided(GuidedCmd::Finish) => {
            let offset = wheel.finish_guided_calibration()?;
            emit(
                json_mode,
                &json!({ "offset_deg": offset }),
                &format!("slot 1 captured; encoder offset {offset:.2}°"),
            );
        }
        LineCmd::Abandon => {
            wheel.abandon_calibration()?;
            emit(json_mode, &json!({ "session": null }), "calibration abandoned");
        }
        LineCmd::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}

fn revolution(wheel: &mut FilterWheel, cmd: RevCmd, json_mode: bool) -> Result<()> {
    match cmd {
        RevCmd::Start => {
            wheel.start_revolution_calibration()?;
            emit(
                json_mode,
                &json!({ "session": "revolution", "steps": wheel.steps_per_revolution() }),
                &format!(
                    "turned {} steps; use `rev adjust <n>` until the mark lines up, then `rev finish`",
                    wheel.steps_per_revolution()
                ),
            );
        }
        RevCmd::Adjust { steps } => {
            let total = wheel.adjust_revolution_calibration(steps)?;
            emit(json_mode, &json!({ "total": total }), &format!("total {total} steps"));
        }
        RevCmd::Finish => {
            let result = wheel.finish_revolution_calibration()?;
            ops::report_revolution(&result, json_mode);
        }
    }
    Ok(())
}

fn backlash(wheel: &mut FilterWheel, cmd: BacklashCmd, json_mode: bool) -> Result<()> {
    match cmd {
        BacklashCmd::Start => {
            wheel.start_backlash_calibration()?;
            emit(
                json_mode,
                &json!({ "session": "backlash", "phase": "forward" }),
                "step forward with `backlash step <n>` until the wheel moves, then `backlash mark`",
            );
        }
        BacklashCmd::Step { steps } => {
            let p = wheel.test_backlash_step(steps)?;
            let angle = p.angle.map_or_else(|| "-".to_string(), |a| format!("{a:.2}°"));
            emit(
                json_mode,
                &json!({ "phase": format!("{:?}", p.phase).to_lowercase(), "phase_steps": p.phase_steps, "angle": p.angle }),
                &format!("{:?} phase: {} steps, angle {angle}", p.phase, p.phase_steps),
            );
        }
        BacklashCmd::Mark => match wheel.mark_backlash_phase()? {
            MarkOutcome::Forward { steps } => emit(
                json_mode,
                &json!({ "forward": steps }),
                &format!("forward play {steps} steps; now step backward"),
            ),
            MarkOutcome::Complete {
                forward,
                backward,
                backlash,
            } => emit(
                json_mode,
                &json!({ "forward": forward, "backward": backward, "backlash": backlash }),
                &format!("measured {backlash} steps; `backlash finish` to save"),
            ),
        },
        BacklashCmd::Finish => {
            let steps = wheel.finish_backlash_calibration()?;
            emit(
                json_mode,
                &json!({ "backlash_steps": steps }),
                &format!("backlash set to {steps} steps"),
            );
        }
    }
    Ok(())
}
