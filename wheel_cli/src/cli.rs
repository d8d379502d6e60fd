//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "wheel", version, about = "Filter wheel CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/wheel_config.toml")]
    pub config: PathBuf,

    /// Log and report as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); defaults to
    /// [logging].level, then info
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rotate to a filter slot
    Move {
        /// Target slot (1-based)
        #[arg(long)]
        slot: u8,
    },
    /// Declare the current physical position to be a slot, without moving
    SetSlot {
        #[arg(long)]
        slot: u8,
    },
    /// Declare the current position as slot 1 and zero the encoder there
    Home,
    /// Print position, calibration and motion state
    Status,
    /// Quick health check (motor driver and encoder)
    SelfCheck,
    /// Run a calibration procedure
    #[command(subcommand)]
    Calibrate(CalibrateCmd),
    /// Change the number of filter slots
    FilterCount {
        #[arg(long)]
        count: u8,
    },
    /// Interactive line console over stdin
    Console,
}

#[derive(Subcommand, Debug)]
pub enum CalibrateCmd {
    /// Turn one nominal revolution, apply corrections, store the total
    Revolution {
        /// Correction in steps after the nominal revolution; repeatable
        #[arg(long, value_name = "STEPS", allow_negative_numbers = true, num_args = 1)]
        adjust: Vec<i32>,
    },
    /// Measure gear play with fixed forward and backward test step counts
    Backlash {
        #[arg(long, value_name = "STEPS")]
        forward_steps: u32,
        #[arg(long, value_name = "STEPS")]
        backward_steps: u32,
    },
    /// Capture the sensor offset with slot 1 already aligned by hand
    Guided,
}
