#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Filter wheel motion engine (hardware-agnostic).
//!
//! All hardware goes through the `wheel_traits::Motor`, `wheel_traits::Encoder`
//! and `wheel_traits::Store` traits.
//!
//! ## Architecture
//!
//! - **Angles**: slot/angle conversion and wraparound-aware error (`angle`)
//! - **Servo**: PID on encoder feedback, degrees in, steps out (`servo`)
//! - **Fallback**: open-loop step counting (`fallback`) with backlash
//!   compensation on reversal (`backlash`)
//! - **Controller**: admission, move execution, watchdog and e-stop
//!   (`controller`), calibration sessions (`calibration`)
//! - **Status**: motion state, move reports, observer events (`status`)
//!
//! Moves can run blocking (`move_to_slot`) or be polled (`start_move` then
//! `step`); both share one state machine.

pub mod angle;
pub mod backlash;
pub mod builder;
pub mod calibration;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod error;
pub mod fallback;
pub mod hw_error;
pub mod mocks;
pub mod servo;
pub mod session;
pub mod slots;
pub mod state;
pub mod status;

pub use wheel_config::{MAX_FILTER_COUNT, MIN_FILTER_COUNT};

pub use builder::{FilterWheel, Missing, Set, WheelBuilder, WheelHooks, WheelSettings, build_wheel};
pub use calibration::{BacklashProgress, HomeReport};
pub use config::{CalibrationCfg, DirectionMode, MotionCfg, MotorParams, SafetyCfg, ServoCfg};
pub use controller::{SelfCheck, WheelCore};
pub use error::{BuildError, ErrorCode, Report, Result, WheelError, error_code};
pub use session::{CalibrationSession, RevolutionResult, SessionKind};
pub use slots::SlotTable;
pub use state::WheelSnapshot;
pub use status::{MotionState, MotionStatus, MoveReport, StatusEvent, Strategy, WheelStatus};
