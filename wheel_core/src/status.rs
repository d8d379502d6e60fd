//! Motion state, per-step status and observer notifications.

use crate::error::{ErrorCode, WheelError};

/// Long-lived motion state owned by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotionState {
    #[default]
    Idle,
    Moving {
        target: u8,
    },
    /// Last move failed. Does not block new requests.
    Error {
        code: ErrorCode,
    },
}

impl MotionState {
    pub fn is_moving(self) -> bool {
        matches!(self, Self::Moving { .. })
    }
}

/// How a completed move got there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Servo,
    Steps,
}

/// Summary of a completed move.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveReport {
    pub slot: u8,
    pub strategy: Strategy,
    /// Servo iterations used, including a failed attempt before fallback.
    pub servo_iterations: u32,
    /// Signed steps issued across both strategies.
    pub steps_issued: i64,
    /// Encoder angle after the move, when available.
    pub final_angle: Option<f32>,
    /// Post-move verification exceeded its tolerance.
    pub needs_calibration: bool,
}

/// Status of a single step of the motion loop.
#[derive(Debug)]
pub enum MotionStatus {
    /// Keep stepping.
    Running,
    /// Target reached; position persisted and motor de-energized.
    Complete(MoveReport),
    /// Aborted with a typed error; motor has been de-energized.
    Aborted(WheelError),
}

/// Status text for display and telemetry consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WheelStatus {
    Ready,
    Moving,
    Calibrating,
    Calibrated,
    NeedsCalibration,
    Stopped,
    Error(ErrorCode),
}

impl WheelStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Moving => "MOVING",
            Self::Calibrating => "CALIBRATING",
            Self::Calibrated => "CALIBRATED",
            Self::NeedsCalibration => "NEEDS CAL",
            Self::Stopped => "STOPPED",
            Self::Error(_) => "ERROR",
        }
    }
}

/// Fire-and-forget state change notification.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEvent {
    pub status: WheelStatus,
    pub slot: u8,
    pub filter_count: u8,
    pub moving: bool,
    pub slot_name: String,
}
