//! The controller's owned state and its read-only snapshot.

use crate::backlash::Direction;
use crate::error::ErrorCode;
use crate::session::{CalibrationSession, SessionKind};
use crate::status::MotionState;

/// Mutable engine state. Only `WheelCore` writes to it.
#[derive(Debug, Clone)]
pub(crate) struct WheelState {
    pub filter_count: u8,
    pub current_slot: u8,
    pub angle_offset: f32,
    pub steps_per_revolution: u32,
    pub backlash_steps: u32,
    pub backlash_enabled: bool,
    pub last_direction: Option<Direction>,
    pub calibrated: bool,
    pub needs_calibration: bool,
    pub motion: MotionState,
    pub last_error: Option<ErrorCode>,
    pub session: Option<CalibrationSession>,
}

impl WheelState {
    pub fn snapshot(&self) -> WheelSnapshot {
        WheelSnapshot {
            filter_count: self.filter_count,
            current_slot: self.current_slot,
            angle_offset: self.angle_offset,
            steps_per_revolution: self.steps_per_revolution,
            backlash_steps: self.backlash_steps,
            backlash_enabled: self.backlash_enabled,
            last_direction: self.last_direction,
            calibrated: self.calibrated,
            needs_calibration: self.needs_calibration,
            motion: self.motion,
            last_error: self.last_error,
            session: self.session.as_ref().map(CalibrationSession::kind),
        }
    }
}

/// Point-in-time copy of the engine state for collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct WheelSnapshot {
    pub filter_count: u8,
    pub current_slot: u8,
    pub angle_offset: f32,
    pub steps_per_revolution: u32,
    pub backlash_steps: u32,
    pub backlash_enabled: bool,
    pub last_direction: Option<Direction>,
    pub calibrated: bool,
    pub needs_calibration: bool,
    pub motion: MotionState,
    pub last_error: Option<ErrorCode>,
    pub session: Option<SessionKind>,
}
