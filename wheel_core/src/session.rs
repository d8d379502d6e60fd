//! Calibration sessions. At most one is active at a time; values measured in
//! a session are only persisted when it finishes.

use crate::backlash::BacklashMeasurement;

/// The active calibration procedure, if any.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationSession {
    /// Counting the steps of exactly one mechanical revolution.
    Revolution {
        start_position: i64,
        accumulated_steps: i64,
    },
    /// Measuring gear play in both directions.
    Backlash(BacklashMeasurement),
    /// Operator aligns slot 1 by hand; finish captures the sensor offset.
    GuidedOffset,
}

impl CalibrationSession {
    pub fn kind(&self) -> SessionKind {
        match self {
            Self::Revolution { .. } => SessionKind::Revolution,
            Self::Backlash(_) => SessionKind::Backlash,
            Self::GuidedOffset => SessionKind::GuidedOffset,
        }
    }
}

/// Tag of a [`CalibrationSession`] for read-only views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Revolution,
    Backlash,
    GuidedOffset,
}

impl SessionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Revolution => "revolution",
            Self::Backlash => "backlash",
            Self::GuidedOffset => "guided",
        }
    }
}

/// Result of finishing a revolution calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevolutionResult {
    /// Steps per revolution now in effect.
    pub steps_per_revolution: u32,
    /// What the operator counted.
    pub measured: i64,
    /// False when `measured` was implausible and the previous value was kept.
    pub accepted: bool,
}
