use thiserror::Error;

/// Stable, machine-readable identity of a [`WheelError`].
///
/// Numeric values never change once published; new codes are appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    InvalidPosition = 1,
    SystemBusy = 2,
    MovementFailed = 3,
    MovementTimeout = 4,
    EncoderUnavailable = 5,
    CalibrationNotActive = 6,
    CalibrationAlreadyActive = 7,
    InvalidParameter = 8,
    InvalidState = 9,
    EmergencyStop = 10,
    Hardware = 11,
    Store = 12,
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::InvalidPosition => "INVALID_POSITION",
            Self::SystemBusy => "SYSTEM_BUSY",
            Self::MovementFailed => "MOVEMENT_FAILED",
            Self::MovementTimeout => "MOVEMENT_TIMEOUT",
            Self::EncoderUnavailable => "ENCODER_UNAVAILABLE",
            Self::CalibrationNotActive => "CALIBRATION_NOT_ACTIVE",
            Self::CalibrationAlreadyActive => "CALIBRATION_ALREADY_ACTIVE",
            Self::InvalidParameter => "INVALID_PARAMETER",
            Self::InvalidState => "INVALID_STATE",
            Self::EmergencyStop => "EMERGENCY_STOP",
            Self::Hardware => "HARDWARE",
            Self::Store => "STORE",
        }
    }
}

impl core::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "E{:02} {}", self.as_u16(), self.name())
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum WheelError {
    #[error("invalid position {slot}: wheel has slots 1..={filter_count}")]
    InvalidPosition { slot: u8, filter_count: u8 },
    #[error("system busy: {0}")]
    SystemBusy(&'static str),
    #[error("movement failed: {0}")]
    MovementFailed(String),
    #[error("movement timed out after {0} ms")]
    MovementTimeout(u64),
    #[error("encoder unavailable")]
    EncoderUnavailable,
    #[error("no matching calibration session is active")]
    CalibrationNotActive,
    #[error("a calibration session is already active")]
    CalibrationAlreadyActive,
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("emergency stop")]
    EmergencyStop,
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("store error: {0}")]
    Store(String),
}

impl WheelError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidPosition { .. } => ErrorCode::InvalidPosition,
            Self::SystemBusy(_) => ErrorCode::SystemBusy,
            Self::MovementFailed(_) => ErrorCode::MovementFailed,
            Self::MovementTimeout(_) => ErrorCode::MovementTimeout,
            Self::EncoderUnavailable => ErrorCode::EncoderUnavailable,
            Self::CalibrationNotActive => ErrorCode::CalibrationNotActive,
            Self::CalibrationAlreadyActive => ErrorCode::CalibrationAlreadyActive,
            Self::InvalidParameter(_) => ErrorCode::InvalidParameter,
            Self::InvalidState(_) => ErrorCode::InvalidState,
            Self::EmergencyStop => ErrorCode::EmergencyStop,
            Self::Hardware(_) => ErrorCode::Hardware,
            Self::Store(_) => ErrorCode::Store,
        }
    }
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing motor")]
    MissingMotor,
    #[error("missing store")]
    MissingStore,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;

/// Stable code for any report produced by this crate.
///
/// Reports that carry no [`WheelError`] (for example a store failure wrapped
/// only in context) map to `Hardware`.
pub fn error_code(report: &Report) -> ErrorCode {
    report
        .chain()
        .find_map(|e| e.downcast_ref::<WheelError>())
        .map_or(ErrorCode::Hardware, WheelError::code)
}
