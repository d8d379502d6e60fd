use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("i2c error: {0}")]
    I2c(String),
    #[error("sensor read timeout")]
    Timeout,
    #[error("encoder magnet not detected")]
    MagnetNotDetected,
    #[error("coils de-energized, enable the motor before stepping")]
    MotorDisabled,
    #[error("invalid parameter: {0}")]
    InvalidParam(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
