//! Maps `Box<dyn Error>` from trait boundaries to typed `WheelError`.
//!
//! The traits in `wheel_traits` use `Box<dyn Error + Send + Sync>` so any driver
//! can plug in; this module converts those to our typed error enum, with an
//! optional feature-gated path for `wheel_hardware::HwError` downcasting.

use crate::error::WheelError;

/// Map a motor or encoder error to a typed `WheelError`.
///
/// Known hardware error types are downcast first; anything else is carried
/// as a plain hardware message.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> WheelError {
    #[cfg(feature = "hardware-errors")]
    {
        use wheel_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::MagnetNotDetected => WheelError::EncoderUnavailable,
                other => WheelError::Hardware(other.to_string()),
            };
        }
    }

    WheelError::Hardware(e.to_string())
}

/// Map a persistence failure.
pub fn map_store_error(e: &(dyn std::error::Error + 'static)) -> WheelError {
    WheelError::Store(e.to_string())
}
