//! Capability contracts between the wheel motion engine and its hardware.
//!
//! The engine only ever talks to a stepper through [`Motor`], to an angle
//! sensor through [`Encoder`] and to persistent memory through [`Store`].
//! Chip-specific extras live on [`DriverExtras`] so the core contract stays
//! small.

pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Error type shared by all hardware-facing traits.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias for hardware-facing traits.
pub type HwResult<T> = Result<T, BoxError>;

/// Stepper driver contract.
///
/// Step counts are relative and blocking: `step_forward(n)` returns once all
/// `n` steps were issued. Positions are absolute step counts tracked by the
/// driver since the last `set_position`.
pub trait Motor {
    fn init(&mut self) -> HwResult<()>;

    fn enable(&mut self) -> HwResult<()>;
    fn disable(&mut self) -> HwResult<()>;
    fn is_enabled(&self) -> bool;

    fn step_forward(&mut self, steps: u32) -> HwResult<()>;
    fn step_backward(&mut self, steps: u32) -> HwResult<()>;

    /// Move to an absolute step position (blocking).
    fn move_to(&mut self, position: i64) -> HwResult<()>;
    fn position(&self) -> i64;
    fn set_position(&mut self, position: i64);

    fn set_speed(&mut self, steps_per_sec: f32) -> HwResult<()>;
    fn set_max_speed(&mut self, steps_per_sec: f32) -> HwResult<()>;
    fn set_acceleration(&mut self, steps_per_sec2: f32) -> HwResult<()>;

    fn set_direction_reversed(&mut self, reversed: bool);
    fn is_direction_reversed(&self) -> bool;

    /// Halt immediately and de-energize the coils.
    fn emergency_stop(&mut self) -> HwResult<()>;

    fn driver_name(&self) -> &str;
    fn driver_version(&self) -> &str {
        "unknown"
    }

    /// Optional chip-specific capabilities; plain drivers have none.
    fn extras(&mut self) -> Option<&mut dyn DriverExtras> {
        None
    }
}

/// Capabilities only some stepper chips provide.
pub trait DriverExtras {
    fn set_microsteps(&mut self, microsteps: u16) -> HwResult<()>;
    fn set_current_ma(&mut self, milliamps: u16) -> HwResult<()>;
    fn stall_detected(&mut self) -> HwResult<bool>;
}

/// Absolute angle sensor contract.
///
/// `angle()` reports degrees in `[0, 360)` after the configured offset has been
/// subtracted. A failed read is an `Err`, never a magic value.
pub trait Encoder {
    /// Sensor responded at init and is wired up.
    fn is_available(&self) -> bool;

    fn angle(&mut self) -> HwResult<f32>;
    /// Raw counts, `0..resolution()`, with no offset applied.
    fn raw_value(&mut self) -> HwResult<u16>;
    fn resolution(&self) -> u16;

    fn set_angle_offset(&mut self, offset_deg: f32);
    fn angle_offset(&self) -> f32;

    /// Recent reads mostly succeeded and the magnet is in range.
    fn is_healthy(&self) -> bool;

    fn encoder_type(&self) -> &str {
        "unknown"
    }
}

/// Persistent key/value memory used by the engine at startup and after every
/// committed change. A successful `save_*` must be durable before the next
/// `load_*`. `Ok(None)` means nothing has been stored yet.
pub trait Store {
    fn load_filter_count(&mut self) -> HwResult<Option<u8>>;
    fn save_filter_count(&mut self, count: u8) -> HwResult<()>;

    fn load_current_slot(&mut self) -> HwResult<Option<u8>>;
    fn save_current_slot(&mut self, slot: u8) -> HwResult<()>;

    fn load_angle_offset(&mut self) -> HwResult<Option<f32>>;
    fn save_angle_offset(&mut self, offset_deg: f32) -> HwResult<()>;

    fn load_steps_per_revolution(&mut self) -> HwResult<Option<u32>>;
    fn save_steps_per_revolution(&mut self, steps: u32) -> HwResult<()>;

    fn load_backlash_steps(&mut self) -> HwResult<Option<u32>>;
    fn save_backlash_steps(&mut self, steps: u32) -> HwResult<()>;

    fn load_calibrated(&mut self) -> HwResult<bool>;
    fn save_calibrated(&mut self, calibrated: bool) -> HwResult<()>;
}

impl<T: Motor + ?Sized> Motor for Box<T> {
    fn init(&mut self) -> HwResult<()> {
        (**self).init()
    }
    fn enable(&mut self) -> HwResult<()> {
        (**self).enable()
    }
    fn disable(&mut self) -> HwResult<()> {
        (**self).disable()
    }
    fn is_enabled(&self) -> bool {
        (**self).is_enabled()
    }
    fn step_forward(&mut self, steps: u32) -> HwResult<()> {
        (**self).step_forward(steps)
    }
    fn step_backward(&mut self, steps: u32) -> HwResult<()> {
        (**self).step_backward(steps)
    }
    fn move_to(&mut self, position: i64) -> HwResult<()> {
        (**self).move_to(position)
    }
    fn position(&self) -> i64 {
        (**self).position()
    }
    fn set_position(&mut self, position: i64) {
        (**self).set_position(position);
    }
    fn set_speed(&mut self, steps_per_sec: f32) -> HwResult<()> {
        (**self).set_speed(steps_per_sec)
    }
    fn set_max_speed(&mut self, steps_per_sec: f32) -> HwResult<()> {
        (**self).set_max_speed(steps_per_sec)
    }
    fn set_acceleration(&mut self, steps_per_sec2: f32) -> HwResult<()> {
        (**self).set_acceleration(steps_per_sec2)
    }
    fn set_direction_reversed(&mut self, reversed: bool) {
        (**self).set_direction_reversed(reversed);
    }
    fn is_direction_reversed(&self) -> bool {
        (**self).is_direction_reversed()
    }
    fn emergency_stop(&mut self) -> HwResult<()> {
        (**self).emergency_stop()
    }
    fn driver_name(&self) -> &str {
        (**self).driver_name()
    }
    fn driver_version(&self) -> &str {
        (**self).driver_version()
    }
    fn extras(&mut self) -> Option<&mut dyn DriverExtras> {
        (**self).extras()
    }
}

impl<T: Encoder + ?Sized> Encoder for Box<T> {
    fn is_available(&self) -> bool {
        (**self).is_available()
    }
    fn angle(&mut self) -> HwResult<f32> {
        (**self).angle()
    }
    fn raw_value(&mut self) -> HwResult<u16> {
        (**self).raw_value()
    }
    fn resolution(&self) -> u16 {
        (**self).resolution()
    }
    fn set_angle_offset(&mut self, offset_deg: f32) {
        (**self).set_angle_offset(offset_deg);
    }
    fn angle_offset(&self) -> f32 {
        (**self).angle_offset()
    }
    fn is_healthy(&self) -> bool {
        (**self).is_healthy()
    }
    fn encoder_type(&self) -> &str {
        (**self).encoder_type()
    }
}

impl<T: Store + ?Sized> Store for Box<T> {
    fn load_filter_count(&mut self) -> HwResult<Option<u8>> {
        (**self).load_filter_count()
    }
    fn save_filter_count(&mut self, count: u8) -> HwResult<()> {
        (**self).save_filter_count(count)
    }
    fn load_current_slot(&mut self) -> HwResult<Option<u8>> {
        (**self).load_current_slot()
    }
    fn save_current_slot(&mut self, slot: u8) -> HwResult<()> {
        (**self).save_current_slot(slot)
    }
    fn load_angle_offset(&mut self) -> HwResult<Option<f32>> {
        (**self).load_angle_offset()
    }
    fn save_angle_offset(&mut self, offset_deg: f32) -> HwResult<()> {
        (**self).save_angle_offset(offset_deg)
    }
    fn load_steps_per_revolution(&mut self) -> HwResult<Option<u32>> {
        (**self).load_steps_per_revolution()
    }
    fn save_steps_per_revolution(&mut self, steps: u32) -> HwResult<()> {
        (**self).save_steps_per_revolution(steps)
    }
    fn load_backlash_steps(&mut self) -> HwResult<Option<u32>> {
        (**self).load_backlash_steps()
    }
    fn save_backlash_steps(&mut self, steps: u32) -> HwResult<()> {
        (**self).save_backlash_steps(steps)
    }
    fn load_calibrated(&mut self) -> HwResult<bool> {
        (**self).load_calibrated()
    }
    fn save_calibrated(&mut self, calibrated: bool) -> HwResult<()> {
        (**self).save_calibrated(calibrated)
    }
}
