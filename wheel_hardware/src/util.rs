use std::time::Duration;

use crate::error::{HwError, Result};

/// Delay between two steps for a target speed, clamped to `[min_speed, max_speed]`.
///
/// Non-positive or non-finite speeds fall back to `min_speed`.
pub fn step_interval(steps_per_sec: f32, min_speed: f32, max_speed: f32) -> Duration {
    let lo = min_speed.max(1.0);
    let hi = max_speed.max(lo);
    let s = if steps_per_sec.is_finite() && steps_per_sec > 0.0 {
        steps_per_sec.clamp(lo, hi)
    } else {
        lo
    };
    Duration::from_secs_f32(1.0 / s)
}

/// Run `op` up to `attempts` times, sleeping `backoff` between failures.
///
/// Only `HwError::Timeout` and `HwError::I2c` are retried; anything else is
/// returned immediately.
pub fn retry_transient<T>(
    attempts: u32,
    backoff: Duration,
    mut op: impl FnMut() -> Result<T>,
) -> Result<T> {
    let attempts = attempts.max(1);
    let mut tries = 0;
    loop {
        tries += 1;
        match op() {
            Ok(v) => return Ok(v),
            Err(e @ (HwError::Timeout | HwError::I2c(_))) if tries < attempts => {
                tracing::warn!(retries = tries, error = %e, "transient hardware error, retrying");
                if !backoff.is_zero() {
                    std::thread::sleep(backoff);
                }
            }
            Err(e) => return Err(e),
        }
    }
}
