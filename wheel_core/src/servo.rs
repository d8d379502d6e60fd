//! Closed-loop position servo on encoder feedback.
//!
//! The loop works purely in degrees: PID output is converted to steps with a
//! fixed nominal steps-per-revolution, so open-loop calibration drift does not
//! affect it.

use wheel_traits::{Clock, Encoder, Motor};

use crate::angle::angular_error;
use crate::config::ServoCfg;
use crate::error::WheelError;
use crate::fallback::issue_steps;
use crate::hw_error::map_hw_error;

/// PID memory for one servo invocation. A fresh state is used per move.
#[derive(Debug, Default, Clone)]
pub struct PidState {
    integral: f32,
    previous_error: Option<f32>,
}

impl PidState {
    pub fn integral(&self) -> f32 {
        self.integral
    }

    /// Signed step correction for `error` degrees.
    ///
    /// The magnitude is clamped to `[output_min, output_max]`; inside the
    /// damping band the result is scaled down and the floor re-applied.
    /// The derivative term is zero on the first call.
    pub fn correction(&mut self, error: f32, cfg: &ServoCfg) -> i64 {
        self.integral = (self.integral + error).clamp(-cfg.integral_max, cfg.integral_max);
        let p = cfg.kp * error;
        let i = cfg.ki * self.integral;
        let d = self.previous_error.map_or(0.0, |prev| cfg.kd * (error - prev));
        self.previous_error = Some(error);

        let steps_per_deg = cfg.nominal_steps_per_revolution as f32 / 360.0;
        let raw = ((p + i + d) * steps_per_deg).round() as i64;
        let steps = clamp_output(raw, error, cfg);
        if error.abs() < cfg.damping_band_deg {
            let damped = (steps as f32 * cfg.damping_factor).trunc() as i64;
            clamp_output(damped, error, cfg)
        } else {
            steps
        }
    }
}

fn clamp_output(steps: i64, error: f32, cfg: &ServoCfg) -> i64 {
    let max = i64::from(cfg.output_max);
    let min = i64::from(cfg.output_min).min(max);
    let mag = steps.abs().min(max);
    if mag < min {
        // Below the floor the correction follows the error, never the integral.
        return if error >= 0.0 { min } else { -min };
    }
    steps.signum() * mag
}

/// Result of one servo iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ServoTick {
    /// Steps were issued; more iterations follow.
    Corrected { error: f32, steps: i64 },
    /// Within tolerance once, but the confirmation read drifted out.
    Unsettled { error: f32 },
    /// Within tolerance on both reads.
    Settled { angle: f32, iterations: u32 },
    /// Iteration budget spent.
    Exhausted { error: f32, iterations: u32 },
}

impl ServoTick {
    /// Settled angle or failure once the run is over; `None` while it continues.
    pub fn outcome(self) -> Option<Result<f32, WheelError>> {
        match self {
            Self::Corrected { .. } | Self::Unsettled { .. } => None,
            Self::Settled { angle, .. } => Some(Ok(angle)),
            Self::Exhausted { error, iterations } => Some(Err(WheelError::MovementFailed(
                format!("servo did not settle within {iterations} iterations ({error:.2} deg off)"),
            ))),
        }
    }
}

/// A servo move driven one iteration at a time.
#[derive(Debug, Clone)]
pub struct ServoRun {
    target: f32,
    tolerance: f32,
    pid: PidState,
    iterations: u32,
    last_error: f32,
    net_steps: i64,
    energized: bool,
}

impl ServoRun {
    pub fn new(target_deg: f32, tolerance_deg: f32) -> Self {
        Self {
            target: target_deg,
            tolerance: tolerance_deg,
            pid: PidState::default(),
            iterations: 0,
            last_error: f32::NAN,
            net_steps: 0,
            energized: false,
        }
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Signed sum of all corrections issued so far.
    pub fn net_steps(&self) -> i64 {
        self.net_steps
    }

    /// Whether this run enabled the motor.
    pub fn energized(&self) -> bool {
        self.energized
    }

    /// Run one control iteration: read, compare, correct, settle.
    pub fn tick<M, E>(
        &mut self,
        motor: &mut M,
        encoder: &mut E,
        clock: &dyn Clock,
        cfg: &ServoCfg,
    ) -> Result<ServoTick, WheelError>
    where
        M: Motor + ?Sized,
        E: Encoder + ?Sized,
    {
        if self.iterations >= cfg.max_iterations {
            return Ok(ServoTick::Exhausted {
                error: self.last_error,
                iterations: self.iterations,
            });
        }
        self.iterations += 1;

        let current = read_angle(encoder)?;
        let error = angular_error(current, self.target);
        self.last_error = error;
        tracing::trace!(iteration = self.iterations, current, error, "servo read");

        if error.abs() <= self.tolerance {
            clock.sleep_ms(cfg.confirm_ms);
            let again = read_angle(encoder)?;
            let e2 = angular_error(again, self.target);
            self.last_error = e2;
            if e2.abs() <= self.tolerance {
                tracing::debug!(
                    iterations = self.iterations,
                    angle = again,
                    error = e2,
                    "servo settled"
                );
                return Ok(ServoTick::Settled {
                    angle: again,
                    iterations: self.iterations,
                });
            }
            return Ok(ServoTick::Unsettled { error: e2 });
        }

        let steps = self.pid.correction(error, cfg);
        if !self.energized {
            motor
                .enable()
                .map_err(|e| map_hw_error(&*e))?;
            self.energized = true;
        }
        issue_steps(motor, steps).map_err(|e| map_hw_error(&*e))?;
        self.net_steps += steps;
        tracing::debug!(
            iteration = self.iterations,
            error,
            steps,
            integral = self.pid.integral(),
            "servo correction"
        );
        clock.sleep_ms(cfg.settle_ms);
        Ok(ServoTick::Corrected { error, steps })
    }
}

fn read_angle<E: Encoder + ?Sized>(encoder: &mut E) -> Result<f32, WheelError> {
    let a = encoder.angle().map_err(|e| map_hw_error(&*e))?;
    if !a.is_finite() {
        return Err(WheelError::Hardware(format!("encoder returned {a}")));
    }
    Ok(a)
}

/// Settled servo move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServoOutcome {
    pub angle: f32,
    pub iterations: u32,
    pub net_steps: i64,
}

/// Blocking servo move to `target_deg`.
///
/// Requires an available, healthy encoder. The motor is disabled on every
/// exit: after `disable_delay_ms` on success, immediately on failure.
pub fn drive_to_angle<M, E>(
    motor: &mut M,
    encoder: &mut E,
    clock: &dyn Clock,
    cfg: &ServoCfg,
    target_deg: f32,
    tolerance_deg: f32,
    disable_delay_ms: u64,
) -> Result<ServoOutcome, WheelError>
where
    M: Motor + ?Sized,
    E: Encoder + ?Sized,
{
    if !(encoder.is_available() && encoder.is_healthy()) {
        return Err(WheelError::EncoderUnavailable);
    }
    let mut run = ServoRun::new(target_deg, tolerance_deg);
    let result = loop {
        match run.tick(motor, encoder, clock, cfg).map(ServoTick::outcome) {
            Ok(None) => {}
            Ok(Some(done)) => break done,
            Err(e) => break Err(e),
        }
    }
    .map(|angle| ServoOutcome {
        angle,
        iterations: run.iterations(),
        net_steps: run.net_steps(),
    });
    if result.is_ok() && run.energized() {
        clock.sleep_ms(disable_delay_ms);
    }
    if let Err(e) = motor.disable() {
        tracing::warn!(error = %e, "motor disable failed after servo move");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ServoCfg {
        ServoCfg::default()
    }

    #[test]
    fn large_error_saturates_at_output_max() {
        let mut pid = PidState::default();
        assert_eq!(pid.correction(144.0, &cfg()), 300);
        let mut pid = PidState::default();
        assert_eq!(pid.correction(-144.0, &cfg()), -300);
    }

    #[test]
    fn tiny_error_is_raised_to_the_floor() {
        let mut pid = PidState::default();
        assert_eq!(pid.correction(0.9, &cfg()), 2);
        let mut pid = PidState::default();
        assert_eq!(pid.correction(-0.9, &cfg()), -2);
    }

    #[test]
    fn damping_band_scales_output() {
        let c = cfg();
        // 4 deg: P = 3.2, I = 0.08 -> 3.28 deg -> 18.66 -> 19 steps, damped to 13
        let mut pid = PidState::default();
        assert_eq!(pid.correction(4.0, &c), 13);
        // Outside the band no damping: 6 deg -> 4.92 deg -> 27.99 -> 28 steps
        let mut pid = PidState::default();
        assert_eq!(pid.correction(6.0, &c), 28);
    }

    #[test]
    fn integral_is_clamped() {
        let c = cfg();
        let mut pid = PidState::default();
        for _ in 0..10 {
            pid.correction(90.0, &c);
        }
        assert_eq!(pid.integral(), c.integral_max);
        for _ in 0..20 {
            pid.correction(-90.0, &c);
        }
        assert_eq!(pid.integral(), -c.integral_max);
    }
}
