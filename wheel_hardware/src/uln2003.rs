//! 28BYJ-48 style unipolar stepper behind a ULN2003 darlington array, driven
//! with an eight-phase half-step sequence on four GPIO lines.

use rppal::gpio::{Gpio, OutputPin};
use wheel_traits::{HwResult, Motor};

use crate::error::{HwError, Result};
use crate::util::step_interval;

const HALF_STEP: [[bool; 4]; 8] = [
    [true, false, false, false],
    [true, true, false, false],
    [false, true, false, false],
    [false, true, true, false],
    [false, false, true, false],
    [false, false, true, true],
    [false, false, false, true],
    [true, false, false, true],
];

const MIN_SPEED: f32 = 50.0;

pub struct Uln2003 {
    coils: [OutputPin; 4],
    phase: usize,
    position: i64,
    enabled: bool,
    reversed: bool,
    speed: f32,
    max_speed: f32,
    acceleration: f32,
}

impl Uln2003 {
    /// Claim the four BCM pins `in1..in4`.
    pub fn new(pins: [u8; 4]) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let claim = |pin: u8| -> Result<OutputPin> {
            Ok(gpio
                .get(pin)
                .map_err(|e| HwError::Gpio(format!("pin {pin}: {e}")))?
                .into_output_low())
        };
        Ok(Self {
            coils: [claim(pins[0])?, claim(pins[1])?, claim(pins[2])?, claim(pins[3])?],
            phase: 0,
            position: 0,
            enabled: false,
            reversed: false,
            speed: 300.0,
            max_speed: 500.0,
            acceleration: 200.0,
        })
    }

    fn energize(&mut self) {
        let pattern = HALF_STEP[self.phase];
        for (coil, on) in self.coils.iter_mut().zip(pattern) {
            if on {
                coil.set_high();
            } else {
                coil.set_low();
            }
        }
    }

    fn release(&mut self) {
        for coil in &mut self.coils {
            coil.set_low();
        }
    }

    fn run(&mut self, steps: u32, forward: bool) -> HwResult<()> {
        if !self.enabled {
            return Err(HwError::MotorDisabled.into());
        }
        let interval = step_interval(self.speed, MIN_SPEED, self.max_speed);
        let physical_forward = forward != self.reversed;
        for _ in 0..steps {
            self.phase = if physical_forward {
                (self.phase + 1) % HALF_STEP.len()
            } else {
                (self.phase + HALF_STEP.len() - 1) % HALF_STEP.len()
            };
            self.energize();
            std::thread::sleep(interval);
        }
        let n = i64::from(steps);
        self.position += if forward { n } else { -n };
        Ok(())
    }
}

impl Motor for Uln2003 {
    fn init(&mut self) -> HwResult<()> {
        self.release();
        self.enabled = false;
        tracing::info!(acceleration = self.acceleration, "uln2003 ready");
        Ok(())
    }

    fn enable(&mut self) -> HwResult<()> {
        self.enabled = true;
        self.energize();
        Ok(())
    }

    fn disable(&mut self) -> HwResult<()> {
        self.enabled = false;
        self.release();
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn step_forward(&mut self, steps: u32) -> HwResult<()> {
        self.run(steps, true)
    }

    fn step_backward(&mut self, steps: u32) -> HwResult<()> {
        self.run(steps, false)
    }

    fn move_to(&mut self, position: i64) -> HwResult<()> {
        let delta = position - self.position;
        let n = u32::try_from(delta.unsigned_abs())
            .map_err(|_| HwError::InvalidParam(format!("move of {delta} steps")))?;
        self.run(n, delta >= 0)
    }

    fn position(&self) -> i64 {
        self.position
    }

    fn set_position(&mut self, position: i64) {
        self.position = position;
    }

    fn set_speed(&mut self, steps_per_sec: f32) -> HwResult<()> {
        if !(steps_per_sec.is_finite() && steps_per_sec > 0.0) {
            return Err(HwError::InvalidParam(format!("speed {steps_per_sec}")).into());
        }
        self.speed = steps_per_sec;
        Ok(())
    }

    fn set_max_speed(&mut self, steps_per_sec: f32) -> HwResult<()> {
        if !(steps_per_sec.is_finite() && steps_per_sec > 0.0) {
            return Err(HwError::InvalidParam(format!("max speed {steps_per_sec}")).into());
        }
        self.max_speed = steps_per_sec;
        Ok(())
    }

    // The half-step loop runs at constant speed; acceleration is kept for
    // diagnostics only.
    fn set_acceleration(&mut self, steps_per_sec2: f32) -> HwResult<()> {
        self.acceleration = steps_per_sec2;
        Ok(())
    }

    fn set_direction_reversed(&mut self, reversed: bool) {
        self.reversed = reversed;
    }

    fn is_direction_reversed(&self) -> bool {
        self.reversed
    }

    fn emergency_stop(&mut self) -> HwResult<()> {
        self.enabled = false;
        self.release();
        Ok(())
    }

    fn driver_name(&self) -> &str {
        "ULN2003"
    }

    fn driver_version(&self) -> &str {
        "half-step"
    }
}
