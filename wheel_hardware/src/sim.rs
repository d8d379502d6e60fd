//! Simulated filter wheel: one mechanical model shared by a stepper and an
//! angle sensor, so closed-loop code sees the consequences of its own steps.

use std::cell::RefCell;
use std::rc::Rc;

use wheel_traits::{DriverExtras, Encoder, HwResult, Motor};

use crate::error::HwError;

/// Physical properties of the simulated mechanism.
#[derive(Debug, Clone)]
pub struct SimParams {
    /// True steps for one wheel revolution (may differ from the nominal value).
    pub steps_per_revolution: u32,
    /// Lost motion absorbed after a direction change.
    pub gear_play_steps: u32,
    pub encoder_present: bool,
    /// Sensor counts per revolution.
    pub encoder_resolution: u16,
    /// Raw sensor angle when the wheel sits at mechanical zero.
    pub encoder_mount_deg: f32,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            steps_per_revolution: 2048,
            gear_play_steps: 0,
            encoder_present: true,
            encoder_resolution: 4096,
            encoder_mount_deg: 0.0,
        }
    }
}

#[derive(Debug)]
struct Mechanism {
    params: SimParams,
    // Motor side of the gear train, in steps.
    shaft: i64,
    // Wheel side; lags `shaft` by at most `gear_play_steps`.
    output: i64,
    counter: i64,
    enabled: bool,
    reversed: bool,
    speed: f32,
    max_speed: f32,
    acceleration: f32,
    step_log: Vec<i64>,
    estops: usize,
    jammed: bool,
    // Steps were swallowed by a jam since the last stall query.
    stalled: bool,
    microsteps: u16,
    current_ma: u16,
    motor_fault: bool,
    encoder_fault: bool,
    encoder_offset: f32,
    encoder_reads: u32,
    encoder_errors: u32,
}

impl Mechanism {
    fn turn_shaft(&mut self, delta: i64) {
        if delta == 0 {
            return;
        }
        if self.jammed {
            self.stalled = true;
            return;
        }
        let play = i64::from(self.params.gear_play_steps);
        self.shaft += delta;
        if self.shaft > self.output + play {
            self.output = self.shaft - play;
        } else if self.shaft < self.output {
            self.output = self.shaft;
        }
    }

    fn raw_degrees(&self) -> f32 {
        let spr = i64::from(self.params.steps_per_revolution.max(1));
        let frac = self.output.rem_euclid(spr) as f32 / spr as f32;
        normalize(frac * 360.0 + self.params.encoder_mount_deg)
    }

    fn raw_counts(&self) -> u16 {
        let res = f32::from(self.params.encoder_resolution.max(1));
        let counts = (self.raw_degrees() / 360.0 * res).round() as u32;
        (counts % u32::from(self.params.encoder_resolution.max(1))) as u16
    }
}

fn normalize(deg: f32) -> f32 {
    let d = deg.rem_euclid(360.0);
    if d >= 360.0 { 0.0 } else { d }
}

/// Shared handle to the simulated mechanism.
///
/// Clone it freely; the motor and encoder handed out by [`SimulatedWheel::motor`]
/// and [`SimulatedWheel::encoder`] observe the same state.
#[derive(Debug, Clone)]
pub struct SimulatedWheel {
    inner: Rc<RefCell<Mechanism>>,
}

impl SimulatedWheel {
    pub fn new(params: SimParams) -> Self {
        let play = i64::from(params.gear_play_steps);
        Self {
            inner: Rc::new(RefCell::new(Mechanism {
                params,
                shaft: play,
                output: 0,
                counter: 0,
                enabled: false,
                reversed: false,
                speed: 0.0,
                max_speed: 0.0,
                acceleration: 0.0,
                step_log: Vec::new(),
                estops: 0,
                jammed: false,
                stalled: false,
                microsteps: 1,
                current_ma: 0,
                motor_fault: false,
                encoder_fault: false,
                encoder_offset: 0.0,
                encoder_reads: 0,
                encoder_errors: 0,
            })),
        }
    }

    pub fn motor(&self) -> SimulatedMotor {
        SimulatedMotor {
            wheel: self.clone(),
        }
    }

    pub fn encoder(&self) -> SimulatedEncoder {
        SimulatedEncoder {
            wheel: self.clone(),
        }
    }

    /// Put the wheel at an absolute mechanical step position with the gear
    /// train fully engaged in the forward direction.
    pub fn place_at_step(&self, step: i64) {
        let mut m = self.inner.borrow_mut();
        let play = i64::from(m.params.gear_play_steps);
        m.shaft = step + play;
        m.output = step;
    }

    /// Place the wheel at the nominal centre of `slot` out of `filter_count`.
    pub fn place_at_slot(&self, slot: u8, filter_count: u8) {
        let spr = i64::from(self.inner.borrow().params.steps_per_revolution);
        let n = i64::from(filter_count.max(1));
        let idx = i64::from(slot.saturating_sub(1));
        self.place_at_step(idx * spr / n);
    }

    /// Wheel angle in degrees relative to mechanical zero.
    pub fn wheel_degrees(&self) -> f32 {
        let m = self.inner.borrow();
        let spr = i64::from(m.params.steps_per_revolution.max(1));
        m.output.rem_euclid(spr) as f32 / spr as f32 * 360.0
    }

    pub fn output_steps(&self) -> i64 {
        self.inner.borrow().output
    }

    /// Every relative command the motor received, forward positive.
    pub fn step_log(&self) -> Vec<i64> {
        self.inner.borrow().step_log.clone()
    }

    pub fn forward_steps(&self) -> i64 {
        self.inner.borrow().step_log.iter().filter(|s| **s > 0).sum()
    }

    pub fn backward_steps(&self) -> i64 {
        -self.inner.borrow().step_log.iter().filter(|s| **s < 0).sum::<i64>()
    }

    pub fn clear_log(&self) {
        self.inner.borrow_mut().step_log.clear();
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.borrow().enabled
    }

    pub fn estop_count(&self) -> usize {
        self.inner.borrow().estops
    }

    /// A jammed wheel accepts steps without moving.
    pub fn set_jammed(&self, jammed: bool) {
        self.inner.borrow_mut().jammed = jammed;
    }

    /// Make every subsequent step command fail.
    pub fn set_motor_fault(&self, fault: bool) {
        self.inner.borrow_mut().motor_fault = fault;
    }

    /// Make every subsequent encoder read fail.
    pub fn set_encoder_fault(&self, fault: bool) {
        self.inner.borrow_mut().encoder_fault = fault;
    }

    /// Microstep divisor and coil current last set through [`DriverExtras`].
    pub fn driver_settings(&self) -> (u16, u16) {
        let m = self.inner.borrow();
        (m.microsteps, m.current_ma)
    }

    pub fn speed_settings(&self) -> (f32, f32, f32) {
        let m = self.inner.borrow();
        (m.speed, m.max_speed, m.acceleration)
    }

    fn step(&self, steps: u32, forward: bool) -> HwResult<()> {
        let mut m = self.inner.borrow_mut();
        if m.motor_fault {
            return Err(Box::new(HwError::Gpio("simulated driver fault".into())));
        }
        if !m.enabled {
            return Err(Box::new(HwError::MotorDisabled));
        }
        let n = i64::from(steps);
        let logical = if forward { n } else { -n };
        let physical = if m.reversed { -logical } else { logical };
        m.turn_shaft(physical);
        m.counter += logical;
        m.step_log.push(logical);
        tracing::trace!(steps = logical, output = m.output, "sim step");
        Ok(())
    }
}

/// Stepper half of the simulated wheel.
#[derive(Debug)]
pub struct SimulatedMotor {
    wheel: SimulatedWheel,
}

impl Motor for SimulatedMotor {
    fn init(&mut self) -> HwResult<()> {
        Ok(())
    }

    fn enable(&mut self) -> HwResult<()> {
        self.wheel.inner.borrow_mut().enabled = true;
        Ok(())
    }

    fn disable(&mut self) -> HwResult<()> {
        self.wheel.inner.borrow_mut().enabled = false;
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.wheel.is_enabled()
    }

    fn step_forward(&mut self, steps: u32) -> HwResult<()> {
        self.wheel.step(steps, true)
    }

    fn step_backward(&mut self, steps: u32) -> HwResult<()> {
        self.wheel.step(steps, false)
    }

    fn move_to(&mut self, position: i64) -> HwResult<()> {
        let delta = position - self.position();
        let n = u32::try_from(delta.unsigned_abs())
            .map_err(|_| HwError::InvalidParam(format!("move of {delta} steps")))?;
        if delta >= 0 {
            self.step_forward(n)
        } else {
            self.step_backward(n)
        }
    }

    fn position(&self) -> i64 {
        self.wheel.inner.borrow().counter
    }

    fn set_position(&mut self, position: i64) {
        self.wheel.inner.borrow_mut().counter = position;
    }

    fn set_speed(&mut self, steps_per_sec: f32) -> HwResult<()> {
        self.wheel.inner.borrow_mut().speed = steps_per_sec;
        Ok(())
    }

    fn set_max_speed(&mut self, steps_per_sec: f32) -> HwResult<()> {
        self.wheel.inner.borrow_mut().max_speed = steps_per_sec;
        Ok(())
    }

    fn set_acceleration(&mut self, steps_per_sec2: f32) -> HwResult<()> {
        self.wheel.inner.borrow_mut().acceleration = steps_per_sec2;
        Ok(())
    }

    fn set_direction_reversed(&mut self, reversed: bool) {
        self.wheel.inner.borrow_mut().reversed = reversed;
    }

    fn is_direction_reversed(&self) -> bool {
        self.wheel.inner.borrow().reversed
    }

    fn emergency_stop(&mut self) -> HwResult<()> {
        let mut m = self.wheel.inner.borrow_mut();
        m.enabled = false;
        m.estops += 1;
        Ok(())
    }

    fn driver_name(&self) -> &str {
        "sim"
    }

    fn driver_version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn extras(&mut self) -> Option<&mut dyn DriverExtras> {
        Some(self)
    }
}

impl DriverExtras for SimulatedMotor {
    fn set_microsteps(&mut self, microsteps: u16) -> HwResult<()> {
        if !microsteps.is_power_of_two() || microsteps > 256 {
            return Err(Box::new(HwError::InvalidParam(format!(
                "microsteps {microsteps}"
            ))));
        }
        self.wheel.inner.borrow_mut().microsteps = microsteps;
        Ok(())
    }

    fn set_current_ma(&mut self, milliamps: u16) -> HwResult<()> {
        self.wheel.inner.borrow_mut().current_ma = milliamps;
        Ok(())
    }

    /// Reports, then clears, steps lost to a jam.
    fn stall_detected(&mut self) -> HwResult<bool> {
        Ok(std::mem::take(&mut self.wheel.inner.borrow_mut().stalled))
    }
}

/// Angle-sensor half of the simulated wheel.
#[derive(Debug)]
pub struct SimulatedEncoder {
    wheel: SimulatedWheel,
}

impl SimulatedEncoder {
    fn read_counts(&mut self) -> HwResult<u16> {
        let mut m = self.wheel.inner.borrow_mut();
        if !m.params.encoder_present {
            return Err(Box::new(HwError::MagnetNotDetected));
        }
        m.encoder_reads = m.encoder_reads.saturating_add(1);
        if m.encoder_fault {
            m.encoder_errors = m.encoder_errors.saturating_add(1);
            return Err(Box::new(HwError::I2c("simulated read failure".into())));
        }
        Ok(m.raw_counts())
    }
}

impl Encoder for SimulatedEncoder {
    fn is_available(&self) -> bool {
        self.wheel.inner.borrow().params.encoder_present
    }

    fn angle(&mut self) -> HwResult<f32> {
        let counts = self.read_counts()?;
        let m = self.wheel.inner.borrow();
        let res = f32::from(m.params.encoder_resolution.max(1));
        Ok(normalize(f32::from(counts) * 360.0 / res - m.encoder_offset))
    }

    fn raw_value(&mut self) -> HwResult<u16> {
        self.read_counts()
    }

    fn resolution(&self) -> u16 {
        self.wheel.inner.borrow().params.encoder_resolution
    }

    fn set_angle_offset(&mut self, offset_deg: f32) {
        self.wheel.inner.borrow_mut().encoder_offset = normalize(offset_deg);
    }

    fn angle_offset(&self) -> f32 {
        self.wheel.inner.borrow().encoder_offset
    }

    fn is_healthy(&self) -> bool {
        let m = self.wheel.inner.borrow();
        if !m.params.encoder_present {
            return false;
        }
        // Healthy while at most 10% of reads failed.
        m.encoder_errors.saturating_mul(10) <= m.encoder_reads
    }

    fn encoder_type(&self) -> &str {
        "sim-magnetic"
    }
}
