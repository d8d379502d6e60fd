//! Runtime configuration for the motion engine.
//!
//! These are the structs `WheelCore` consumes. They are separate from the
//! TOML-deserialized config in `wheel_config`; see `conversions`.

/// How the open-loop fallback chooses a direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirectionMode {
    /// Always advance forward; slot deltas wrap modulo the slot count.
    #[default]
    Unidirectional,
    /// Shortest signed delta, with backlash compensation on reversal.
    Bidirectional,
}

/// Wheel geometry and motion policy.
#[derive(Debug, Clone)]
pub struct MotionCfg {
    pub direction_mode: DirectionMode,
    /// Slot count used when the store holds none (or an invalid one).
    pub default_filter_count: u8,
    /// Steps per revolution used when the store holds none.
    pub default_steps_per_revolution: u32,
    /// Coils stay energized this long after a successful move.
    pub disable_delay_ms: u64,
    /// Largest single manual jog.
    pub max_manual_steps: u32,
}

impl Default for MotionCfg {
    fn default() -> Self {
        Self {
            direction_mode: DirectionMode::Unidirectional,
            default_filter_count: 5,
            default_steps_per_revolution: 2048,
            disable_delay_ms: 1000,
            max_manual_steps: 2048,
        }
    }
}

/// Position servo tuning.
#[derive(Debug, Clone)]
pub struct ServoCfg {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    /// Integral accumulator is clamped to `±integral_max` degrees.
    pub integral_max: f32,
    /// Minimum non-zero correction, in steps.
    pub output_min: u32,
    /// Maximum correction per iteration, in steps.
    pub output_max: u32,
    pub max_iterations: u32,
    pub settle_ms: u64,
    pub confirm_ms: u64,
    /// Servo success band. Must be below one degree.
    pub control_tolerance_deg: f32,
    /// Post-move check band; exceeding it flags recalibration.
    pub verify_tolerance_deg: f32,
    pub damping_band_deg: f32,
    pub damping_factor: f32,
    /// Fixed step/degree ratio for the servo.
    pub nominal_steps_per_revolution: u32,
}

impl Default for ServoCfg {
    fn default() -> Self {
        Self {
            kp: 0.8,
            ki: 0.02,
            kd: 0.1,
            integral_max: 50.0,
            output_min: 2,
            output_max: 300,
            max_iterations: 30,
            settle_ms: 100,
            confirm_ms: 200,
            control_tolerance_deg: 0.8,
            verify_tolerance_deg: 5.0,
            damping_band_deg: 5.0,
            damping_factor: 0.7,
            nominal_steps_per_revolution: 2048,
        }
    }
}

/// Watchdog and emergency stop settings.
#[derive(Debug, Clone)]
pub struct SafetyCfg {
    /// Wall-clock budget for one move. 0 disables the watchdog.
    pub move_timeout_ms: u64,
    /// Open-loop moves are issued in chunks of this many steps so the
    /// watchdog and e-stop are polled in between.
    pub chunk_steps: u32,
    pub estop_debounce_n: u8,
}

impl Default for SafetyCfg {
    fn default() -> Self {
        Self {
            move_timeout_ms: 30_000,
            chunk_steps: 64,
            estop_debounce_n: 2,
        }
    }
}

/// Bounds and pacing for the calibration procedures.
#[derive(Debug, Clone)]
pub struct CalibrationCfg {
    pub revolution_min_steps: u32,
    pub revolution_max_steps: u32,
    pub adjust_max_steps: u32,
    pub backlash_max_test_steps: u32,
    pub home_samples: u32,
    pub sample_interval_ms: u64,
    pub default_backlash_steps: u32,
    /// Master switch for backlash compensation.
    pub backlash_enabled: bool,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            revolution_min_steps: 1000,
            revolution_max_steps: 8192,
            adjust_max_steps: 100,
            backlash_max_test_steps: 100,
            home_samples: 5,
            sample_interval_ms: 50,
            default_backlash_steps: 0,
            backlash_enabled: true,
        }
    }
}

/// Stepper speed profile applied at startup.
#[derive(Debug, Clone)]
pub struct MotorParams {
    pub speed: f32,
    pub max_speed: f32,
    pub acceleration: f32,
    pub reverse_direction: bool,
}

impl Default for MotorParams {
    fn default() -> Self {
        Self {
            speed: 300.0,
            max_speed: 500.0,
            acceleration: 200.0,
            reverse_direction: false,
        }
    }
}
