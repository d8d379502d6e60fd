#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas, slot table parsing and persistent storage for the filter wheel.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - The slot table CSV loader enforces headers and rejects duplicate or
//!   out-of-range slots.
//! - `TomlStore` persists calibration and position with atomic writes.
use serde::Deserialize;

pub mod atomic;
pub mod store;

pub use store::{PersistedState, TomlStore};

/// Highest slot count any wheel supports.
pub const MAX_FILTER_COUNT: u8 = 9;
/// Lowest slot count any wheel supports.
pub const MIN_FILTER_COUNT: u8 = 3;

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DirectionMode {
    /// The wheel only ever advances forward; slot deltas wrap around.
    #[default]
    Unidirectional,
    /// Shortest path in either direction, with backlash compensation.
    Bidirectional,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MotorDriver {
    #[default]
    Sim,
    Uln2003,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WheelCfg {
    /// Slot count used when the store holds none.
    pub filter_count: u8,
    pub direction_mode: DirectionMode,
    /// Optional CSV with per-slot names and angles.
    pub slot_table: Option<String>,
}

impl Default for WheelCfg {
    fn default() -> Self {
        Self {
            filter_count: 5,
            direction_mode: DirectionMode::Unidirectional,
            slot_table: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MotorCfg {
    pub driver: MotorDriver,
    /// Nominal steps per wheel revolution, refined by revolution calibration.
    pub steps_per_revolution: u32,
    pub speed: f32,
    pub max_speed: f32,
    pub acceleration: f32,
    pub reverse_direction: bool,
    /// Delay before de-energizing the coils after a successful move.
    pub disable_delay_ms: u64,
    /// Largest single manual jog.
    pub max_manual_steps: u32,
}

impl Default for MotorCfg {
    fn default() -> Self {
        Self {
            driver: MotorDriver::Sim,
            steps_per_revolution: 2048,
            speed: 300.0,
            max_speed: 500.0,
            acceleration: 200.0,
            reverse_direction: false,
            disable_delay_ms: 1000,
            max_manual_steps: 2048,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServoCfg {
    /// Gains map degrees of error to degrees of correction.
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    /// Anti-windup bound on the integral accumulator (degrees).
    pub integral_max: f32,
    /// Smallest non-zero correction in steps.
    pub output_min: u32,
    /// Largest correction per iteration in steps.
    pub output_max: u32,
    pub max_iterations: u32,
    /// Pause after each correction.
    pub settle_ms: u64,
    /// Pause before re-reading to confirm an in-tolerance position.
    pub confirm_ms: u64,
    pub control_tolerance_deg: f32,
    /// Post-move check; larger errors flag the wheel for recalibration.
    pub verify_tolerance_deg: f32,
    pub damping_band_deg: f32,
    pub damping_factor: f32,
    /// Fixed step/degree ratio for the servo, independent of calibration.
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Safety {
    /// Wall-clock budget for a single move (0 disables).
    pub move_timeout_ms: u64,
    /// Steps issued between watchdog and e-stop polls.
    pub chunk_steps: u32,
    /// Consecutive polls required to latch the e-stop.
    pub estop_debounce_n: u8,
}

impl Default for Safety {
    fn default() -> Self {
        Self {
            move_timeout_ms: 30_000,
            chunk_steps: 64,
            estop_debounce_n: 2,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationCfg {
    pub revolution_min_steps: u32,
    pub revolution_max_steps: u32,
    pub adjust_max_steps: u32,
    pub backlash_max_test_steps: u32,
    pub home_samples: u32,
    pub sample_interval_ms: u64,
    /// Used when the store holds no measured backlash.
    pub backlash_steps: u32,
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
            backlash_steps: 0,
            backlash_enabled: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Pins {
    /// ULN2003 inputs IN1..IN4 (BCM numbering).
    pub in1: u8,
    pub in2: u8,
    pub in3: u8,
    pub in4: u8,
    pub i2c_bus: u8,
    pub encoder_address: u16,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            in1: 17,
            in2: 18,
            in3: 27,
            in4: 22,
            i2c_bus: 1,
            encoder_address: 0x36,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StoreCfg {
    pub path: String,
}

impl Default for StoreCfg {
    fn default() -> Self {
        Self {
            path: "wheel_state.toml".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub wheel: WheelCfg,
    pub motor: MotorCfg,
    pub servo: ServoCfg,
    pub safety: Safety,
    pub calibration: CalibrationCfg,
    pub pins: Pins,
    pub store: StoreCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Slot table CSV schema.
///
/// Expected headers:
/// slot,name,angle_deg
///
/// Example:
/// slot,name,angle_deg
/// 1,Luminance,
/// 2,Red,71.5
///
/// An empty `angle_deg` keeps the evenly spaced default for that slot.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SlotRow {
    pub slot: u8,
    pub name: String,
    pub angle_deg: Option<f32>,
}

pub fn load_slot_table_csv(path: &std::path::Path) -> eyre::Result<Vec<SlotRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open slot table CSV {:?}: {}", path, e))?;

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["slot", "name", "angle_deg"];
    let actual: Vec<String> = headers.iter().map(ToString::to_string).collect();
    if actual != expected {
        eyre::bail!(
            "slot table CSV must have headers 'slot,name,angle_deg', got: {}",
            actual.join(",")
        );
    }

    let mut rows: Vec<SlotRow> = Vec::new();
    for (idx, rec) in rdr.deserialize::<SlotRow>().enumerate() {
        let row = rec.map_err(|e| eyre::eyre!("invalid CSV row {}: {}", idx + 2, e))?;
        if row.slot == 0 || row.slot > MAX_FILTER_COUNT {
            eyre::bail!(
                "slot table row {}: slot {} outside 1..={}",
                idx + 2,
                row.slot,
                MAX_FILTER_COUNT
            );
        }
        if rows.iter().any(|r| r.slot == row.slot) {
            eyre::bail!("slot table row {}: duplicate slot {}", idx + 2, row.slot);
        }
        if let Some(a) = row.angle_deg
            && !(a.is_finite() && (0.0..360.0).contains(&a))
        {
            eyre::bail!("slot table row {}: angle_deg must be in [0, 360)", idx + 2);
        }
        rows.push(row);
    }
    Ok(rows)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Wheel
        if !(MIN_FILTER_COUNT..=MAX_FILTER_COUNT).contains(&self.wheel.filter_count) {
            eyre::bail!(
                "wheel.filter_count must be in [{MIN_FILTER_COUNT}, {MAX_FILTER_COUNT}]"
            );
        }

        // Motor
        let m = &self.motor;
        if !(m.speed.is_finite() && m.speed > 0.0) {
            eyre::bail!("motor.speed must be > 0");
        }
        if !(m.max_speed.is_finite() && m.max_speed >= m.speed) {
            eyre::bail!("motor.max_speed must be >= motor.speed");
        }
        if !(m.acceleration.is_finite() && m.acceleration > 0.0) {
            eyre::bail!("motor.acceleration must be > 0");
        }
        if m.max_manual_steps == 0 {
            eyre::bail!("motor.max_manual_steps must be >= 1");
        }
        if m.disable_delay_ms > 60_000 {
            eyre::bail!("motor.disable_delay_ms is unreasonably large (>60s)");
        }

        // Calibration bounds first; steps_per_revolution is checked against them.
        let c = &self.calibration;
        if c.revolution_min_steps == 0 || c.revolution_min_steps >= c.revolution_max_steps {
            eyre::bail!("calibration.revolution_min_steps must be in [1, revolution_max_steps)");
        }
        if !(c.revolution_min_steps..=c.revolution_max_steps).contains(&m.steps_per_revolution) {
            eyre::bail!(
                "motor.steps_per_revolution must be in [{}, {}]",
                c.revolution_min_steps,
                c.revolution_max_steps
            );
        }
        if c.adjust_max_steps == 0 {
            eyre::bail!("calibration.adjust_max_steps must be >= 1");
        }
        if c.backlash_max_test_steps == 0 {
            eyre::bail!("calibration.backlash_max_test_steps must be >= 1");
        }
        if c.home_samples == 0 || c.home_samples > 100 {
            eyre::bail!("calibration.home_samples must be in [1, 100]");
        }

        // Servo
        let s = &self.servo;
        for (name, v) in [("kp", s.kp), ("ki", s.ki), ("kd", s.kd)] {
            if !(v.is_finite() && v >= 0.0) {
                eyre::bail!("servo.{name} must be finite and >= 0");
            }
        }
        if s.kp == 0.0 {
            eyre::bail!("servo.kp must be > 0");
        }
        if !(s.integral_max.is_finite() && s.integral_max >= 0.0) {
            eyre::bail!("servo.integral_max must be >= 0");
        }
        if s.output_max == 0 || s.output_min > s.output_max {
            eyre::bail!("servo.output_min must be <= servo.output_max and output_max >= 1");
        }
        if s.max_iterations == 0 || s.max_iterations > 100 {
            eyre::bail!("servo.max_iterations must be in [1, 100]");
        }
        if !(s.control_tolerance_deg > 0.0 && s.control_tolerance_deg < 1.0) {
            eyre::bail!("servo.control_tolerance_deg must be in (0.0, 1.0)");
        }
        if !(s.verify_tolerance_deg.is_finite() && s.verify_tolerance_deg >= s.control_tolerance_deg)
        {
            eyre::bail!("servo.verify_tolerance_deg must be >= servo.control_tolerance_deg");
        }
        if !(s.damping_factor > 0.0 && s.damping_factor <= 1.0) {
            eyre::bail!("servo.damping_factor must be in (0.0, 1.0]");
        }
        if !(s.damping_band_deg.is_finite() && s.damping_band_deg >= 0.0) {
            eyre::bail!("servo.damping_band_deg must be >= 0");
        }
        if s.nominal_steps_per_revolution == 0 {
            eyre::bail!("servo.nominal_steps_per_revolution must be >= 1");
        }

        // Safety
        if self.safety.chunk_steps == 0 {
            eyre::bail!("safety.chunk_steps must be >= 1");
        }
        if self.safety.estop_debounce_n == 0 {
            eyre::bail!("safety.estop_debounce_n must be >= 1");
        }
        if self.safety.move_timeout_ms > 10 * 60 * 1000 {
            eyre::bail!("safety.move_timeout_ms is unreasonably large (>10min)");
        }

        // Store
        if self.store.path.trim().is_empty() {
            eyre::bail!("store.path must not be empty");
        }

        Ok(())
    }
}
