//! `From` implementations bridging `wheel_config` types to `wheel_core` types.

use crate::builder::WheelSettings;
use crate::config::{CalibrationCfg, DirectionMode, MotionCfg, MotorParams, SafetyCfg, ServoCfg};
use crate::slots::SlotTable;

impl From<wheel_config::DirectionMode> for DirectionMode {
    fn from(m: wheel_config::DirectionMode) -> Self {
        match m {
            wheel_config::DirectionMode::Unidirectional => Self::Unidirectional,
            wheel_config::DirectionMode::Bidirectional => Self::Bidirectional,
        }
    }
}

// ── MotionCfg ────────────────────────────────────────────────────────────────

impl From<&wheel_config::Config> for MotionCfg {
    fn from(c: &wheel_config::Config) -> Self {
        Self {
            direction_mode: c.wheel.direction_mode.into(),
            default_filter_count: c.wheel.filter_count,
            default_steps_per_revolution: c.motor.steps_per_revolution,
            disable_delay_ms: c.motor.disable_delay_ms,
            max_manual_steps: c.motor.max_manual_steps,
        }
    }
}

// ── ServoCfg ─────────────────────────────────────────────────────────────────

impl From<&wheel_config::ServoCfg> for ServoCfg {
    fn from(c: &wheel_config::ServoCfg) -> Self {
        Self {
            kp: c.kp,
            ki: c.ki,
            kd: c.kd,
            integral_max: c.integral_max,
            output_min: c.output_min,
            output_max: c.output_max,
            max_iterations: c.max_iterations,
            settle_ms: c.settle_ms,
            confirm_ms: c.confirm_ms,
            control_tolerance_deg: c.control_tolerance_deg,
            verify_tolerance_deg: c.verify_tolerance_deg,
            damping_band_deg: c.damping_band_deg,
            damping_factor: c.damping_factor,
            nominal_steps_per_revolution: c.nominal_steps_per_revolution,
        }
    }
}

// ── SafetyCfg ────────────────────────────────────────────────────────────────

impl From<&wheel_config::Safety> for SafetyCfg {
    fn from(c: &wheel_config::Safety) -> Self {
        Self {
            move_timeout_ms: c.move_timeout_ms,
            chunk_steps: c.chunk_steps,
            estop_debounce_n: c.estop_debounce_n,
        }
    }
}

// ── CalibrationCfg ───────────────────────────────────────────────────────────

impl From<&wheel_config::CalibrationCfg> for CalibrationCfg {
    fn from(c: &wheel_config::CalibrationCfg) -> Self {
        Self {
            revolution_min_steps: c.revolution_min_steps,
            revolution_max_steps: c.revolution_max_steps,
            adjust_max_steps: c.adjust_max_steps,
            backlash_max_test_steps: c.backlash_max_test_steps,
            home_samples: c.home_samples,
            sample_interval_ms: c.sample_interval_ms,
            default_backlash_steps: c.backlash_steps,
            backlash_enabled: c.backlash_enabled,
        }
    }
}

// ── MotorParams ──────────────────────────────────────────────────────────────

impl From<&wheel_config::MotorCfg> for MotorParams {
    fn from(c: &wheel_config::MotorCfg) -> Self {
        Self {
            speed: c.speed,
            max_speed: c.max_speed,
            acceleration: c.acceleration,
            reverse_direction: c.reverse_direction,
        }
    }
}

// ── SlotTable ────────────────────────────────────────────────────────────────

impl From<&[wheel_config::SlotRow]> for SlotTable {
    fn from(rows: &[wheel_config::SlotRow]) -> Self {
        let mut table = Self::new();
        for row in rows {
            table.set_name(row.slot, row.name.clone());
            table.set_angle(row.slot, row.angle_deg);
        }
        table
    }
}

// ── WheelSettings ────────────────────────────────────────────────────────────

impl From<&wheel_config::Config> for WheelSettings {
    fn from(c: &wheel_config::Config) -> Self {
        Self {
            motion: c.into(),
            servo: (&c.servo).into(),
            safety: (&c.safety).into(),
            calibration: (&c.calibration).into(),
            motor: (&c.motor).into(),
            slots: SlotTable::new(),
        }
    }
}
