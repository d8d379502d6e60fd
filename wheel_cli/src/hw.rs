//! Assemble a wheel from config: state store, slot table, motor and encoder.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use eyre::WrapErr;
use wheel_config::{Config, MotorDriver, TomlStore};
use wheel_core::{FilterWheel, SlotTable, WheelSettings};

use crate::error_fmt::ConfigError;

/// Set to run the simulated wheel without its angle sensor.
const SIM_NO_ENCODER_ENV: &str = "WHEEL_SIM_NO_ENCODER";
/// Set to make every simulated step command fail.
const SIM_MOTOR_FAULT_ENV: &str = "WHEEL_SIM_MOTOR_FAULT";

fn env_flag(name: &str) -> bool {
    std::env::var_os(name).is_some_and(|v| !v.is_empty() && v != "0")
}

/// Relative paths in the config resolve against the config file's directory.
fn resolve(config_path: &Path, p: &str) -> std::path::PathBuf {
    let p = Path::new(p);
    if p.is_absolute() {
        return p.to_path_buf();
    }
    config_path
        .parent()
        .map_or_else(|| p.to_path_buf(), |dir| dir.join(p))
}

fn load_settings(cfg: &Config, config_path: &Path) -> eyre::Result<WheelSettings> {
    let mut settings = WheelSettings::from(cfg);
    if let Some(table) = &cfg.wheel.slot_table {
        let path = resolve(config_path, table);
        let rows = wheel_config::load_slot_table_csv(&path)
            .map_err(|e| eyre::Report::new(ConfigError(format!("{e}"))))?;
        tracing::debug!(path = %path.display(), rows = rows.len(), "slot table loaded");
        settings.slots = SlotTable::from(rows.as_slice());
    }
    Ok(settings)
}

/// Build the wheel described by `cfg`. `estop` is polled between motion
/// chunks; Ctrl-C sets it.
pub fn open_wheel(
    cfg: &Config,
    config_path: &Path,
    estop: Arc<AtomicBool>,
) -> eyre::Result<FilterWheel> {
    let store_path = resolve(config_path, &cfg.store.path);
    let store = TomlStore::open(&store_path).wrap_err("opening state store")?;
    let settings = load_settings(cfg, config_path)?;

    let builder = FilterWheel::builder()
        .with_settings(settings.clone())
        .with_estop_check(move || estop.load(Ordering::Relaxed));

    match cfg.motor.driver {
        MotorDriver::Sim => {
            let sim = sim_wheel(cfg, &store, &settings);
            let builder = if env_flag(SIM_NO_ENCODER_ENV) {
                builder
            } else {
                builder.with_encoder(sim.encoder())
            };
            builder.with_motor(sim.motor()).with_store(store).build()
        }
        MotorDriver::Uln2003 => real_wheel(cfg, builder, store),
    }
}

/// The simulated mechanism is placed where the store says the wheel is, with
/// the sensor mounted at the persisted offset, so consecutive runs agree.
fn sim_wheel(
    cfg: &Config,
    store: &TomlStore,
    settings: &WheelSettings,
) -> wheel_hardware::SimulatedWheel {
    let state = store.state();
    let steps_per_revolution = state
        .steps_per_revolution
        .unwrap_or(cfg.motor.steps_per_revolution);
    let filter_count = state.filter_count.unwrap_or(cfg.wheel.filter_count);
    let slot = state
        .current_slot
        .filter(|s| (1..=filter_count).contains(s))
        .unwrap_or(1);

    let sim = wheel_hardware::SimulatedWheel::new(wheel_hardware::SimParams {
        steps_per_revolution,
        encoder_present: !env_flag(SIM_NO_ENCODER_ENV),
        encoder_mount_deg: state.angle_offset_deg.unwrap_or(0.0),
        ..wheel_hardware::SimParams::default()
    });
    let angle = settings.slots.angle(slot, filter_count);
    #[allow(clippy::cast_possible_truncation)]
    let step = (f64::from(angle) / 360.0 * f64::from(steps_per_revolution)).round() as i64;
    sim.place_at_step(step);
    if env_flag(SIM_MOTOR_FAULT_ENV) {
        sim.set_motor_fault(true);
    }
    tracing::debug!(slot, filter_count, step, "simulated wheel placed");
    sim
}

#[cfg(feature = "hardware")]
fn real_wheel(
    cfg: &Config,
    builder: wheel_core::WheelBuilder<wheel_core::Missing, wheel_core::Missing>,
    store: TomlStore,
) -> eyre::Result<FilterWheel> {
    let p = &cfg.pins;
    let motor = wheel_hardware::Uln2003::new([p.in1, p.in2, p.in3, p.in4])
        .wrap_err("open motor pins")?;
    // A missing sensor is not fatal: moves fall back to step counting.
    let builder = match wheel_hardware::As5600::new(p.i2c_bus, p.encoder_address) {
        Ok(enc) => builder.with_encoder(enc),
        Err(e) => {
            tracing::warn!(error = %e, "encoder not available; using step counting only");
            builder
        }
    };
    builder.with_motor(motor).with_store(store).build()
}

#[cfg(not(feature = "hardware"))]
fn real_wheel(
    _cfg: &Config,
    _builder: wheel_core::WheelBuilder<wheel_core::Missing, wheel_core::Missing>,
    _store: TomlStore,
) -> eyre::Result<FilterWheel> {
    Err(eyre::Report::new(ConfigError(
        "motor.driver = \"uln2003\" needs a build with the `hardware` feature".into(),
    )))
}
