//! Type-state builder for `FilterWheel` and the generic `build_wheel`
//! constructor.
//!
//! The builder enforces at compile time that a motor and a store are given
//! before `build()` is available. `try_build()` is always available for
//! dynamic checks. Both paths share one validation and startup routine.

use std::marker::PhantomData;
use std::sync::Arc;

use crossbeam_channel::Sender;
use wheel_traits::clock::{Clock, MonotonicClock};
use wheel_traits::{Encoder, Motor, Store};

use crate::config::{CalibrationCfg, MotionCfg, MotorParams, SafetyCfg, ServoCfg};
use crate::controller::WheelCore;
use crate::error::{BuildError, Result};
use crate::hw_error::map_hw_error;
use crate::slots::SlotTable;
use crate::state::WheelState;
use crate::status::{MotionState, StatusEvent, WheelStatus};
use crate::{MAX_FILTER_COUNT, MIN_FILTER_COUNT};

/// Dynamically dispatched wheel, as built by [`WheelBuilder`].
pub type FilterWheel = WheelCore<Box<dyn Motor>, Box<dyn Encoder>, Box<dyn Store>>;

/// Every tunable the controller takes, grouped like the TOML sections.
#[derive(Debug, Clone, Default)]
pub struct WheelSettings {
    pub motion: MotionCfg,
    pub servo: ServoCfg,
    pub safety: SafetyCfg,
    pub calibration: CalibrationCfg,
    pub motor: MotorParams,
    pub slots: SlotTable,
}

/// Optional runtime hooks.
#[derive(Default)]
pub struct WheelHooks {
    pub clock: Option<Box<dyn Clock + Send + Sync>>,
    pub estop_check: Option<Box<dyn Fn() -> bool>>,
    pub observer: Option<Sender<StatusEvent>>,
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

fn validate(s: &WheelSettings) -> Result<()> {
    if !(MIN_FILTER_COUNT..=MAX_FILTER_COUNT).contains(&s.motion.default_filter_count) {
        return Err(invalid("filter count must be in 3..=9"));
    }
    let (rev_min, rev_max) = (
        s.calibration.revolution_min_steps,
        s.calibration.revolution_max_steps,
    );
    if rev_min == 0 || rev_min > rev_max {
        return Err(invalid("revolution bounds must satisfy 0 < min <= max"));
    }
    if !(rev_min..=rev_max).contains(&s.motion.default_steps_per_revolution) {
        return Err(invalid("steps per revolution outside calibration bounds"));
    }
    if s.motion.max_manual_steps == 0 {
        return Err(invalid("max_manual_steps must be > 0"));
    }
    let tol = s.servo.control_tolerance_deg;
    if !(tol.is_finite() && tol > 0.0 && tol < 1.0) {
        return Err(invalid("control tolerance must be in (0, 1) degrees"));
    }
    if !(s.servo.verify_tolerance_deg.is_finite() && s.servo.verify_tolerance_deg > 0.0) {
        return Err(invalid("verify tolerance must be > 0"));
    }
    if s.servo.output_max == 0 || s.servo.output_min > s.servo.output_max {
        return Err(invalid("servo output bounds must satisfy min <= max, max > 0"));
    }
    if s.servo.max_iterations == 0 {
        return Err(invalid("servo max_iterations must be > 0"));
    }
    if !(s.servo.damping_factor > 0.0 && s.servo.damping_factor <= 1.0) {
        return Err(invalid("damping factor must be in (0, 1]"));
    }
    if s.servo.nominal_steps_per_revolution == 0 {
        return Err(invalid("nominal steps per revolution must be > 0"));
    }
    if [s.servo.kp, s.servo.ki, s.servo.kd, s.servo.integral_max]
        .iter()
        .any(|g| !g.is_finite() || g.is_sign_negative())
    {
        return Err(invalid("servo gains must be finite and >= 0"));
    }
    if s.safety.chunk_steps == 0 {
        return Err(invalid("chunk_steps must be > 0"));
    }
    if s.safety.estop_debounce_n == 0 {
        return Err(invalid("estop_debounce_n must be >= 1"));
    }
    if s.calibration.home_samples == 0 {
        return Err(invalid("home_samples must be >= 1"));
    }
    if s.calibration.adjust_max_steps == 0 || s.calibration.backlash_max_test_steps == 0 {
        return Err(invalid("calibration step limits must be > 0"));
    }
    if !(s.motor.speed > 0.0 && s.motor.max_speed >= s.motor.speed && s.motor.acceleration > 0.0)
    {
        return Err(invalid("motor speeds must satisfy 0 < speed <= max_speed"));
    }
    Ok(())
}

/// Load one persisted value, falling back to `None` when the store fails.
fn load_or_warn<T>(
    what: &'static str,
    r: core::result::Result<Option<T>, wheel_traits::BoxError>,
) -> Option<T> {
    r.unwrap_or_else(|e| {
        tracing::warn!(error = %e, what, "store read failed; using default");
        None
    })
}

/// Validate settings, restore persisted state and prepare the motor.
fn validate_and_build<M: Motor, E: Encoder, S: Store>(
    mut motor: M,
    mut encoder: Option<E>,
    mut store: S,
    settings: WheelSettings,
    hooks: WheelHooks,
) -> Result<WheelCore<M, E, S>> {
    validate(&settings)?;
    let WheelSettings {
        motion,
        servo,
        safety,
        calibration,
        motor: motor_params,
        slots,
    } = settings;

    // ── Persisted state ──────────────────────────────────────────────────────
    let filter_count = load_or_warn("filter_count", store.load_filter_count())
        .filter(|n| (MIN_FILTER_COUNT..=MAX_FILTER_COUNT).contains(n))
        .unwrap_or(motion.default_filter_count);
    let current_slot = load_or_warn("current_slot", store.load_current_slot())
        .filter(|s| (1..=filter_count).contains(s))
        .unwrap_or(1);
    let angle_offset = load_or_warn("angle_offset", store.load_angle_offset())
        .filter(|a| a.is_finite())
        .map_or(0.0, crate::angle::normalize_angle);
    let steps_per_revolution = load_or_warn("steps_per_revolution", store.load_steps_per_revolution())
        .filter(|s| {
            (calibration.revolution_min_steps..=calibration.revolution_max_steps).contains(s)
        })
        .unwrap_or(motion.default_steps_per_revolution);
    let backlash_steps = load_or_warn("backlash_steps", store.load_backlash_steps())
        .unwrap_or(calibration.default_backlash_steps);
    let calibrated = store.load_calibrated().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "store read failed; treating wheel as uncalibrated");
        false
    });

    // ── Hardware ─────────────────────────────────────────────────────────────
    if let Err(e) = motor.init() {
        return Err(eyre::Report::new(map_hw_error(&*e)).wrap_err("initializing motor"));
    }
    motor.set_direction_reversed(motor_params.reverse_direction);
    let applied = motor
        .set_max_speed(motor_params.max_speed)
        .and_then(|()| motor.set_speed(motor_params.speed))
        .and_then(|()| motor.set_acceleration(motor_params.acceleration));
    if let Err(e) = applied {
        return Err(eyre::Report::new(map_hw_error(&*e)).wrap_err("applying motor speed profile"));
    }
    if let Err(e) = motor.disable() {
        tracing::warn!(error = %e, "motor disable failed at startup");
    }
    if let Some(enc) = encoder.as_mut() {
        enc.set_angle_offset(angle_offset);
        if !enc.is_available() {
            tracing::warn!(encoder = enc.encoder_type(), "encoder not responding; open-loop only");
        }
    }

    let clock: Arc<dyn Clock + Send + Sync> = match hooks.clock {
        Some(b) => Arc::from(b),
        None => Arc::new(MonotonicClock::new()),
    };

    let state = WheelState {
        filter_count,
        current_slot,
        angle_offset,
        steps_per_revolution,
        backlash_steps,
        backlash_enabled: calibration.backlash_enabled && backlash_steps > 0,
        last_direction: None,
        calibrated,
        needs_calibration: false,
        motion: MotionState::Idle,
        last_error: None,
        session: None,
    };
    tracing::info!(
        filter_count,
        slot = current_slot,
        steps_per_revolution,
        backlash_steps,
        calibrated,
        encoder = encoder.is_some(),
        driver = motor.driver_name(),
        "filter wheel ready"
    );

    let core = WheelCore {
        motor,
        encoder,
        store,
        clock,
        estop_debounce_n: safety.estop_debounce_n,
        motion_cfg: motion,
        servo_cfg: servo,
        safety,
        calibration,
        slots,
        state,
        active: None,
        estop_check: hooks.estop_check,
        estop_latched: false,
        estop_count: 0,
        observer: hooks.observer,
    };
    core.notify(WheelStatus::Ready);
    Ok(core)
}

/// Build a statically dispatched wheel from concrete parts.
pub fn build_wheel<M, E, S>(
    motor: M,
    encoder: Option<E>,
    store: S,
    settings: WheelSettings,
    hooks: WheelHooks,
) -> Result<WheelCore<M, E, S>>
where
    M: Motor,
    E: Encoder,
    S: Store,
{
    validate_and_build(motor, encoder, store, settings, hooks)
}

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for [`FilterWheel`]. Settings are validated on `build()`.
pub struct WheelBuilder<M, S> {
    motor: Option<Box<dyn Motor>>,
    encoder: Option<Box<dyn Encoder>>,
    store: Option<Box<dyn Store>>,
    settings: WheelSettings,
    hooks: WheelHooks,
    _m: PhantomData<M>,
    _s: PhantomData<S>,
}

impl Default for WheelBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            motor: None,
            encoder: None,
            store: None,
            settings: WheelSettings::default(),
            hooks: WheelHooks::default(),
            _m: PhantomData,
            _s: PhantomData,
        }
    }
}

impl FilterWheel {
    pub fn builder() -> WheelBuilder<Missing, Missing> {
        WheelBuilder::default()
    }
}

impl<M, S> WheelBuilder<M, S> {
    /// Fallible build available in any type-state.
    pub fn try_build(self) -> Result<FilterWheel> {
        let motor = self
            .motor
            .ok_or_else(|| eyre::Report::new(BuildError::MissingMotor))?;
        let store = self
            .store
            .ok_or_else(|| eyre::Report::new(BuildError::MissingStore))?;
        validate_and_build(motor, self.encoder, store, self.settings, self.hooks)
    }

    pub fn with_encoder(mut self, encoder: impl Encoder + 'static) -> Self {
        self.encoder = Some(Box::new(encoder));
        self
    }
    pub fn with_settings(mut self, settings: WheelSettings) -> Self {
        self.settings = settings;
        self
    }
    pub fn with_motion(mut self, motion: MotionCfg) -> Self {
        self.settings.motion = motion;
        self
    }
    pub fn with_servo(mut self, servo: ServoCfg) -> Self {
        self.settings.servo = servo;
        self
    }
    pub fn with_safety(mut self, safety: SafetyCfg) -> Self {
        self.settings.safety = safety;
        self
    }
    pub fn with_calibration(mut self, calibration: CalibrationCfg) -> Self {
        self.settings.calibration = calibration;
        self
    }
    pub fn with_motor_params(mut self, params: MotorParams) -> Self {
        self.settings.motor = params;
        self
    }
    pub fn with_slot_table(mut self, slots: SlotTable) -> Self {
        self.settings.slots = slots;
        self
    }
    pub fn with_estop_check<F>(mut self, f: F) -> Self
    where
        F: Fn() -> bool + 'static,
    {
        self.hooks.estop_check = Some(Box::new(f));
        self
    }
    pub fn with_estop_debounce(mut self, n: u8) -> Self {
        self.settings.safety.estop_debounce_n = n.max(1);
        self
    }
    /// Provide a custom clock; defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.hooks.clock = Some(clock);
        self
    }
    pub fn with_observer(mut self, tx: Sender<StatusEvent>) -> Self {
        self.hooks.observer = Some(tx);
        self
    }
}

impl<S> WheelBuilder<Missing, S> {
    pub fn with_motor(self, motor: impl Motor + 'static) -> WheelBuilder<Set, S> {
        WheelBuilder {
            motor: Some(Box::new(motor)),
            encoder: self.encoder,
            store: self.store,
            settings: self.settings,
            hooks: self.hooks,
            _m: PhantomData,
            _s: PhantomData,
        }
    }
}

impl<M> WheelBuilder<M, Missing> {
    pub fn with_store(self, store: impl Store + 'static) -> WheelBuilder<M, Set> {
        WheelBuilder {
            motor: self.motor,
            encoder: self.encoder,
            store: Some(Box::new(store)),
            settings: self.settings,
            hooks: self.hooks,
            _m: PhantomData,
            _s: PhantomData,
        }
    }
}

impl WheelBuilder<Set, Set> {
    /// Validate and build. Only available once motor and store are set.
    pub fn build(self) -> Result<FilterWheel> {
        self.try_build()
    }
}
