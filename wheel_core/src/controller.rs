//! `WheelCore`: the motion controller.
//!
//! Owns the motor, the optional encoder and the store. Moves are planned by
//! `start_move` and advanced by `step`; `move_to_slot` drives them to
//! completion. Servo first, open-loop steps when the encoder is absent,
//! unhealthy or the servo gives up.

use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::Sender;
use wheel_traits::{Clock, Encoder, Motor, Store};

use crate::angle::{angle_to_position, angular_error};
use crate::backlash::{Direction, compensate};
use crate::config::{CalibrationCfg, MotionCfg, SafetyCfg, ServoCfg};
use crate::error::{Report, Result, WheelError};
use crate::fallback::{StepRun, compute_steps};
use crate::hw_error::{map_hw_error, map_store_error};
use crate::servo::{ServoRun, ServoTick};
use crate::session::{CalibrationSession, SessionKind};
use crate::slots::SlotTable;
use crate::state::{WheelSnapshot, WheelState};
use crate::status::{MotionState, MotionStatus, MoveReport, StatusEvent, Strategy, WheelStatus};

pub(crate) enum Phase {
    Servo(ServoRun),
    Steps(StepRun),
}

pub(crate) struct ActiveMove {
    target: u8,
    phase: Phase,
    started: Instant,
    servo_iterations: u32,
    servo_steps: i64,
    energized: bool,
}

enum Progress {
    Running,
    Done {
        strategy: Strategy,
        angle: Option<f32>,
    },
    ServoFailed(String),
    Failed(WheelError),
}

/// Diagnostic report from [`WheelCore::self_check`].
#[derive(Debug, Clone, PartialEq)]
pub struct SelfCheck {
    pub motor_driver: String,
    pub motor_version: String,
    pub motor_enabled: bool,
    /// Driver stall flag; `None` when the driver cannot report one.
    pub stall_detected: Option<bool>,
    pub encoder_present: bool,
    pub encoder_available: bool,
    pub encoder_healthy: bool,
    pub encoder_type: Option<String>,
    pub angle: Option<f32>,
    pub raw_counts: Option<u16>,
}

pub struct WheelCore<M, E, S> {
    pub(crate) motor: M,
    pub(crate) encoder: Option<E>,
    pub(crate) store: S,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) motion_cfg: MotionCfg,
    pub(crate) servo_cfg: ServoCfg,
    pub(crate) safety: SafetyCfg,
    pub(crate) calibration: CalibrationCfg,
    pub(crate) slots: SlotTable,
    pub(crate) state: WheelState,
    pub(crate) active: Option<ActiveMove>,
    pub(crate) estop_check: Option<Box<dyn Fn() -> bool>>,
    pub(crate) estop_latched: bool,
    pub(crate) estop_debounce_n: u8,
    pub(crate) estop_count: u8,
    pub(crate) observer: Option<Sender<StatusEvent>>,
}

impl<M, E, S> core::fmt::Debug for WheelCore<M, E, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WheelCore")
            .field("slot", &self.state.current_slot)
            .field("filter_count", &self.state.filter_count)
            .field("motion", &self.state.motion)
            .field("session", &self.state.session)
            .field("encoder", &self.encoder.is_some())
            .finish_non_exhaustive()
    }
}

impl<M: Motor, E: Encoder, S: Store> WheelCore<M, E, S> {
    // ── Read-only accessors ──────────────────────────────────────────────────

    pub fn current_slot(&self) -> u8 {
        self.state.current_slot
    }

    pub fn filter_count(&self) -> u8 {
        self.state.filter_count
    }

    pub fn motion_state(&self) -> MotionState {
        self.state.motion
    }

    pub fn last_error(&self) -> Option<crate::error::ErrorCode> {
        self.state.last_error
    }

    pub fn is_calibrated(&self) -> bool {
        self.state.calibrated
    }

    /// Advisory: the encoder disagreed with the believed position.
    pub fn needs_calibration(&self) -> bool {
        self.state.needs_calibration
    }

    pub fn session(&self) -> Option<SessionKind> {
        self.state.session.as_ref().map(CalibrationSession::kind)
    }

    /// Full view of the active session, for progress display.
    pub fn session_detail(&self) -> Option<&CalibrationSession> {
        self.state.session.as_ref()
    }

    pub fn steps_per_revolution(&self) -> u32 {
        self.state.steps_per_revolution
    }

    pub fn backlash_steps(&self) -> u32 {
        self.state.backlash_steps
    }

    pub fn snapshot(&self) -> WheelSnapshot {
        self.state.snapshot()
    }

    pub fn slot_name(&self, slot: u8) -> String {
        self.slots.name(slot)
    }

    /// Angle the servo aims for at `slot`.
    pub fn target_angle(&self, slot: u8) -> f32 {
        self.slots.angle(slot, self.state.filter_count)
    }

    /// Encoder present, responding and mostly error-free.
    pub fn encoder_healthy(&self) -> bool {
        self.encoder
            .as_ref()
            .is_some_and(|e| e.is_available() && e.is_healthy())
    }

    /// Current encoder angle, `None` without a working encoder.
    pub fn encoder_angle(&mut self) -> Option<f32> {
        let enc = self.encoder.as_mut().filter(|e| e.is_available())?;
        match enc.angle() {
            Ok(a) => Some(a),
            Err(e) => {
                tracing::debug!(error = %e, "encoder read failed");
                None
            }
        }
    }

    pub fn motor(&self) -> &M {
        &self.motor
    }

    // ── Motion ───────────────────────────────────────────────────────────────

    /// Move to `target` and block until done.
    pub fn move_to_slot(&mut self, target: u8) -> Result<MoveReport> {
        self.start_move(target)?;
        loop {
            match self.step()? {
                MotionStatus::Running => {}
                MotionStatus::Complete(report) => return Ok(report),
                MotionStatus::Aborted(e) => return Err(Report::new(e)),
            }
        }
    }

    /// Validate and plan a move to `target`; enters `Moving`.
    pub fn start_move(&mut self, target: u8) -> Result<()> {
        if let Err(e) = self.check_slot(target) {
            return Err(self.reject(e));
        }
        if let Err(e) = self.check_admission() {
            return Err(self.reject(e));
        }
        self.clear_estop();

        let from = self.state.current_slot;
        let (phase, strategy) = if self.encoder_healthy() {
            let run = ServoRun::new(
                self.target_angle(target),
                self.servo_cfg.control_tolerance_deg,
            );
            (Phase::Servo(run), Strategy::Servo)
        } else {
            (Phase::Steps(StepRun::new(self.plan_steps(target))), Strategy::Steps)
        };
        self.active = Some(ActiveMove {
            target,
            phase,
            started: self.clock.now(),
            servo_iterations: 0,
            servo_steps: 0,
            energized: false,
        });
        self.state.motion = MotionState::Moving { target };
        tracing::info!(from, to = target, ?strategy, "move started");
        self.notify(WheelStatus::Moving);
        Ok(())
    }

    /// Advance the active move by one servo iteration or one step chunk.
    pub fn step(&mut self) -> Result<MotionStatus> {
        let Some(mut active) = self.active.take() else {
            return Err(Report::new(WheelError::InvalidState(
                "no move in progress".into(),
            )));
        };

        if self.estop_latched || self.poll_estop() {
            self.halt("estop");
            self.state.motion = MotionState::Idle;
            self.state.last_error = Some(WheelError::EmergencyStop.code());
            self.notify(WheelStatus::Stopped);
            return Ok(MotionStatus::Aborted(WheelError::EmergencyStop));
        }

        let elapsed = self.clock.ms_since(active.started);
        if self.safety.move_timeout_ms > 0 && elapsed > self.safety.move_timeout_ms {
            tracing::error!(elapsed_ms = elapsed, target = active.target, "move timed out");
            self.halt("timeout");
            let err = WheelError::MovementTimeout(elapsed);
            self.state.motion = MotionState::Error { code: err.code() };
            self.state.last_error = Some(err.code());
            self.notify(WheelStatus::Error(err.code()));
            return Ok(MotionStatus::Aborted(err));
        }

        let progress = match &mut active.phase {
            Phase::Servo(run) => match self.encoder.as_mut() {
                Some(encoder) => {
                    let tick = run.tick(&mut self.motor, encoder, &*self.clock, &self.servo_cfg);
                    active.servo_iterations = run.iterations();
                    active.servo_steps = run.net_steps();
                    active.energized |= run.energized();
                    if let Ok(ServoTick::Corrected { steps, .. }) = tick {
                        self.state.last_direction = Direction::of(steps);
                    }
                    match tick.map(ServoTick::outcome) {
                        Ok(None) => Progress::Running,
                        Ok(Some(Ok(angle))) => Progress::Done {
                            strategy: Strategy::Servo,
                            angle: Some(angle),
                        },
                        Ok(Some(Err(e))) | Err(e) => Progress::ServoFailed(e.to_string()),
                    }
                }
                None => Progress::ServoFailed("encoder missing".into()),
            },
            Phase::Steps(run) => {
                let mut enable_failed = None;
                if !run.is_done() && !active.energized {
                    match self.motor.enable() {
                        Ok(()) => active.energized = true,
                        Err(e) => enable_failed = Some(map_hw_error(&*e)),
                    }
                }
                match enable_failed {
                    Some(e) => Progress::Failed(WheelError::MovementFailed(e.to_string())),
                    None => match run.tick(&mut self.motor, self.safety.chunk_steps) {
                        Ok(done) => {
                            if let Some(d) = Direction::of(run.issued()) {
                                self.state.last_direction = Some(d);
                            }
                            if done {
                                Progress::Done {
                                    strategy: Strategy::Steps,
                                    angle: None,
                                }
                            } else {
                                Progress::Running
                            }
                        }
                        Err(e) => Progress::Failed(WheelError::MovementFailed(
                            map_hw_error(&*e).to_string(),
                        )),
                    },
                }
            }
        };

        match progress {
            Progress::Running => {
                self.active = Some(active);
                Ok(MotionStatus::Running)
            }
            Progress::Done { strategy, angle } => {
                Ok(MotionStatus::Complete(self.complete(&active, strategy, angle)))
            }
            Progress::ServoFailed(reason) => {
                tracing::warn!(reason = %reason, target = active.target, "servo failed, falling back to steps");
                self.disable_motor("servo failure");
                active.energized = false;
                let plan = self.plan_steps(active.target);
                active.phase = Phase::Steps(StepRun::new(plan));
                self.active = Some(active);
                Ok(MotionStatus::Running)
            }
            Progress::Failed(err) => Ok(MotionStatus::Aborted(self.fail(err))),
        }
    }

    /// Halt immediately and de-energize. Clears `Moving` to `Idle`; a
    /// calibration session stays active.
    pub fn emergency_stop(&mut self) {
        tracing::warn!(motion = ?self.state.motion, "emergency stop");
        self.halt("emergency stop");
        self.estop_latched = false;
        self.estop_count = 0;
        self.state.motion = MotionState::Idle;
        self.notify(WheelStatus::Stopped);
    }

    fn complete(&mut self, active: &ActiveMove, strategy: Strategy, angle: Option<f32>) -> MoveReport {
        let target = active.target;
        let from = self.state.current_slot;
        let steps_issued = active.servo_steps
            + match &active.phase {
                Phase::Steps(run) => run.issued(),
                Phase::Servo(_) => 0,
            };

        self.state.current_slot = target;
        if let Err(e) = self.store.save_current_slot(target) {
            tracing::warn!(error = %e, slot = target, "persisting slot failed");
        }
        if active.energized {
            self.clock.sleep_ms(self.motion_cfg.disable_delay_ms);
        }
        self.disable_motor("move complete");
        self.state.motion = MotionState::Idle;
        self.state.last_error = None;

        let mut final_angle = angle;
        let mut flagged = false;
        if self.encoder_healthy() {
            let expected = self.target_angle(target);
            if let Some(a) = self.encoder_angle() {
                final_angle = Some(a);
                let err = angular_error(a, expected);
                if err.abs() > self.servo_cfg.verify_tolerance_deg {
                    tracing::warn!(slot = target, angle = a, expected, error = err, "position verification failed");
                    self.state.needs_calibration = true;
                    flagged = true;
                }
            }
        }

        tracing::info!(from, to = target, ?strategy, steps = steps_issued, "move complete");
        self.notify(if flagged {
            WheelStatus::NeedsCalibration
        } else {
            WheelStatus::Ready
        });
        MoveReport {
            slot: target,
            strategy,
            servo_iterations: active.servo_iterations,
            steps_issued,
            final_angle,
            needs_calibration: flagged,
        }
    }

    fn fail(&mut self, err: WheelError) -> WheelError {
        tracing::error!(error = %err, "move failed");
        self.disable_motor("move failed");
        self.state.motion = MotionState::Error { code: err.code() };
        self.state.last_error = Some(err.code());
        self.notify(WheelStatus::Error(err.code()));
        err
    }

    fn plan_steps(&self, target: u8) -> i64 {
        let planned = compute_steps(
            self.state.current_slot,
            target,
            self.state.filter_count,
            self.state.steps_per_revolution,
            self.motion_cfg.direction_mode,
        );
        let adjusted = compensate(
            planned,
            self.state.last_direction,
            self.state.backlash_steps,
            self.state.backlash_enabled,
        );
        tracing::debug!(planned, adjusted, "open-loop plan");
        adjusted
    }

    // ── Manual motion and bookkeeping ────────────────────────────────────────

    /// Jog by a signed number of steps without changing the believed slot.
    ///
    /// Allowed outside sessions and during guided calibration.
    pub fn jog(&mut self, steps: i32) -> Result<i64> {
        if let Err(e) = self.check_manual_motion() {
            return Err(self.reject(e));
        }
        if steps == 0 || steps.unsigned_abs() > self.motion_cfg.max_manual_steps {
            return Err(self.reject(WheelError::InvalidParameter(
                "jog steps must be non-zero and within max_manual_steps",
            )));
        }
        self.clear_estop();
        if let Err(e) = self.run_blocking_steps(i64::from(steps)) {
            return Err(self.reject(e));
        }
        self.clock.sleep_ms(self.motion_cfg.disable_delay_ms);
        self.disable_motor("jog complete");
        tracing::debug!(steps, position = self.motor.position(), "jog");
        Ok(self.motor.position())
    }

    /// Move the motor to an absolute step position.
    pub fn step_to(&mut self, position: i64) -> Result<i64> {
        if let Err(e) = self.check_manual_motion() {
            return Err(self.reject(e));
        }
        let delta = position - self.motor.position();
        if delta.unsigned_abs() > u64::from(self.motion_cfg.max_manual_steps) {
            return Err(self.reject(WheelError::InvalidParameter(
                "step_to distance exceeds max_manual_steps",
            )));
        }
        if delta != 0 {
            let moved = self
                .motor
                .enable()
                .and_then(|()| self.motor.move_to(position));
            if let Err(e) = moved {
                self.disable_motor("step_to failed");
                let err = WheelError::MovementFailed(map_hw_error(&*e).to_string());
                return Err(self.reject(err));
            }
            self.state.last_direction = Direction::of(delta);
            self.clock.sleep_ms(self.motion_cfg.disable_delay_ms);
            self.disable_motor("step_to complete");
        }
        Ok(self.motor.position())
    }

    /// Overwrite the believed slot without moving.
    pub fn set_slot(&mut self, slot: u8) -> Result<()> {
        if let Err(e) = self.check_slot(slot) {
            return Err(self.reject(e));
        }
        if let Err(e) = self.check_admission() {
            return Err(self.reject(e));
        }
        if let Err(e) = self.store.save_current_slot(slot) {
            let err = map_store_error(&*e);
            return Err(self.reject(err));
        }
        self.state.current_slot = slot;
        self.state.needs_calibration = false;
        tracing::info!(slot, "slot set");
        self.notify(WheelStatus::Ready);
        Ok(())
    }

    /// Change the number of slots. Resets the slot to 1 when it no longer fits.
    pub fn set_filter_count(&mut self, count: u8) -> Result<()> {
        if let Err(e) = self.check_admission() {
            return Err(self.reject(e));
        }
        if !(crate::MIN_FILTER_COUNT..=crate::MAX_FILTER_COUNT).contains(&count) {
            return Err(self.reject(WheelError::InvalidParameter(
                "filter count must be in 3..=9",
            )));
        }
        if let Err(e) = self.store.save_filter_count(count) {
            let err = map_store_error(&*e);
            return Err(self.reject(err));
        }
        self.state.filter_count = count;
        if self.state.current_slot > count {
            self.state.current_slot = 1;
            if let Err(e) = self.store.save_current_slot(1) {
                let err = map_store_error(&*e);
                return Err(self.reject(err));
            }
        }
        tracing::info!(count, slot = self.state.current_slot, "filter count set");
        self.notify(WheelStatus::Ready);
        Ok(())
    }

    /// Compare the encoder against the believed slot while idle.
    ///
    /// Flags the wheel for recalibration on disagreement and returns the slot
    /// the encoder reports. `None` when busy or without a working encoder.
    pub fn check_position(&mut self) -> Option<u8> {
        if self.state.motion.is_moving() || self.state.session.is_some() {
            return None;
        }
        if !self.encoder_healthy() {
            return None;
        }
        let angle = self.encoder_angle()?;
        let observed = angle_to_position(angle, self.state.filter_count);
        if self.state.calibrated
            && observed != self.state.current_slot
            && !self.state.needs_calibration
        {
            tracing::warn!(
                believed = self.state.current_slot,
                observed,
                angle,
                "encoder disagrees with position"
            );
            self.state.needs_calibration = true;
            self.notify(WheelStatus::NeedsCalibration);
        }
        Some(observed)
    }

    pub fn self_check(&mut self) -> SelfCheck {
        let (encoder_present, encoder_available, encoder_type) = match &self.encoder {
            Some(e) => (true, e.is_available(), Some(e.encoder_type().to_string())),
            None => (false, false, None),
        };
        let encoder_healthy = self.encoder_healthy();
        let angle = self.encoder_angle();
        let raw_counts = self
            .encoder
            .as_mut()
            .filter(|e| e.is_available())
            .and_then(|e| e.raw_value().ok());
        let stall_detected = self.motor.extras().and_then(|x| match x.stall_detected() {
            Ok(stalled) => Some(stalled),
            Err(e) => {
                tracing::debug!(error = %e, "stall query failed");
                None
            }
        });
        SelfCheck {
            motor_driver: self.motor.driver_name().to_string(),
            motor_version: self.motor.driver_version().to_string(),
            motor_enabled: self.motor.is_enabled(),
            stall_detected,
            encoder_present,
            encoder_available,
            encoder_healthy,
            encoder_type,
            angle,
            raw_counts,
        }
    }

    // ── Internals shared with calibration ────────────────────────────────────

    pub(crate) fn reject(&mut self, err: WheelError) -> Report {
        self.state.last_error = Some(err.code());
        tracing::debug!(code = %err.code(), error = %err, "request rejected");
        Report::new(err)
    }

    fn check_slot(&self, slot: u8) -> core::result::Result<(), WheelError> {
        if slot == 0 || slot > self.state.filter_count {
            return Err(WheelError::InvalidPosition {
                slot,
                filter_count: self.state.filter_count,
            });
        }
        Ok(())
    }

    /// Not moving and no calibration running.
    pub(crate) fn check_admission(&self) -> core::result::Result<(), WheelError> {
        if self.state.motion.is_moving() {
            return Err(WheelError::SystemBusy("move in progress"));
        }
        if self.state.session.is_some() {
            return Err(WheelError::SystemBusy("calibration in progress"));
        }
        Ok(())
    }

    fn check_manual_motion(&self) -> core::result::Result<(), WheelError> {
        if self.state.motion.is_moving() {
            return Err(WheelError::SystemBusy("move in progress"));
        }
        match self.state.session {
            None | Some(CalibrationSession::GuidedOffset) => Ok(()),
            Some(_) => Err(WheelError::SystemBusy("calibration in progress")),
        }
    }

    /// Issue `steps` in watchdog-sized chunks, polling the e-stop between
    /// chunks. Leaves the motor energized on success.
    pub(crate) fn run_blocking_steps(&mut self, steps: i64) -> core::result::Result<(), WheelError> {
        if steps == 0 {
            return Ok(());
        }
        if let Err(e) = self.motor.enable() {
            return Err(WheelError::MovementFailed(map_hw_error(&*e).to_string()));
        }
        let mut run = StepRun::new(steps);
        let started = self.clock.now();
        loop {
            if self.estop_latched || self.poll_estop() {
                self.halt("estop");
                self.notify(WheelStatus::Stopped);
                return Err(WheelError::EmergencyStop);
            }
            let elapsed = self.clock.ms_since(started);
            if self.safety.move_timeout_ms > 0 && elapsed > self.safety.move_timeout_ms {
                tracing::error!(elapsed_ms = elapsed, steps, "manual move timed out");
                self.halt("timeout");
                let err = WheelError::MovementTimeout(elapsed);
                self.state.motion = MotionState::Error { code: err.code() };
                self.state.last_error = Some(err.code());
                self.notify(WheelStatus::Error(err.code()));
                return Err(err);
            }
            match run.tick(&mut self.motor, self.safety.chunk_steps) {
                Ok(done) => {
                    self.state.last_direction = Direction::of(steps);
                    if done {
                        return Ok(());
                    }
                }
                Err(e) => {
                    self.disable_motor("manual move failed");
                    return Err(WheelError::MovementFailed(map_hw_error(&*e).to_string()));
                }
            }
        }
    }

    pub(crate) fn disable_motor(&mut self, context: &'static str) {
        if let Err(e) = self.motor.disable() {
            tracing::warn!(error = %e, context, "motor disable failed");
        }
    }

    /// Stop step issuance and drop the coils; forgets any active move.
    fn halt(&mut self, context: &'static str) {
        self.active = None;
        if let Err(e) = self.motor.emergency_stop() {
            tracing::warn!(error = %e, context, "motor emergency_stop failed");
        }
        self.disable_motor(context);
    }

    pub(crate) fn clear_estop(&mut self) {
        self.estop_latched = false;
        self.estop_count = 0;
    }

    /// Poll the e-stop input with debounce; returns true once latched.
    fn poll_estop(&mut self) -> bool {
        if let Some(check) = &self.estop_check {
            if check() {
                self.estop_count = self.estop_count.saturating_add(1);
                if self.estop_count >= self.estop_debounce_n {
                    self.estop_latched = true;
                }
            } else {
                self.estop_count = 0;
            }
        }
        self.estop_latched
    }

    pub(crate) fn notify(&self, status: WheelStatus) {
        let Some(tx) = &self.observer else {
            return;
        };
        let event = StatusEvent {
            status,
            slot: self.state.current_slot,
            filter_count: self.state.filter_count,
            moving: self.state.motion.is_moving(),
            slot_name: self.slots.name(self.state.current_slot),
        };
        if tx.try_send(event).is_err() {
            tracing::trace!(status = status.as_str(), "status observer dropped event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{MemoryStore, NoEncoder};
    use crate::{WheelHooks, WheelSettings, build_wheel};
    use wheel_hardware::{SimParams, SimulatedMotor, SimulatedWheel};

    fn core() -> (SimulatedWheel, WheelCore<SimulatedMotor, NoEncoder, MemoryStore>) {
        let sim = SimulatedWheel::new(SimParams::default());
        let mut settings = WheelSettings::default();
        settings.motion.disable_delay_ms = 0;
        let core = build_wheel(sim.motor(), None, MemoryStore::new(), settings, WheelHooks::default())
                .unwrap();
        (sim, core)
    }

    #[test]
    fn moving_state_rejects_second_move() {
        let (sim, mut w) = core();
        w.start_move(3).unwrap();
        assert_eq!(w.motion_state(), MotionState::Moving { target: 3 });

        let err = w.move_to_slot(2).unwrap_err();
        match err.downcast_ref::<WheelError>() {
            Some(WheelError::SystemBusy(_)) => {}
            other => panic!("expected SystemBusy, got {other:?}"),
        }
        // The rejected request issued nothing and did not replace the plan.
        assert!(sim.step_log().is_empty());
        assert_eq!(w.motion_state(), MotionState::Moving { target: 3 });

        while let MotionStatus::Running = w.step().unwrap() {}
        assert_eq!(w.current_slot(), 3);
        assert_eq!(sim.forward_steps(), 819);
    }

    #[test]
    fn step_without_move_is_an_error() {
        let (_sim, mut w) = core();
        let err = w.step().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WheelError>(),
            Some(WheelError::InvalidState(_))
        ));
    }

    #[test]
    fn open_loop_moves_in_chunks() {
        let (sim, mut w) = core();
        w.move_to_slot(3).unwrap();
        let log = sim.step_log();
        assert!(log.iter().all(|s| *s > 0 && *s <= 64), "log {log:?}");
        assert_eq!(log.iter().sum::<i64>(), 819);
    }
}
