//! Homing and the operator-driven calibration sessions.
//!
//! At most one session is active at a time and moves are refused while one
//! is. Measured values are persisted only when the session finishes;
//! `abandon_calibration` discards them.

use eyre::WrapErr;
use wheel_traits::{Encoder, Motor, Store};

use crate::angle::{mean_angle, normalize_angle};
use crate::backlash::{BacklashMeasurement, BacklashPhase, Direction, MarkOutcome};
use crate::controller::WheelCore;
use crate::error::{Result, WheelError};
use crate::hw_error::map_store_error;
use crate::session::{CalibrationSession, RevolutionResult};
use crate::status::WheelStatus;

/// Result of [`WheelCore::calibrate_home`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HomeReport {
    /// New sensor offset, when an encoder took part.
    pub offset_deg: Option<f32>,
    pub samples: usize,
}

/// Progress after one backlash test step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BacklashProgress {
    pub phase: BacklashPhase,
    /// Steps issued so far in this phase.
    pub phase_steps: u32,
    /// Encoder angle after the step, so the operator can see movement start.
    pub angle: Option<f32>,
}

impl<M: Motor, E: Encoder, S: Store> WheelCore<M, E, S> {
    /// Declare the current physical position to be slot 1 and zero the
    /// encoder there. Repeatable: each call re-derives the offset.
    pub fn calibrate_home(&mut self) -> Result<HomeReport> {
        if let Err(e) = self.check_admission() {
            return Err(self.reject(e));
        }

        let mut report = HomeReport {
            offset_deg: None,
            samples: 0,
        };
        if self.encoder_healthy() {
            let mut samples = Vec::with_capacity(self.calibration.home_samples as usize);
            for i in 0..self.calibration.home_samples {
                if i > 0 {
                    self.clock.sleep_ms(self.calibration.sample_interval_ms);
                }
                if let Some(a) = self.encoder_angle() {
                    samples.push(a);
                }
            }
            report.samples = samples.len();
            match mean_angle(&samples) {
                Some(mean) => {
                    // Samples are relative to whatever offset the sensor applies now.
                    let applied = self
                        .encoder
                        .as_ref()
                        .map_or(self.state.angle_offset, E::angle_offset);
                    let offset = normalize_angle(mean + applied);
                    self.persist_offset(offset)?;
                    report.offset_deg = Some(offset);
                    tracing::info!(offset, samples = report.samples, "encoder zeroed at home");
                }
                None => tracing::warn!("no encoder samples during homing; offset unchanged"),
            }
        }

        self.commit_home()?;
        self.notify(WheelStatus::Calibrated);
        Ok(report)
    }

    /// Begin guided offset calibration. The operator jogs the wheel onto
    /// slot 1, then calls [`Self::finish_guided_calibration`].
    pub fn start_guided_calibration(&mut self) -> Result<()> {
        self.begin_session(CalibrationSession::GuidedOffset)?;
        self.state.current_slot = 1;
        self.state.needs_calibration = false;
        tracing::info!("guided calibration started; align slot 1");
        Ok(())
    }

    /// Capture the raw sensor angle as the new offset so the current
    /// physical position reads 0°.
    pub fn finish_guided_calibration(&mut self) -> Result<f32> {
        if !matches!(self.state.session, Some(CalibrationSession::GuidedOffset)) {
            return Err(self.reject(WheelError::CalibrationNotActive));
        }
        if let Err(e) = self.check_not_moving() {
            return Err(self.reject(e));
        }
        let raw = match self.encoder.as_mut() {
            Some(enc) if enc.is_available() => {
                let resolution = f32::from(enc.resolution().max(1));
                enc.raw_value()
                    .ok()
                    .map(|counts| f32::from(counts) * 360.0 / resolution)
            }
            _ => None,
        };
        let Some(raw_deg) = raw else {
            tracing::warn!("guided calibration ended without a usable encoder");
            self.state.session = None;
            self.notify(WheelStatus::Ready);
            return Err(self.reject(WheelError::EncoderUnavailable));
        };

        let offset = normalize_angle(raw_deg);
        self.persist_offset(offset)?;
        self.commit_home()?;
        self.state.session = None;
        tracing::info!(offset, "guided calibration complete");
        self.notify(WheelStatus::Calibrated);
        Ok(offset)
    }

    /// Turn one assumed revolution forward and open a revolution session.
    pub fn start_revolution_calibration(&mut self) -> Result<()> {
        if self.state.session.is_some() {
            return Err(self.reject(WheelError::CalibrationAlreadyActive));
        }
        if let Err(e) = self.check_not_moving() {
            return Err(self.reject(e));
        }
        let assumed = self.state.steps_per_revolution;
        let start_position = self.motor.position();
        self.clear_estop();
        if let Err(e) = self.run_blocking_steps(i64::from(assumed)) {
            return Err(self.reject(e));
        }
        self.disable_motor("revolution pass complete");

        self.state.session = Some(CalibrationSession::Revolution {
            start_position,
            accumulated_steps: i64::from(assumed),
        });
        tracing::info!(assumed, start_position, "revolution calibration started");
        self.notify(WheelStatus::Calibrating);
        Ok(())
    }

    /// Nudge by `steps` (±1..=adjust_max_steps). Returns the running total.
    pub fn adjust_revolution_calibration(&mut self, steps: i32) -> Result<i64> {
        if !matches!(self.state.session, Some(CalibrationSession::Revolution { .. })) {
            return Err(self.reject(WheelError::CalibrationNotActive));
        }
        if let Err(e) = self.check_not_moving() {
            return Err(self.reject(e));
        }
        if steps == 0 || steps.unsigned_abs() > self.calibration.adjust_max_steps {
            return Err(self.reject(WheelError::InvalidParameter(
                "adjustment must be non-zero and within adjust_max_steps",
            )));
        }
        self.clear_estop();
        if let Err(e) = self.run_blocking_steps(i64::from(steps)) {
            return Err(self.reject(e));
        }
        self.disable_motor("revolution adjust complete");

        let mut total = 0;
        if let Some(CalibrationSession::Revolution {
            accumulated_steps, ..
        }) = self.state.session.as_mut()
        {
            *accumulated_steps += i64::from(steps);
            total = *accumulated_steps;
        }
        tracing::debug!(steps, total, "revolution adjusted");
        Ok(total)
    }

    /// Commit the counted revolution if it is plausible.
    ///
    /// An implausible total keeps the previous value and reports
    /// `accepted: false`; the session ends either way. A failed save keeps
    /// the session open so the finish can be retried.
    pub fn finish_revolution_calibration(&mut self) -> Result<RevolutionResult> {
        let Some(CalibrationSession::Revolution {
            start_position,
            accumulated_steps,
        }) = self.state.session
        else {
            return Err(self.reject(WheelError::CalibrationNotActive));
        };
        if let Err(e) = self.check_not_moving() {
            return Err(self.reject(e));
        }

        let min = i64::from(self.calibration.revolution_min_steps);
        let max = i64::from(self.calibration.revolution_max_steps);
        let plausible = (min..=max).contains(&accumulated_steps);
        tracing::debug!(
            accumulated_steps,
            travelled = self.motor.position() - start_position,
            "revolution measured"
        );

        let result = match u32::try_from(accumulated_steps) {
            Ok(measured) if plausible => {
                if let Err(e) = self.store.save_steps_per_revolution(measured) {
                    let err = map_store_error(&*e);
                    return Err(self.reject(err)).wrap_err("saving steps per revolution");
                }
                self.state.steps_per_revolution = measured;
                tracing::info!(steps_per_revolution = measured, "revolution calibrated");
                RevolutionResult {
                    steps_per_revolution: measured,
                    measured: accumulated_steps,
                    accepted: true,
                }
            }
            _ => {
                tracing::warn!(
                    measured = accumulated_steps,
                    min,
                    max,
                    kept = self.state.steps_per_revolution,
                    "implausible revolution rejected"
                );
                RevolutionResult {
                    steps_per_revolution: self.state.steps_per_revolution,
                    measured: accumulated_steps,
                    accepted: false,
                }
            }
        };
        self.state.session = None;
        self.notify(if result.accepted {
            WheelStatus::Calibrated
        } else {
            WheelStatus::Ready
        });
        Ok(result)
    }

    /// Open a two-phase backlash measurement. Needs a working encoder so the
    /// operator can see when the wheel starts to turn.
    pub fn start_backlash_calibration(&mut self) -> Result<()> {
        if !self.encoder_healthy() {
            return Err(self.reject(WheelError::EncoderUnavailable));
        }
        self.begin_session(CalibrationSession::Backlash(BacklashMeasurement::new()))?;
        tracing::info!("backlash calibration started (forward phase)");
        Ok(())
    }

    /// Issue `steps` test steps in the current phase's direction.
    pub fn test_backlash_step(&mut self, steps: u32) -> Result<BacklashProgress> {
        let direction = match &self.state.session {
            Some(CalibrationSession::Backlash(m)) => m.step_direction(),
            _ => return Err(self.reject(WheelError::CalibrationNotActive)),
        };
        if let Err(e) = self.check_not_moving() {
            return Err(self.reject(e));
        }
        let Some(direction) = direction else {
            return Err(self.reject(WheelError::InvalidState(
                "both backlash phases already marked".into(),
            )));
        };
        if steps == 0 || steps > self.calibration.backlash_max_test_steps {
            return Err(self.reject(WheelError::InvalidParameter(
                "test steps must be within 1..=backlash_max_test_steps",
            )));
        }

        let signed = match direction {
            Direction::Forward => i64::from(steps),
            Direction::Backward => -i64::from(steps),
        };
        self.clear_estop();
        if let Err(e) = self.run_blocking_steps(signed) {
            return Err(self.reject(e));
        }
        self.disable_motor("backlash test step complete");

        let (phase, phase_steps) = match self.state.session.as_mut() {
            Some(CalibrationSession::Backlash(m)) => {
                let total = m.record(steps);
                (m.phase(), total)
            }
            _ => (BacklashPhase::Complete, 0),
        };
        let angle = self.encoder_angle();
        tracing::debug!(?phase, steps, phase_steps, angle, "backlash test step");
        Ok(BacklashProgress {
            phase,
            phase_steps,
            angle,
        })
    }

    /// Close the current phase: forward first, then backward.
    pub fn mark_backlash_phase(&mut self) -> Result<MarkOutcome> {
        let outcome = match self.state.session.as_mut() {
            Some(CalibrationSession::Backlash(m)) => m.mark(),
            _ => return Err(self.reject(WheelError::CalibrationNotActive)),
        };
        let Some(outcome) = outcome else {
            return Err(self.reject(WheelError::InvalidState(
                "both backlash phases already marked".into(),
            )));
        };
        tracing::info!(?outcome, "backlash phase marked");
        Ok(outcome)
    }

    /// Persist the measured backlash and turn compensation on.
    pub fn finish_backlash_calibration(&mut self) -> Result<u32> {
        let result = match &self.state.session {
            Some(CalibrationSession::Backlash(m)) => m.result(),
            _ => return Err(self.reject(WheelError::CalibrationNotActive)),
        };
        let Some(backlash) = result else {
            return Err(self.reject(WheelError::InvalidState(
                "backlash measurement incomplete".into(),
            )));
        };
        if let Err(e) = self.check_not_moving() {
            return Err(self.reject(e));
        }
        if let Err(e) = self.store.save_backlash_steps(backlash) {
            let err = map_store_error(&*e);
            return Err(self.reject(err)).wrap_err("saving backlash steps");
        }
        self.state.session = None;
        self.state.backlash_steps = backlash;
        self.state.backlash_enabled = true;
        tracing::info!(backlash, "backlash calibrated");
        self.notify(WheelStatus::Calibrated);
        Ok(backlash)
    }

    /// Drop the active session without committing anything.
    pub fn abandon_calibration(&mut self) -> Result<()> {
        let Some(session) = self.state.session.take() else {
            return Err(self.reject(WheelError::CalibrationNotActive));
        };
        self.disable_motor("calibration abandoned");
        tracing::info!(kind = session.kind().as_str(), "calibration abandoned");
        self.notify(WheelStatus::Ready);
        Ok(())
    }

    fn begin_session(&mut self, session: CalibrationSession) -> Result<()> {
        if self.state.session.is_some() {
            return Err(self.reject(WheelError::CalibrationAlreadyActive));
        }
        if let Err(e) = self.check_not_moving() {
            return Err(self.reject(e));
        }
        self.state.session = Some(session);
        self.notify(WheelStatus::Calibrating);
        Ok(())
    }

    fn check_not_moving(&self) -> core::result::Result<(), WheelError> {
        if self.state.motion.is_moving() {
            return Err(WheelError::SystemBusy("move in progress"));
        }
        Ok(())
    }

    fn persist_offset(&mut self, offset: f32) -> Result<()> {
        if let Err(e) = self.store.save_angle_offset(offset) {
            let err = map_store_error(&*e);
            return Err(self.reject(err)).wrap_err("saving encoder offset");
        }
        if let Some(enc) = self.encoder.as_mut() {
            enc.set_angle_offset(offset);
        }
        self.state.angle_offset = offset;
        Ok(())
    }

    /// Slot 1, calibrated, advisory flag cleared; persisted.
    fn commit_home(&mut self) -> Result<()> {
        let saved = self
            .store
            .save_current_slot(1)
            .and_then(|()| self.store.save_calibrated(true));
        if let Err(e) = saved {
            let err = map_store_error(&*e);
            return Err(self.reject(err)).wrap_err("saving home position");
        }
        self.state.current_slot = 1;
        self.state.calibrated = true;
        self.state.needs_calibration = false;
        self.state.last_error = None;
        Ok(())
    }
}
