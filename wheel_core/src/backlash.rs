//! Backlash compensation and the two-phase measurement used to calibrate it.

/// Direction of a relative move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    /// Direction of a signed step count; `None` for zero.
    pub fn of(steps: i64) -> Option<Self> {
        match steps.signum() {
            1 => Some(Self::Forward),
            -1 => Some(Self::Backward),
            _ => None,
        }
    }
}

/// Add `backlash_steps` to `planned` when it reverses `last`.
///
/// Identity when compensation is disabled, the backlash is zero, nothing was
/// planned, or no previous direction is known.
pub fn compensate(planned: i64, last: Option<Direction>, backlash_steps: u32, enabled: bool) -> i64 {
    if !enabled || backlash_steps == 0 {
        return planned;
    }
    match (Direction::of(planned), last) {
        (Some(now), Some(prev)) if now != prev => {
            planned.saturating_add(planned.signum() * i64::from(backlash_steps))
        }
        _ => planned,
    }
}

/// Which side of the play is being measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BacklashPhase {
    Forward,
    Backward,
    /// Both sides marked; ready to commit.
    Complete,
}

/// Outcome of [`BacklashMeasurement::mark`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    Forward { steps: u32 },
    Complete { forward: u32, backward: u32, backlash: u32 },
}

/// Operator-guided backlash measurement.
///
/// The operator issues small test steps until the wheel visibly moves, then
/// marks the phase. Forward is measured first, then backward; the larger of
/// the two is the calibrated backlash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BacklashMeasurement {
    phase: BacklashPhase,
    test_steps: u32,
    forward: Option<u32>,
    backward: Option<u32>,
}

impl Default for BacklashMeasurement {
    fn default() -> Self {
        Self::new()
    }
}

impl BacklashMeasurement {
    pub fn new() -> Self {
        Self {
            phase: BacklashPhase::Forward,
            test_steps: 0,
            forward: None,
            backward: None,
        }
    }

    pub fn phase(&self) -> BacklashPhase {
        self.phase
    }

    /// Steps issued in the current phase.
    pub fn test_steps(&self) -> u32 {
        self.test_steps
    }

    pub fn forward_result(&self) -> Option<u32> {
        self.forward
    }

    /// Direction the next test step must take; `None` once complete.
    pub fn step_direction(&self) -> Option<Direction> {
        match self.phase {
            BacklashPhase::Forward => Some(Direction::Forward),
            BacklashPhase::Backward => Some(Direction::Backward),
            BacklashPhase::Complete => None,
        }
    }

    /// Account for `steps` test steps; returns the phase total.
    pub fn record(&mut self, steps: u32) -> u32 {
        self.test_steps = self.test_steps.saturating_add(steps);
        self.test_steps
    }

    /// Close the current phase. `None` when both phases are already marked.
    pub fn mark(&mut self) -> Option<MarkOutcome> {
        match self.phase {
            BacklashPhase::Forward => {
                let steps = self.test_steps;
                self.forward = Some(steps);
                self.phase = BacklashPhase::Backward;
                self.test_steps = 0;
                Some(MarkOutcome::Forward { steps })
            }
            BacklashPhase::Backward => {
                let backward = self.test_steps;
                let forward = self.forward.unwrap_or(0);
                self.backward = Some(backward);
                self.phase = BacklashPhase::Complete;
                Some(MarkOutcome::Complete {
                    forward,
                    backward,
                    backlash: forward.max(backward),
                })
            }
            BacklashPhase::Complete => None,
        }
    }

    /// Calibrated backlash once both phases are marked.
    pub fn result(&self) -> Option<u32> {
        match (self.phase, self.forward, self.backward) {
            (BacklashPhase::Complete, Some(f), Some(b)) => Some(f.max(b)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reversal_adds_play_in_new_direction() {
        assert_eq!(compensate(100, Some(Direction::Backward), 10, true), 110);
        assert_eq!(compensate(-100, Some(Direction::Forward), 10, true), -110);
        assert_eq!(compensate(100, Some(Direction::Forward), 10, true), 100);
        assert_eq!(compensate(100, None, 10, true), 100);
        assert_eq!(compensate(0, Some(Direction::Backward), 10, true), 0);
    }

    #[test]
    fn measurement_walks_both_phases() {
        let mut m = BacklashMeasurement::new();
        assert_eq!(m.step_direction(), Some(Direction::Forward));
        m.record(3);
        assert_eq!(m.record(4), 7);
        assert_eq!(m.mark(), Some(MarkOutcome::Forward { steps: 7 }));
        assert_eq!(m.phase(), BacklashPhase::Backward);
        assert_eq!(m.test_steps(), 0);
        assert_eq!(m.result(), None);
        m.record(9);
        assert_eq!(
            m.mark(),
            Some(MarkOutcome::Complete {
                forward: 7,
                backward: 9,
                backlash: 9
            })
        );
        assert_eq!(m.result(), Some(9));
        assert_eq!(m.mark(), None);
        assert_eq!(m.step_direction(), None);
    }
}
