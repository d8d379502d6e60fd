//! Open-loop step counting between slots.

use wheel_traits::{HwResult, Motor};

use crate::config::DirectionMode;

/// Signed steps to move from `from` to `to`.
///
/// Unidirectional mode only advances, so the slot delta wraps modulo
/// `filter_count` and the result is never negative. Bidirectional mode takes
/// the shortest signed delta (forward on an exact half-turn tie).
/// Steps are `delta * steps_per_revolution / filter_count`, multiplied first
/// and truncated toward zero, so rounding never accumulates per slot.
pub fn compute_steps(
    from: u8,
    to: u8,
    filter_count: u8,
    steps_per_revolution: u32,
    mode: DirectionMode,
) -> i64 {
    if from == to || filter_count == 0 {
        return 0;
    }
    let n = i64::from(filter_count);
    let mut delta = (i64::from(to) - i64::from(from)).rem_euclid(n);
    if mode == DirectionMode::Bidirectional && delta * 2 > n {
        delta -= n;
    }
    delta * i64::from(steps_per_revolution) / n
}

/// Issue a signed relative move, blocking until done.
pub fn issue_steps<M: Motor + ?Sized>(motor: &mut M, steps: i64) -> HwResult<()> {
    let n = u32::try_from(steps.unsigned_abs())?;
    match steps.signum() {
        1 => motor.step_forward(n),
        -1 => motor.step_backward(n),
        _ => Ok(()),
    }
}

/// An open-loop move issued in bounded chunks.
#[derive(Debug, Clone)]
pub struct StepRun {
    remaining: i64,
    issued: i64,
}

impl StepRun {
    pub fn new(total: i64) -> Self {
        Self {
            remaining: total,
            issued: 0,
        }
    }

    pub fn remaining(&self) -> i64 {
        self.remaining
    }

    pub fn issued(&self) -> i64 {
        self.issued
    }

    pub fn is_done(&self) -> bool {
        self.remaining == 0
    }

    /// Issue up to `chunk` steps. Returns `true` once the move is complete.
    pub fn tick<M: Motor + ?Sized>(&mut self, motor: &mut M, chunk: u32) -> HwResult<bool> {
        if self.remaining == 0 {
            return Ok(true);
        }
        let limit = i64::from(chunk.max(1));
        let part = self.remaining.clamp(-limit, limit);
        issue_steps(motor, part)?;
        self.remaining -= part;
        self.issued += part;
        tracing::trace!(part, remaining = self.remaining, "fallback chunk");
        Ok(self.remaining == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use DirectionMode::{Bidirectional, Unidirectional};

    #[test]
    fn same_slot_is_zero() {
        assert_eq!(compute_steps(3, 3, 5, 2048, Unidirectional), 0);
        assert_eq!(compute_steps(3, 3, 5, 2048, Bidirectional), 0);
    }

    #[test]
    fn unidirectional_wraps_forward() {
        assert_eq!(compute_steps(1, 3, 5, 2048, Unidirectional), 819);
        assert_eq!(compute_steps(3, 1, 5, 2048, Unidirectional), 1228);
        assert_eq!(compute_steps(5, 1, 5, 2048, Unidirectional), 409);
    }

    #[test]
    fn bidirectional_takes_shortest_path() {
        assert_eq!(compute_steps(1, 3, 5, 2048, Bidirectional), 819);
        assert_eq!(compute_steps(1, 4, 5, 2048, Bidirectional), -819);
        assert_eq!(compute_steps(5, 1, 5, 2048, Bidirectional), 409);
        // half-turn tie goes forward
        assert_eq!(compute_steps(1, 3, 4, 2048, Bidirectional), 1024);
    }
}
