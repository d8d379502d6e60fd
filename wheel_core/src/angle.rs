//! Slot/angle conversions on the wheel's wrapping coordinate.
//!
//! Every signed difference between two angles goes through [`angular_error`];
//! nothing else in the crate subtracts angles directly.

/// Wrap any finite angle into `[0, 360)`.
#[inline]
pub fn normalize_angle(deg: f32) -> f32 {
    let d = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if d >= 360.0 { 0.0 } else { d }
}

/// Nominal angle of `slot` on a wheel with `filter_count` evenly spaced slots.
///
/// Out-of-range input yields 0° rather than an error; callers validate slots
/// before commanding motion.
pub fn position_to_angle(slot: u8, filter_count: u8) -> f32 {
    if filter_count == 0 || slot == 0 || slot > filter_count {
        return 0.0;
    }
    f32::from(slot - 1) * (360.0 / f32::from(filter_count))
}

/// Nearest slot to `angle`, wrapping the last half-sector back to slot 1.
///
/// Negative, non-finite or `>= 360` angles map to slot 1.
pub fn angle_to_position(angle: f32, filter_count: u8) -> u8 {
    if filter_count == 0 || !angle.is_finite() || !(0.0..360.0).contains(&angle) {
        return 1;
    }
    let width = 360.0 / f32::from(filter_count);
    let idx = (angle / width).round() as u32 % u32::from(filter_count);
    // idx < filter_count <= u8::MAX
    idx as u8 + 1
}

/// Signed shortest-path error from `current` to `target`, in `[-180, 180]`.
///
/// Positive means the target lies forward (increasing angle) of `current`.
/// Non-finite input propagates as NaN.
pub fn angular_error(current: f32, target: f32) -> f32 {
    let e = (target - current).rem_euclid(360.0);
    if e > 180.0 { e - 360.0 } else { e }
}

/// Mean of angle samples that may straddle the 0/360 seam.
///
/// Samples are unwrapped around the first one before averaging. `None` for an
/// empty slice.
pub fn mean_angle(samples: &[f32]) -> Option<f32> {
    let (&first, rest) = samples.split_first()?;
    let sum: f32 = rest.iter().map(|s| angular_error(first, *s)).sum();
    Some(normalize_angle(first + sum / samples.len() as f32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_slot_angles() {
        let got: Vec<f32> = (1..=5).map(|s| position_to_angle(s, 5)).collect();
        assert_eq!(got, vec![0.0, 72.0, 144.0, 216.0, 288.0]);
    }

    #[test]
    fn out_of_range_slot_is_zero_degrees() {
        assert_eq!(position_to_angle(0, 5), 0.0);
        assert_eq!(position_to_angle(6, 5), 0.0);
        assert_eq!(position_to_angle(1, 0), 0.0);
    }

    #[test]
    fn last_half_sector_wraps_to_slot_one() {
        assert_eq!(angle_to_position(330.0, 5), 1);
        assert_eq!(angle_to_position(300.0, 5), 5);
        assert_eq!(angle_to_position(359.9, 3), 1);
    }

    #[test]
    fn invalid_angles_map_to_slot_one() {
        assert_eq!(angle_to_position(-1.0, 5), 1);
        assert_eq!(angle_to_position(360.0, 5), 1);
        assert_eq!(angle_to_position(f32::NAN, 5), 1);
    }

    #[test]
    fn error_takes_the_short_way_round() {
        assert!((angular_error(350.0, 10.0) - 20.0).abs() < 1e-4);
        assert!((angular_error(10.0, 350.0) + 20.0).abs() < 1e-4);
        assert!((angular_error(0.0, 144.0) - 144.0).abs() < 1e-4);
        assert!((angular_error(0.0, 216.0) + 144.0).abs() < 1e-4);
    }

    #[test]
    fn mean_handles_the_seam() {
        let m = mean_angle(&[359.0, 1.0, 0.0]).unwrap();
        assert!(m < 0.01 || m > 359.99, "mean {m}");
        let m = mean_angle(&[10.0, 12.0]).unwrap();
        assert!((m - 11.0).abs() < 1e-4);
        assert!(mean_angle(&[]).is_none());
    }
}
