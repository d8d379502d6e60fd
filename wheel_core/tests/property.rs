use proptest::prelude::*;
use wheel_core::angle::{angle_to_position, angular_error, position_to_angle};
use wheel_core::backlash::{Direction, compensate};

fn direction() -> impl Strategy<Value = Option<Direction>> {
    prop_oneof![
        Just(None),
        Just(Some(Direction::Forward)),
        Just(Some(Direction::Backward)),
    ]
}

proptest! {
    #[test]
    fn slot_angle_round_trip(n in 3u8..=9, slot_seed in 0u8..9) {
        let slot = slot_seed % n + 1;
        prop_assert_eq!(angle_to_position(position_to_angle(slot, n), n), slot);
    }

    #[test]
    fn angular_error_is_bounded(current in -720.0f32..720.0, target in -720.0f32..720.0) {
        let e = angular_error(current, target);
        prop_assert!((-180.0..=180.0).contains(&e), "error {e}");
    }

    #[test]
    fn angular_error_to_self_is_zero(a in 0.0f32..360.0) {
        prop_assert_eq!(angular_error(a, a), 0.0);
    }

    #[test]
    fn disabled_compensation_is_identity(
        steps in -100_000i64..100_000,
        last in direction(),
        backlash in 0u32..1000,
    ) {
        prop_assert_eq!(compensate(steps, last, backlash, false), steps);
    }

    #[test]
    fn reversal_adds_backlash_in_new_direction(
        magnitude in 1i64..100_000,
        forward in any::<bool>(),
        backlash in 1u32..1000,
    ) {
        let planned = if forward { magnitude } else { -magnitude };
        let last = if forward { Direction::Backward } else { Direction::Forward };
        let adjusted = compensate(planned, Some(last), backlash, true);
        prop_assert_eq!(adjusted.abs(), magnitude + i64::from(backlash));
        prop_assert_eq!(adjusted.signum(), planned.signum());
    }

    #[test]
    fn same_direction_is_unchanged(magnitude in 1i64..100_000, backlash in 0u32..1000) {
        prop_assert_eq!(
            compensate(magnitude, Some(Direction::Forward), backlash, true),
            magnitude
        );
        prop_assert_eq!(
            compensate(-magnitude, Some(Direction::Backward), backlash, true),
            -magnitude
        );
    }
}
