//! Moves without an encoder: open-loop step counting end to end.

use rstest::rstest;
use wheel_core::mocks::{MemoryStore, NoEncoder, StoredValues};
use wheel_core::{
    DirectionMode, MotionState, Strategy, WheelCore, WheelError, WheelHooks, WheelSettings,
    build_wheel,
};
use wheel_hardware::{SimParams, SimulatedMotor, SimulatedWheel};

type Wheel = WheelCore<SimulatedMotor, NoEncoder, MemoryStore>;

fn settings(mode: DirectionMode) -> WheelSettings {
    let mut s = WheelSettings::default();
    s.motion.direction_mode = mode;
    s.motion.disable_delay_ms = 0;
    s
}

fn wheel(mode: DirectionMode, store: MemoryStore) -> (SimulatedWheel, Wheel) {
    let sim = SimulatedWheel::new(SimParams {
        encoder_present: false,
        ..SimParams::default()
    });
    let w = build_wheel(
        sim.motor(),
        None,
        store,
        settings(mode),
        WheelHooks::default(),
    )
    .expect("build");
    (sim, w)
}

#[test]
fn slot_one_to_three_issues_819_forward_steps() {
    let store = MemoryStore::new();
    let (sim, mut w) = wheel(DirectionMode::Unidirectional, store.clone());
    assert_eq!(w.current_slot(), 1);

    let report = w.move_to_slot(3).expect("move");

    assert_eq!(sim.forward_steps(), 819);
    assert_eq!(sim.backward_steps(), 0);
    assert_eq!(report.slot, 3);
    assert_eq!(report.strategy, Strategy::Steps);
    assert_eq!(report.steps_issued, 819);
    assert_eq!(report.servo_iterations, 0);
    assert_eq!(w.current_slot(), 3);
    assert_eq!(w.motion_state(), MotionState::Idle);
    assert_eq!(store.values().current_slot, Some(3));
    assert!(!sim.is_enabled(), "motor must be de-energized after the move");
}

#[test]
fn unidirectional_wraps_forward_past_last_slot() {
    let (sim, mut w) = wheel(DirectionMode::Unidirectional, MemoryStore::new());
    w.move_to_slot(5).expect("to 5");
    sim.clear_log();
    w.move_to_slot(2).expect("to 2");
    // 5 -> 1 -> 2 is two sectors forward
    assert_eq!(sim.step_log().iter().sum::<i64>(), 819);
    assert_eq!(sim.backward_steps(), 0);
}

#[test]
fn repeat_move_to_current_slot_does_not_move() {
    let (sim, mut w) = wheel(DirectionMode::Unidirectional, MemoryStore::new());
    w.move_to_slot(2).expect("first");
    sim.clear_log();

    let a = w.move_to_slot(2).expect("second");
    let b = w.move_to_slot(2).expect("third");
    assert!(sim.step_log().is_empty());
    assert_eq!(a.steps_issued, 0);
    assert_eq!(b.steps_issued, 0);
    assert_eq!(w.current_slot(), 2);
}

#[rstest]
#[case(0)]
#[case(6)]
#[case(200)]
fn out_of_range_slot_is_rejected(#[case] slot: u8) {
    let (sim, mut w) = wheel(DirectionMode::Unidirectional, MemoryStore::new());
    let err = w.move_to_slot(slot).unwrap_err();
    match err.downcast_ref::<WheelError>() {
        Some(WheelError::InvalidPosition { slot: s, filter_count: 5 }) => assert_eq!(*s, slot),
        other => panic!("expected InvalidPosition, got {other:?}"),
    }
    assert!(sim.step_log().is_empty());
    assert_eq!(w.motion_state(), MotionState::Idle);
    assert_eq!(w.last_error().map(|c| c.as_u16()), Some(1));
}

#[test]
fn bidirectional_reversal_adds_backlash() {
    let store = MemoryStore::with_values(StoredValues {
        backlash_steps: Some(10),
        ..StoredValues::default()
    });
    let (sim, mut w) = wheel(DirectionMode::Bidirectional, store);
    assert!(w.snapshot().backlash_enabled);

    // First move has no known previous direction: no compensation.
    w.move_to_slot(2).expect("forward");
    assert_eq!(sim.step_log().iter().sum::<i64>(), 409);
    sim.clear_log();

    // 2 -> 1 reverses.
    w.move_to_slot(1).expect("backward");
    assert_eq!(sim.step_log().iter().sum::<i64>(), -(409 + 10));
    sim.clear_log();

    // Continuing backward (1 -> 5) needs no compensation.
    w.move_to_slot(5).expect("backward again");
    assert_eq!(sim.step_log().iter().sum::<i64>(), -409);
}

#[test]
fn motor_fault_fails_move_and_keeps_position() {
    let (sim, mut w) = wheel(DirectionMode::Unidirectional, MemoryStore::new());
    sim.set_motor_fault(true);

    let err = w.move_to_slot(4).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<WheelError>(),
        Some(WheelError::MovementFailed(_))
    ));
    assert_eq!(w.current_slot(), 1);
    assert!(matches!(w.motion_state(), MotionState::Error { .. }));
    assert!(!sim.is_enabled());

    // The error state does not block the next request.
    sim.set_motor_fault(false);
    w.move_to_slot(4).expect("retry");
    assert_eq!(w.current_slot(), 4);
    assert_eq!(w.motion_state(), MotionState::Idle);
}

#[test]
fn slot_persist_failure_does_not_fail_the_move() {
    let store = MemoryStore::new();
    let (_sim, mut w) = wheel(DirectionMode::Unidirectional, store.clone());
    store.set_fail_saves(true);
    let report = w.move_to_slot(2).expect("move still succeeds");
    assert_eq!(report.slot, 2);
    assert_eq!(w.current_slot(), 2);
    assert_eq!(store.values().current_slot, None);
}

#[test]
fn jog_moves_without_changing_slot() {
    let (sim, mut w) = wheel(DirectionMode::Unidirectional, MemoryStore::new());
    let pos = w.jog(-25).expect("jog");
    assert_eq!(pos, -25);
    assert_eq!(sim.backward_steps(), 25);
    assert_eq!(w.current_slot(), 1);
    assert!(!sim.is_enabled());

    let err = w.jog(0).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<WheelError>(),
        Some(WheelError::InvalidParameter(_))
    ));
    let err = w.jog(5000).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<WheelError>(),
        Some(WheelError::InvalidParameter(_))
    ));
}

#[test]
fn step_to_goes_to_absolute_position() {
    let (sim, mut w) = wheel(DirectionMode::Unidirectional, MemoryStore::new());
    assert_eq!(w.step_to(100).expect("step_to"), 100);
    assert_eq!(w.step_to(40).expect("step_to back"), 40);
    assert_eq!(sim.step_log(), vec![100, -60]);
}

#[test]
fn set_slot_overwrites_without_motion() {
    let store = MemoryStore::new();
    let (sim, mut w) = wheel(DirectionMode::Unidirectional, store.clone());
    w.set_slot(4).expect("set");
    assert_eq!(w.current_slot(), 4);
    assert_eq!(store.values().current_slot, Some(4));
    assert!(sim.step_log().is_empty());
    assert!(w.set_slot(9).is_err());
}

#[test]
fn shrinking_filter_count_resets_slot() {
    let store = MemoryStore::new();
    let (_sim, mut w) = wheel(DirectionMode::Unidirectional, store.clone());
    w.set_slot(5).expect("set");
    w.set_filter_count(4).expect("count");
    assert_eq!(w.filter_count(), 4);
    assert_eq!(w.current_slot(), 1);
    assert_eq!(store.values().filter_count, Some(4));
    assert_eq!(store.values().current_slot, Some(1));

    for bad in [2, 10] {
        let err = w.set_filter_count(bad).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WheelError>(),
            Some(WheelError::InvalidParameter(_))
        ));
    }
}

#[test]
fn move_after_filter_count_change_uses_new_sector_width() {
    let (sim, mut w) = wheel(DirectionMode::Unidirectional, MemoryStore::new());
    w.set_filter_count(8).expect("count");
    w.move_to_slot(3).expect("move");
    assert_eq!(sim.step_log().iter().sum::<i64>(), 512);
}
