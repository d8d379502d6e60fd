use std::cell::Cell;
use std::time::Duration;

use rstest::rstest;
use wheel_hardware::error::HwError;
use wheel_hardware::util::{retry_transient, step_interval};

#[rstest]
#[case(500.0, 2_000)]
#[case(1_000.0, 1_000)]
#[case(10_000.0, 1_000)] // clamped to max speed
#[case(0.0, 10_000)] // falls back to min speed
#[case(f32::NAN, 10_000)]
fn step_interval_clamps(#[case] speed: f32, #[case] expect_us: u64) {
    let d = step_interval(speed, 100.0, 1_000.0);
    let us = d.as_micros() as i64;
    assert!((us - expect_us as i64).abs() <= 1, "got {us}us for {speed}");
}

#[test]
fn retry_recovers_from_transient_errors() {
    let calls = Cell::new(0);
    let v = retry_transient(3, Duration::ZERO, || {
        calls.set(calls.get() + 1);
        if calls.get() < 3 {
            Err(HwError::Timeout)
        } else {
            Ok(42u16)
        }
    })
    .expect("third attempt succeeds");
    assert_eq!(v, 42);
    assert_eq!(calls.get(), 3);
}

#[test]
fn retry_gives_up_after_budget() {
    let calls = Cell::new(0);
    let err = retry_transient::<u16>(2, Duration::ZERO, || {
        calls.set(calls.get() + 1);
        Err(HwError::I2c("nack".into()))
    })
    .expect_err("budget exhausted");
    assert_eq!(calls.get(), 2);
    match err {
        HwError::I2c(_) => {}
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn retry_does_not_repeat_permanent_errors() {
    let calls = Cell::new(0);
    let err = retry_transient::<u16>(5, Duration::ZERO, || {
        calls.set(calls.get() + 1);
        Err(HwError::MagnetNotDetected)
    })
    .expect_err("permanent error");
    assert_eq!(calls.get(), 1);
    assert!(matches!(err, HwError::MagnetNotDetected));
}
