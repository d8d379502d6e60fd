use rstest::rstest;
use wheel_core::error::BuildError;
use wheel_core::mocks::{MemoryStore, StoredValues};
use wheel_core::{FilterWheel, MotorParams, ServoCfg};
use wheel_hardware::{SimParams, SimulatedWheel};
use wheel_traits::Motor;

fn sim() -> SimulatedWheel {
    SimulatedWheel::new(SimParams::default())
}

#[rstest]
fn builder_missing_motor_yields_typed_build_error() {
    let err = FilterWheel::builder()
        // missing with_motor()
        .with_store(MemoryStore::new())
        .try_build()
        .expect_err("should fail with MissingMotor");

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::MissingMotor) => {}
        other => panic!("expected MissingMotor, got: {other:?}"),
    }
}

#[rstest]
fn builder_missing_store_yields_typed_build_error() {
    let err = FilterWheel::builder()
        .with_motor(sim().motor())
        .try_build()
        .expect_err("should fail with MissingStore");

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::MissingStore) => {}
        other => panic!("expected MissingStore, got: {other:?}"),
    }
}

#[rstest]
#[case::tolerance_not_below_one_degree(ServoCfg { control_tolerance_deg: 1.0, ..ServoCfg::default() })]
#[case::zero_iterations(ServoCfg { max_iterations: 0, ..ServoCfg::default() })]
#[case::floor_above_ceiling(ServoCfg { output_min: 400, ..ServoCfg::default() })]
#[case::negative_gain(ServoCfg { kp: -0.1, ..ServoCfg::default() })]
#[case::damping_over_one(ServoCfg { damping_factor: 1.5, ..ServoCfg::default() })]
fn invalid_servo_config_is_rejected(#[case] servo: ServoCfg) {
    let err = FilterWheel::builder()
        .with_motor(sim().motor())
        .with_store(MemoryStore::new())
        .with_servo(servo)
        .build()
        .expect_err("should reject servo config");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ));
}

#[rstest]
fn zero_chunk_size_is_rejected() {
    let mut safety = wheel_core::SafetyCfg::default();
    safety.chunk_steps = 0;
    let err = FilterWheel::builder()
        .with_motor(sim().motor())
        .with_store(MemoryStore::new())
        .with_safety(safety)
        .build()
        .expect_err("chunk_steps = 0");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ));
}

#[rstest]
fn startup_restores_persisted_state() {
    let sim = sim();
    let store = MemoryStore::with_values(StoredValues {
        filter_count: Some(7),
        current_slot: Some(4),
        angle_offset: Some(12.5),
        steps_per_revolution: Some(2100),
        backlash_steps: Some(6),
        calibrated: true,
        ..StoredValues::default()
    });
    let w = FilterWheel::builder()
        .with_motor(sim.motor())
        .with_encoder(sim.encoder())
        .with_store(store)
        .with_motor_params(MotorParams {
            speed: 250.0,
            max_speed: 400.0,
            acceleration: 100.0,
            reverse_direction: true,
        })
        .build()
        .expect("build");

    let snap = w.snapshot();
    assert_eq!(snap.filter_count, 7);
    assert_eq!(snap.current_slot, 4);
    assert_eq!(snap.angle_offset, 12.5);
    assert_eq!(snap.steps_per_revolution, 2100);
    assert_eq!(snap.backlash_steps, 6);
    assert!(snap.backlash_enabled);
    assert!(snap.calibrated);
    assert_eq!(snap.session, None);

    assert_eq!(sim.speed_settings(), (250.0, 400.0, 100.0));
    assert!(w.motor().is_direction_reversed());
    assert!(!sim.is_enabled());
}

#[rstest]
#[case::count_too_large(Some(12), Some(2), 5, 2)]
#[case::slot_beyond_count(Some(4), Some(6), 4, 1)]
#[case::slot_zero(None, Some(0), 5, 1)]
#[case::nothing_stored(None, None, 5, 1)]
fn startup_repairs_out_of_range_values(
    #[case] count: Option<u8>,
    #[case] slot: Option<u8>,
    #[case] want_count: u8,
    #[case] want_slot: u8,
) {
    let store = MemoryStore::with_values(StoredValues {
        filter_count: count,
        current_slot: slot,
        steps_per_revolution: Some(50),
        ..StoredValues::default()
    });
    let w = FilterWheel::builder()
        .with_motor(sim().motor())
        .with_store(store)
        .build()
        .expect("build");
    assert_eq!(w.filter_count(), want_count);
    assert_eq!(w.current_slot(), want_slot);
    assert_eq!(w.steps_per_revolution(), 2048);
    assert!(!w.is_calibrated());
}
