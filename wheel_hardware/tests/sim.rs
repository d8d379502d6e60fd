use rstest::rstest;
use wheel_hardware::{HwError, SimParams, SimulatedWheel};
use wheel_traits::{Encoder, Motor};

fn wheel(play: u32) -> SimulatedWheel {
    SimulatedWheel::new(SimParams {
        gear_play_steps: play,
        ..SimParams::default()
    })
}

#[test]
fn stepping_requires_enable() {
    let w = wheel(0);
    let mut m = w.motor();
    let err = m.step_forward(10).expect_err("disabled motor must refuse");
    match err.downcast_ref::<HwError>() {
        Some(HwError::MotorDisabled) => {}
        other => panic!("unexpected error: {other:?}"),
    }
    m.enable().unwrap();
    m.step_forward(10).unwrap();
    assert_eq!(m.position(), 10);
    assert_eq!(w.output_steps(), 10);
}

#[rstest]
#[case(512, 90.0)]
#[case(1024, 180.0)]
#[case(2048 + 256, 45.0)]
fn encoder_tracks_wheel(#[case] steps: u32, #[case] expect_deg: f32) {
    let w = wheel(0);
    let mut m = w.motor();
    let mut e = w.encoder();
    m.enable().unwrap();
    m.step_forward(steps).unwrap();
    let a = e.angle().unwrap();
    assert!((a - expect_deg).abs() < 0.1, "angle {a} vs {expect_deg}");
}

#[test]
fn offset_is_subtracted_and_normalized() {
    let w = wheel(0);
    let mut e = w.encoder();
    e.set_angle_offset(-30.0);
    assert!((e.angle_offset() - 330.0).abs() < 1e-3);
    // wheel at 0 reads 0 - 330 -> 30
    let a = e.angle().unwrap();
    assert!((a - 30.0).abs() < 0.1, "angle {a}");
    assert_eq!(e.raw_value().unwrap(), 0);
}

#[test]
fn gear_play_is_lost_on_reversal() {
    let w = wheel(10);
    let mut m = w.motor();
    m.enable().unwrap();
    m.step_forward(100).unwrap();
    assert_eq!(w.output_steps(), 100);
    m.step_backward(5).unwrap();
    assert_eq!(w.output_steps(), 100, "play absorbs the first reversal");
    m.step_backward(10).unwrap();
    assert_eq!(w.output_steps(), 95);
    m.step_forward(8).unwrap();
    assert_eq!(w.output_steps(), 95, "play absorbs the reversal");
    m.step_forward(5).unwrap();
    assert_eq!(w.output_steps(), 98);
}

#[test]
fn reversed_direction_turns_the_other_way() {
    let w = wheel(0);
    let mut m = w.motor();
    m.set_direction_reversed(true);
    m.enable().unwrap();
    m.step_forward(512).unwrap();
    assert_eq!(m.position(), 512);
    assert!((w.wheel_degrees() - 270.0).abs() < 0.1);
}

#[test]
fn move_to_uses_logical_counter() {
    let w = wheel(0);
    let mut m = w.motor();
    m.enable().unwrap();
    m.set_position(100);
    m.move_to(40).unwrap();
    assert_eq!(m.position(), 40);
    assert_eq!(w.step_log(), vec![-60]);
}

#[test]
fn emergency_stop_de_energizes() {
    let w = wheel(0);
    let mut m = w.motor();
    m.enable().unwrap();
    m.emergency_stop().unwrap();
    assert!(!m.is_enabled());
    assert_eq!(w.estop_count(), 1);
}

#[test]
fn driver_extras_record_settings_and_stalls() {
    let w = wheel(0);
    let mut m = w.motor();
    let extras = m.extras().expect("sim exposes extras");
    extras.set_microsteps(16).unwrap();
    extras.set_current_ma(350).unwrap();
    assert!(extras.set_microsteps(3).is_err());
    assert_eq!(w.driver_settings(), (16, 350));

    w.set_jammed(true);
    m.enable().unwrap();
    m.step_forward(10).unwrap();
    let extras = m.extras().expect("extras");
    assert!(extras.stall_detected().unwrap());
    assert!(!extras.stall_detected().unwrap());
}

#[test]
fn failing_reads_turn_encoder_unhealthy() {
    let w = wheel(0);
    let mut e = w.encoder();
    assert!(e.is_healthy());
    w.set_encoder_fault(true);
    assert!(e.angle().is_err());
    assert!(!e.is_healthy());
}

#[test]
fn absent_encoder_is_unavailable() {
    let w = SimulatedWheel::new(SimParams {
        encoder_present: false,
        ..SimParams::default()
    });
    let mut e = w.encoder();
    assert!(!e.is_available());
    assert!(!e.is_healthy());
    assert!(e.angle().is_err());
}

#[test]
fn place_at_slot_uses_nominal_spacing() {
    let w = wheel(0);
    w.place_at_slot(3, 5);
    assert_eq!(w.output_steps(), 819);
    let mut e = w.encoder();
    let a = e.angle().unwrap();
    assert!((a - 144.0).abs() < 0.2, "angle {a}");
}
