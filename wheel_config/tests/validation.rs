use rstest::rstest;
use wheel_config::{Config, DirectionMode, MotorDriver, load_toml};

#[test]
fn empty_document_is_a_valid_default_config() {
    let cfg = load_toml("").expect("parse TOML");
    cfg.validate().expect("defaults must validate");
    assert_eq!(cfg.wheel.filter_count, 5);
    assert_eq!(cfg.wheel.direction_mode, DirectionMode::Unidirectional);
    assert_eq!(cfg.motor.driver, MotorDriver::Sim);
    assert_eq!(cfg.motor.steps_per_revolution, 2048);
    assert_eq!(cfg.servo.max_iterations, 30);
    assert_eq!(cfg.safety.move_timeout_ms, 30_000);
}

#[test]
fn accepts_full_document() {
    let toml = r#"
[wheel]
filter_count = 7
direction_mode = "bidirectional"

[motor]
driver = "uln2003"
steps_per_revolution = 4096
speed = 400.0
max_speed = 800.0
acceleration = 300.0
reverse_direction = true

[servo]
kp = 3.0
ki = 0.0
kd = 0.5
control_tolerance_deg = 0.5

[safety]
move_timeout_ms = 20000
chunk_steps = 32

[calibration]
backlash_steps = 10

[pins]
in1 = 5
in2 = 6
in3 = 13
in4 = 19

[store]
path = "/var/lib/wheel/state.toml"

[logging]
level = "debug"
rotation = "daily"
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.wheel.direction_mode, DirectionMode::Bidirectional);
    assert_eq!(cfg.motor.driver, MotorDriver::Uln2003);
    assert!(cfg.motor.reverse_direction);
    assert_eq!(cfg.pins.in4, 19);
    assert_eq!(cfg.calibration.backlash_steps, 10);
}

#[test]
fn unknown_direction_mode_fails_to_parse() {
    let err = load_toml("[wheel]\ndirection_mode = \"sideways\"\n").expect_err("bad enum");
    assert!(format!("{err}").contains("sideways") || format!("{err}").contains("variant"));
}

fn mutate(f: impl FnOnce(&mut Config)) -> String {
    let mut cfg = Config::default();
    f(&mut cfg);
    let err = cfg.validate().expect_err("should be rejected");
    format!("{err}").to_lowercase()
}

#[rstest]
#[case::too_few_slots(|c: &mut Config| c.wheel.filter_count = 2, "wheel.filter_count")]
#[case::too_many_slots(|c: &mut Config| c.wheel.filter_count = 10, "wheel.filter_count")]
#[case::zero_speed(|c: &mut Config| c.motor.speed = 0.0, "motor.speed")]
#[case::max_below_speed(|c: &mut Config| c.motor.max_speed = 10.0, "motor.max_speed")]
#[case::implausible_revolution(|c: &mut Config| c.motor.steps_per_revolution = 50, "motor.steps_per_revolution")]
#[case::tolerance_not_sub_degree(|c: &mut Config| c.servo.control_tolerance_deg = 1.0, "control_tolerance_deg")]
#[case::no_iterations(|c: &mut Config| c.servo.max_iterations = 0, "max_iterations")]
#[case::floor_above_ceiling(|c: &mut Config| c.servo.output_min = 500, "output_min")]
#[case::damping_out_of_range(|c: &mut Config| c.servo.damping_factor = 1.5, "damping_factor")]
#[case::zero_chunk(|c: &mut Config| c.safety.chunk_steps = 0, "chunk_steps")]
#[case::zero_debounce(|c: &mut Config| c.safety.estop_debounce_n = 0, "estop_debounce_n")]
#[case::no_home_samples(|c: &mut Config| c.calibration.home_samples = 0, "home_samples")]
#[case::empty_store_path(|c: &mut Config| c.store.path = "  ".into(), "store.path")]
fn rejects_invalid_values(#[case] f: fn(&mut Config), #[case] needle: &str) {
    let msg = mutate(f);
    assert!(msg.contains(needle), "message {msg:?} should mention {needle}");
}

#[test]
fn shipped_sample_config_validates() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../etc/wheel_config.toml");
    let text = std::fs::read_to_string(&path).expect("read sample config");
    let cfg = load_toml(&text).expect("parse sample config");
    cfg.validate().expect("sample config must validate");
    assert_eq!(cfg.wheel.slot_table.as_deref(), Some("slots.csv"));

    let rows = wheel_config::load_slot_table_csv(&path.with_file_name("slots.csv"))
        .expect("sample slot table");
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[1].name, "Red");
}
