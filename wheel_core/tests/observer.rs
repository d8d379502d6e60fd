use crossbeam_channel::bounded;
use wheel_core::mocks::MemoryStore;
use wheel_core::{FilterWheel, MotionCfg, SlotTable, StatusEvent, WheelStatus};
use wheel_hardware::{SimParams, SimulatedWheel};

fn drain(rx: &crossbeam_channel::Receiver<StatusEvent>) -> Vec<StatusEvent> {
    rx.try_iter().collect()
}

#[test]
fn move_emits_moving_then_ready() {
    let sim = SimulatedWheel::new(SimParams {
        encoder_present: false,
        ..SimParams::default()
    });
    let (tx, rx) = bounded(16);
    let mut slots = SlotTable::new();
    slots.set_name(2, "Oiii");
    let mut w = FilterWheel::builder()
        .with_motor(sim.motor())
        .with_store(MemoryStore::new())
        .with_motion(MotionCfg {
            disable_delay_ms: 0,
            ..MotionCfg::default()
        })
        .with_slot_table(slots)
        .with_observer(tx)
        .build()
        .expect("build");

    let startup = drain(&rx);
    assert_eq!(startup.len(), 1);
    assert_eq!(startup[0].status, WheelStatus::Ready);
    assert_eq!(startup[0].slot_name, "Luminance");

    w.move_to_slot(2).expect("move");
    let events = drain(&rx);
    let statuses: Vec<_> = events.iter().map(|e| e.status).collect();
    assert_eq!(statuses, vec![WheelStatus::Moving, WheelStatus::Ready]);
    assert!(events[0].moving);
    assert_eq!(events[0].slot, 1);
    assert!(!events[1].moving);
    assert_eq!(events[1].slot, 2);
    assert_eq!(events[1].slot_name, "Oiii");
    assert_eq!(events[1].filter_count, 5);
}

#[test]
fn full_or_dropped_observer_never_blocks_motion() {
    let sim = SimulatedWheel::new(SimParams {
        encoder_present: false,
        ..SimParams::default()
    });
    let (tx, rx) = bounded(1);
    let mut w = FilterWheel::builder()
        .with_motor(sim.motor())
        .with_store(MemoryStore::new())
        .with_motion(MotionCfg {
            disable_delay_ms: 0,
            ..MotionCfg::default()
        })
        .with_observer(tx)
        .build()
        .expect("build");

    w.move_to_slot(3).expect("move with full channel");
    drop(rx);
    w.move_to_slot(4).expect("move with dropped receiver");
    assert_eq!(w.current_slot(), 4);
}

#[test]
fn emergency_stop_is_announced() {
    let sim = SimulatedWheel::new(SimParams::default());
    let (tx, rx) = bounded(16);
    let mut w = FilterWheel::builder()
        .with_motor(sim.motor())
        .with_store(MemoryStore::new())
        .with_observer(tx)
        .build()
        .expect("build");
    drain(&rx);
    w.emergency_stop();
    let events = drain(&rx);
    assert_eq!(events.last().map(|e| e.status), Some(WheelStatus::Stopped));
}
