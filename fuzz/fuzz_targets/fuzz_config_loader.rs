#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parsing, validation and conversion into engine settings must never
    // panic, whatever the input.
    let Ok(cfg) = wheel_config::load_toml(data) else {
        return;
    };
    if cfg.validate().is_ok() {
        let _settings = wheel_core::WheelSettings::from(&cfg);
    }
});
