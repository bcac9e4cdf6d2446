#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not. A config that
    // validates must also build a controller without panicking.
    let Ok(cfg) = toml::from_str::<erumby_config::Config>(data) else {
        return;
    };
    if cfg.validate().is_ok() {
        let _ = erumby_core::Controller::from_config(&cfg, None);
        let _ = erumby_core::ActuatorMaps::try_from(&cfg);
    }
});
