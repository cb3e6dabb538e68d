#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;
use minigames::config::{ConfigLimits, Validator, parse_config};

fuzz_target!(|data: &[u8]| {
    if let Ok(yaml) = std::str::from_utf8(data) {
        if let Ok(config) = parse_config(yaml, Path::new("fuzz.yaml")) {
            let _ = Validator::new().validate(&config, &ConfigLimits::default());
        }
    }
});
