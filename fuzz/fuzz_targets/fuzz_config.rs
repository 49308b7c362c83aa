#![no_main]
//! Fuzz target for config TOML parsing
//!
//! Feeds random bytes as TOML to the config parser to find panics,
//! hangs, or unexpected behavior in deserialization and validation.

use libfuzzer_sys::fuzz_target;

use windowing::config::Config;
use windowing::decorator::DecorationMetrics;

fuzz_target!(|data: &[u8]| {
    // Parsing and validation must never panic
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(config) = Config::from_toml_str(s) {
            // Accepted metrics must describe a usable title bar
            let metrics = DecorationMetrics::from(&config.decorations);
            let size = metrics.decoration_size();
            assert!(size.width > 0 && size.height > 0);
        }
    }
});
