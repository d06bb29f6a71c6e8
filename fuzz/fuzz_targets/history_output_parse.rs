#![no_main]

use libfuzzer_sys::fuzz_target;
use toast_sources::parse_history_output;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    if let Ok(entries) = parse_history_output(&raw) {
        if raw.trim().is_empty() {
            assert!(entries.is_empty());
        }
    }
});
