#![no_main]

use libfuzzer_sys::fuzz_target;
use toast_sources::{parse_toast_payload, TextExtraction};

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let parsed = parse_toast_payload(&raw);
    assert!(!parsed.title.is_empty());
    if parsed.extraction == TextExtraction::Nothing {
        assert!(parsed.body.is_empty());
    }

    if let Some((title, _body)) = parsed.into_relayable() {
        assert!(!title.is_empty());
    }
});
