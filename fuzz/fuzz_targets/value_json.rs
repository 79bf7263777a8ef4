#![no_main]

use libfuzzer_sys::fuzz_target;
use vab_core::Value;

const MAX_TEXT_BYTES: usize = 4096;

fuzz_target!(|data: &[u8]| {
    let capped = &data[..data.len().min(MAX_TEXT_BYTES)];
    let Ok(text) = std::str::from_utf8(capped) else {
        return;
    };

    if let Ok(value) = Value::from_json_text(text) {
        let rendered = value.to_json_text().expect("parsed values render");
        let reparsed = Value::from_json_text(&rendered).expect("rendered text reparses");
        assert_eq!(value, reparsed);
    }
});
