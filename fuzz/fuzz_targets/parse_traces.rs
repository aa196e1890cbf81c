//! Fuzz target for trace-document parsing: arbitrary bytes must never
//! panic the deserializer.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = serde_json::from_slice::<tracegate_types::TraceDoc>(data);
});
