//! Fuzz target for table store document parsing.
//!
//! Arbitrary bytes must never panic the JSON document loader.

#![no_main]

use bf_core::store::TableFile;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = TableFile::from_json_slice(data);
});
