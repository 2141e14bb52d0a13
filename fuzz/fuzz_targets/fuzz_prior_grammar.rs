//! Fuzz target for the one-line prior grammar.
//!
//! Parsing arbitrary input must never panic, only return an error.

#![no_main]

use bf_core::{Parameters, Prior};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let parameters = Parameters::with_seed(0);
        if let Ok(prior) = Prior::parse(&parameters, s) {
            // a parsed prior must render and re-parse
            if let Ok(rendered) = prior.as_string() {
                let _ = Prior::parse(&Parameters::with_seed(0), &rendered);
            }
        }
    }
});
