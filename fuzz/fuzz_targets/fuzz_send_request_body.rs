//! Fuzz target: `POST /api/send-request` body parsing.
//!
//! Arbitrary bytes must either parse or be rejected, never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(body) = relay_gateway::routes::parse_send_request(data) {
        let options = relay_core::text_options(body.uppercase, body.reverse);
        assert_eq!(options.len(), 2);
    }
});
