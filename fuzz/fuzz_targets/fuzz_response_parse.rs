#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Every body maps to some response; panics are bugs.
        let response = comprobantes::sri::parse_response(s);
        let _ = response.messages();
    }
});
