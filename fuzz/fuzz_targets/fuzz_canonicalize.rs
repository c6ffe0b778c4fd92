#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Canonical output must be a fixed point.
        if let Ok(once) = comprobantes::xml::canonicalize(s) {
            let twice = comprobantes::xml::canonicalize(&once).expect("canonical form reparses");
            assert_eq!(once, twice);
        }
    }
});
