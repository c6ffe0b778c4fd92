#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(key) = comprobantes::core::AccessKey::parse(s) {
            assert_eq!(key.as_str(), s);
            assert_eq!(
                key.check_digit(),
                comprobantes::core::check_digit(&s[..48]).unwrap()
            );
        }
    }
});
