#![no_main]

use libfuzzer_sys::fuzz_target;
use spindle_core::display_name;

fuzz_target!(|data: &[u8]| {
    // Convert bytes to UTF-8 string (ignore invalid UTF-8)
    if let Ok(s) = std::str::from_utf8(data) {
        let name = display_name(s);
        // The transform never grows the text. Underscores only survive when an escape produced them.
        assert!(name.len() <= s.len());
        assert!(name.chars().count() <= s.chars().count());
        if !s.contains('\\') {
            assert!(!name.contains('_'));
        }
    }
});
