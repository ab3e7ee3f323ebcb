#![no_main]

use libfuzzer_sys::fuzz_target;
use std::collections::BTreeSet;

fuzz_target!(|data: &[u8]| {
    if data.len() > 4 * 1024 {
        return;
    }
    let src = String::from_utf8_lossy(data);
    let mut temps = 0;
    if let Ok(lowered) = jade::expr::transpile(&src, &BTreeSet::new(), &mut temps) {
        assert_eq!(lowered.instructions.len(), temps);
    }
});
