#![no_main]

use libfuzzer_sys::fuzz_target;
use std::rc::Rc;

fuzz_target!(|data: &[u8]| {
    if data.len() > 32 * 1024 {
        return;
    }
    let src = String::from_utf8_lossy(data);
    // Imports and extends resolve against an empty source so the harness never
    // touches the file system.
    let options = jade::Options {
        pretty_print: data.first().is_some_and(|byte| byte & 1 == 1),
        source: Rc::new(jade::MemorySource::new()),
        ..jade::Options::default()
    };
    let mut compiler = jade::Compiler::new(options);
    compiler.set_filename("fuzz.jade");
    if compiler.parse(&src).is_err() {
        return;
    }
    if let Ok(first) = compiler.compile_string() {
        let second = compiler.compile_string().expect("second compile");
        assert_eq!(first, second);
    }
});
