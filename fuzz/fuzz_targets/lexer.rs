#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 64 * 1024 {
        return;
    }
    let src = String::from_utf8_lossy(data);
    if let Ok(tokens) = jade::lexer::tokenize(&src, "fuzz.jade") {
        assert!(tokens
            .last()
            .is_some_and(|token| token.kind == jade::lexer::TokenKind::Eof));
    }
});
