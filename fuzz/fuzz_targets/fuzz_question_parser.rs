#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;
use minigames::config::parse_questions;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(questions) = parse_questions(text, Path::new("fuzz.txt")) {
            for question in &questions {
                assert!(!question.prompt.is_empty());
                assert!(!question.answer.is_empty());
                let _ = question.revealed_answer();
            }
        }
    }
});
