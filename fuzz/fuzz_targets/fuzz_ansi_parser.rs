//! Fuzz target for the ANSI parser and the input processor.
//!
//! Feeds arbitrary input through both, with expectations registered so the
//! held/expecting paths are exercised as well as pass-through.

#![no_main]

use libfuzzer_sys::fuzz_target;
use termwire::ansi::AnsiParser;
use termwire::mainloop::system_clock;
use termwire::{InputProcessor, LoopOptions};

fuzz_target!(|data: &[u8]| {
    let input = String::from_utf8_lossy(data);

    let mut parser: AnsiParser = AnsiParser::default();
    let _ = parser.expect_response("R", |_| {}, false);
    parser.expect_persistent("c", |_| {});
    let out = parser.process_str(&input);
    let released = parser.release_str();
    assert!(out.chars().count() + released.chars().count() <= input.chars().count());

    let options = LoopOptions {
        enable_mouse: true,
        ..LoopOptions::default()
    };
    let mut processor: InputProcessor<char> = InputProcessor::new(system_clock(), &options);
    let _ = processor.process(input.chars());
    let _ = processor.check_timeout();
});
