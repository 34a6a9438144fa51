//! Fuzz target for key decoding.
//!
//! Generates structured inputs that look like keyboard sequences to stress
//! the CSI, SS3 and Alt paths of the decoder.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use termwire::input::KeyDecoder;
use termwire::input::keys::{self, ParseError};

/// Structured input for keyboard fuzzing.
#[derive(Arbitrary, Debug)]
struct KeyboardInput {
    seq_type: SequenceType,
    /// Characters to append (for edge cases).
    suffix: Vec<char>,
}

#[derive(Arbitrary, Debug)]
enum SequenceType {
    /// Escape followed by arbitrary characters.
    EscapeSequence { chars: Vec<char> },
    /// ESC [ <params> <final>
    CsiSequence {
        params: Vec<u8>,
        intermediate: Option<u8>,
        final_byte: u8,
    },
    /// ESC O <final>
    Ss3Sequence { final_byte: u8 },
    /// ESC [ <n> ~
    FunctionKey { n: u8 },
    /// ESC [ 1 ; <mod> <dir>
    ModifiedArrow { modifier: u8, direction: u8 },
    Raw { chars: Vec<char> },
}

impl KeyboardInput {
    fn to_chars(&self) -> Vec<char> {
        let mut chars: Vec<char> = match &self.seq_type {
            SequenceType::EscapeSequence { chars: inner } => {
                std::iter::once('\x1b').chain(inner.iter().take(100).copied()).collect()
            }
            SequenceType::CsiSequence {
                params,
                intermediate,
                final_byte,
            } => {
                let mut v = vec!['\x1b', '['];
                v.extend(params.iter().take(50).map(|b| char::from(*b)));
                if let Some(i) = intermediate {
                    v.push(char::from(*i));
                }
                v.push(char::from(*final_byte));
                v
            }
            SequenceType::Ss3Sequence { final_byte } => {
                vec!['\x1b', 'O', char::from(*final_byte)]
            }
            SequenceType::FunctionKey { n } => {
                let mut v = vec!['\x1b', '['];
                v.extend(n.to_string().chars());
                v.push('~');
                v
            }
            SequenceType::ModifiedArrow {
                modifier,
                direction,
            } => vec![
                '\x1b',
                '[',
                '1',
                ';',
                char::from(b'0' + modifier % 10),
                char::from(*direction),
            ],
            SequenceType::Raw { chars } => chars.iter().take(100).copied().collect(),
        };
        chars.extend(self.suffix.iter().take(50));
        chars
    }
}

fuzz_target!(|input: KeyboardInput| {
    let chars = input.to_chars();
    if chars.is_empty() {
        return;
    }

    let mut remaining = chars.as_slice();
    let mut iterations = 0;
    const MAX_ITERATIONS: usize = 1000;

    while !remaining.is_empty() && iterations < MAX_ITERATIONS {
        iterations += 1;
        match keys::parse(remaining) {
            Ok((_key, consumed)) => {
                assert!(consumed <= remaining.len());
                remaining = &remaining[consumed.max(1)..];
            }
            Err(ParseError::Empty | ParseError::Incomplete) => break,
            Err(ParseError::UnrecognizedSequence(_)) => remaining = &remaining[1..],
        }
    }

    let mut decoder = KeyDecoder::new();
    for &ch in &chars {
        let _ = decoder.push(ch);
    }
    let _ = decoder.flush();
    assert!(!decoder.has_pending());
});
