//! Key decoding for pass-through input.
//!
//! Turns the characters the ANSI parser lets through into key events.
//! Supports:
//! - Printable characters and UTF-8
//! - Control characters (Ctrl+letter, Enter, Tab, Backspace)
//! - `ESC <key>` as Alt+key
//! - SS3 keys (`ESC O P`..`S`, arrows)
//! - CSI cursor keys with modifiers (`ESC [ 1 ; 5 A`)
//! - Tilde keys (`ESC [ 3 ~`, `ESC [ 15 ; 2 ~`)

// Decoding has many match arms for different terminal sequences
#![allow(clippy::match_same_arms)]

use tracing::trace;

use crate::input::keyboard::{KeyCode, KeyEvent, KeyModifiers};

const ESC: char = '\x1b';

/// Why a decode attempt produced no key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// Input is empty.
    Empty,
    /// Incomplete escape sequence (need more characters).
    Incomplete,
    /// Unrecognized escape sequence, to be skipped.
    UnrecognizedSequence(String),
}

/// Result of decoding input: the key and the number of characters consumed.
pub type ParseResult = Result<(KeyEvent, usize), ParseError>;

/// Streaming key decoder.
///
/// Characters are pushed one at a time; incomplete escape sequences are kept
/// until more input arrives or [`flush`](Self::flush) gives up on them.
#[derive(Clone, Debug, Default)]
pub struct KeyDecoder {
    pending: Vec<char>,
}

impl KeyDecoder {
    /// Create a decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if an incomplete sequence is waiting for more input.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Push one character, returning the keys it completes.
    pub fn push(&mut self, ch: char) -> Vec<KeyEvent> {
        self.pending.push(ch);
        let mut keys = Vec::new();
        while !self.pending.is_empty() {
            match parse(&self.pending) {
                Ok((key, consumed)) => {
                    keys.push(key);
                    self.pending.drain(..consumed);
                }
                Err(ParseError::UnrecognizedSequence(seq)) => {
                    trace!(sequence = ?seq, "dropping unrecognized sequence");
                    self.pending.drain(..seq.chars().count());
                }
                Err(ParseError::Incomplete | ParseError::Empty) => break,
            }
        }
        keys
    }

    /// Push several characters.
    pub fn push_str(&mut self, input: &str) -> Vec<KeyEvent> {
        input.chars().flat_map(|ch| self.push(ch)).collect()
    }

    /// Give up waiting and decode whatever is pending.
    ///
    /// A lone `ESC` becomes the Escape key and `ESC x` becomes Alt+x. A
    /// truncated CSI or SS3 sequence is dropped.
    pub fn flush(&mut self) -> Vec<KeyEvent> {
        let mut keys = Vec::new();
        while !self.pending.is_empty() {
            match parse(&self.pending) {
                Ok((key, consumed)) => {
                    keys.push(key);
                    self.pending.drain(..consumed);
                }
                Err(ParseError::UnrecognizedSequence(seq)) => {
                    trace!(sequence = ?seq, "dropping unrecognized sequence");
                    self.pending.drain(..seq.chars().count());
                }
                Err(ParseError::Incomplete) => match self.pending.as_slice() {
                    [ESC] => {
                        keys.push(KeyEvent::key(KeyCode::Esc));
                        self.pending.clear();
                    }
                    [ESC, ch] => {
                        keys.push(KeyEvent::with_alt(KeyCode::Char(*ch)));
                        self.pending.clear();
                    }
                    partial => {
                        let sequence: String = partial.iter().collect();
                        trace!(sequence, "dropping truncated sequence");
                        self.pending.clear();
                    }
                },
                Err(ParseError::Empty) => break,
            }
        }
        keys
    }

    /// Discard pending input.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Decode one key from the front of `input`.
pub fn parse(input: &[char]) -> ParseResult {
    let Some(&first) = input.first() else {
        return Err(ParseError::Empty);
    };

    let key = match first {
        ESC => return parse_escape(input),
        '\0' => KeyEvent::key(KeyCode::Null),
        '\r' | '\n' => KeyEvent::key(KeyCode::Enter),
        '\t' => KeyEvent::key(KeyCode::Tab),
        '\x08' | '\x7f' => KeyEvent::key(KeyCode::Backspace),
        '\x01'..='\x1a' => {
            // Ctrl+A through Ctrl+Z
            let c = char::from(first as u8 - 1 + b'a');
            KeyEvent::with_ctrl(KeyCode::Char(c))
        }
        '\x1c'..='\x1f' => {
            let c = char::from(first as u8 - 0x1c + b'\\');
            KeyEvent::with_ctrl(KeyCode::Char(c))
        }
        c => KeyEvent::char(c),
    };
    Ok((key, 1))
}

/// Parse an escape sequence.
fn parse_escape(input: &[char]) -> ParseResult {
    let Some(&second) = input.get(1) else {
        // Could be just Escape or start of sequence
        return Err(ParseError::Incomplete);
    };

    match second {
        '[' => parse_csi(input),
        'O' => parse_ss3(input),
        // Double escape: the first one is a key on its own
        ESC => Ok((KeyEvent::key(KeyCode::Esc), 1)),
        _ => {
            let (key, consumed) = parse(&input[1..])?;
            Ok((key.plus(KeyModifiers::ALT), consumed + 1))
        }
    }
}

/// Parse a CSI sequence (ESC [ ...).
fn parse_csi(input: &[char]) -> ParseResult {
    // Find the final character (0x40-0x7e)
    let Some(end) = input
        .iter()
        .skip(2)
        .position(|c| ('\x40'..='\x7e').contains(c))
        .map(|p| p + 2)
    else {
        return Err(ParseError::Incomplete);
    };

    let params: String = input[2..end].iter().collect();
    let consumed = end + 1;
    let unrecognized = || ParseError::UnrecognizedSequence(input[..consumed].iter().collect());

    let code = match input[end] {
        'A' => KeyCode::Up,
        'B' => KeyCode::Down,
        'C' => KeyCode::Right,
        'D' => KeyCode::Left,
        'H' => KeyCode::Home,
        'F' => KeyCode::End,
        'E' => KeyCode::KeypadBegin,
        'P' => KeyCode::F(1),
        'Q' => KeyCode::F(2),
        'R' => KeyCode::F(3),
        'S' => KeyCode::F(4),
        'Z' if params.is_empty() => KeyCode::BackTab,
        '~' => return parse_tilde_key(&params, consumed).ok_or_else(unrecognized),
        _ => return Err(unrecognized()),
    };

    let modifiers = parse_modifiers(&params).ok_or_else(unrecognized)?;
    // F1-F4 only come as CSI when modified (`ESC [ 1 ; 5 P`).
    if code.is_function_key() && modifiers.is_empty() {
        return Err(unrecognized());
    }
    Ok((KeyEvent::new(code, modifiers), consumed))
}

/// Parse modifiers from CSI parameters.
///
/// Format: `1;N` where N = 1 + (shift ? 1 : 0) + (alt ? 2 : 0) + (ctrl ? 4 : 0).
/// Returns `None` if the parameters are not of that form.
fn parse_modifiers(params: &str) -> Option<KeyModifiers> {
    if params.is_empty() {
        return Some(KeyModifiers::empty());
    }
    let mut parts = params.split(';');
    let first = parts.next()?;
    if !first.is_empty() && first != "1" {
        return None;
    }
    let modifiers = match parts.next() {
        Some(n) => KeyModifiers::from_csi_param(n.parse().ok()?),
        None => KeyModifiers::empty(),
    };
    if parts.next().is_some() {
        return None;
    }
    Some(modifiers)
}

/// Parse tilde key sequences (Insert, Delete, Page Up/Down, F1-F20).
fn parse_tilde_key(params: &str, consumed: usize) -> Option<(KeyEvent, usize)> {
    let mut parts = params.split(';');
    let num: u8 = parts.next()?.parse().ok()?;
    let modifiers = match parts.next() {
        Some(n) => KeyModifiers::from_csi_param(n.parse().ok()?),
        None => KeyModifiers::empty(),
    };

    let code = match num {
        1 | 7 => KeyCode::Home,
        2 => KeyCode::Insert,
        3 => KeyCode::Delete,
        4 | 8 => KeyCode::End,
        5 => KeyCode::PageUp,
        6 => KeyCode::PageDown,
        11 => KeyCode::F(1),
        12 => KeyCode::F(2),
        13 => KeyCode::F(3),
        14 => KeyCode::F(4),
        15 => KeyCode::F(5),
        17 => KeyCode::F(6),
        18 => KeyCode::F(7),
        19 => KeyCode::F(8),
        20 => KeyCode::F(9),
        21 => KeyCode::F(10),
        23 => KeyCode::F(11),
        24 => KeyCode::F(12),
        25 => KeyCode::F(13),
        26 => KeyCode::F(14),
        28 => KeyCode::F(15),
        29 => KeyCode::F(16),
        31 => KeyCode::F(17),
        32 => KeyCode::F(18),
        33 => KeyCode::F(19),
        34 => KeyCode::F(20),
        _ => return None,
    };

    Some((KeyEvent::new(code, modifiers), consumed))
}

/// Parse SS3 sequences (ESC O ...).
fn parse_ss3(input: &[char]) -> ParseResult {
    let Some(&third) = input.get(2) else {
        return Err(ParseError::Incomplete);
    };

    let code = match third {
        'P' => KeyCode::F(1),
        'Q' => KeyCode::F(2),
        'R' => KeyCode::F(3),
        'S' => KeyCode::F(4),
        'A' => KeyCode::Up,
        'B' => KeyCode::Down,
        'C' => KeyCode::Right,
        'D' => KeyCode::Left,
        'H' => KeyCode::Home,
        'F' => KeyCode::End,
        'M' => KeyCode::Enter,
        _ => {
            return Err(ParseError::UnrecognizedSequence(
                input[..3].iter().collect(),
            ));
        }
    };

    Ok((KeyEvent::key(code), 3))
}
