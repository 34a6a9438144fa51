//! Raw input records as produced by console readers.
//!
//! Two families exist: byte-stream consoles produce one `char` per record,
//! record-oriented consoles produce a [`KeyRecord`] per key transition. Both
//! travel through the ANSI parser as symbol metadata so a released symbol can
//! be mapped back to the record it came from.

use crate::input::keyboard::{KeyCode, KeyEvent};

/// A raw record read from the console.
pub trait InputRecord: Clone + Send + 'static {
    /// The character this record contributes to the escape-sequence stream.
    fn symbol(&self) -> char;

    /// The structured key transition, for record-oriented consoles.
    fn key_record(&self) -> Option<KeyRecord> {
        None
    }
}

impl InputRecord for char {
    fn symbol(&self) -> char {
        *self
    }
}

/// A structured key transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KeyRecord {
    /// The key.
    pub key: KeyEvent,
    /// `true` for a press, `false` for a release.
    pub key_down: bool,
}

impl KeyRecord {
    /// A key press.
    #[must_use]
    pub fn down(key: impl Into<KeyEvent>) -> Self {
        Self {
            key: key.into(),
            key_down: true,
        }
    }

    /// A key release.
    #[must_use]
    pub fn up(key: impl Into<KeyEvent>) -> Self {
        Self {
            key: key.into(),
            key_down: false,
        }
    }

    /// Check if the key is one a byte-stream terminal would send as a
    /// single plain character (and so may be part of an escape sequence).
    #[must_use]
    pub fn is_plain_char(&self) -> bool {
        self.key.modifiers.is_empty() && self.key.code.as_input_char().is_some()
    }
}

impl InputRecord for KeyRecord {
    fn symbol(&self) -> char {
        self.key.code.as_input_char().unwrap_or('\0')
    }

    fn key_record(&self) -> Option<KeyRecord> {
        Some(*self)
    }
}

impl From<KeyCode> for KeyRecord {
    fn from(code: KeyCode) -> Self {
        Self::down(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::keyboard::KeyModifiers;

    #[test]
    fn test_char_record() {
        assert_eq!('x'.symbol(), 'x');
        assert_eq!('x'.key_record(), None);
    }

    #[test]
    fn test_key_record_symbols() {
        assert_eq!(KeyRecord::down(KeyCode::Esc).symbol(), '\x1b');
        assert_eq!(KeyRecord::down('[').symbol(), '[');
        assert_eq!(KeyRecord::down(KeyCode::Up).symbol(), '\0');
        assert!(KeyRecord::down('a').is_plain_char());
        assert!(!KeyRecord::down(KeyEvent::with_ctrl(KeyCode::Char('a'))).is_plain_char());
        assert!(!KeyRecord::down(KeyCode::F(2)).is_plain_char());
    }

    #[test]
    fn test_key_record_round_trips_through_trait() {
        let record = KeyRecord::up(KeyEvent::new(KeyCode::Left, KeyModifiers::SHIFT));
        assert_eq!(record.key_record(), Some(record));
        assert!(!record.key_down);
    }
}
