//! Held content of a possible escape sequence.

use std::fmt;

/// One input unit: a character plus the metadata of the record it came from.
///
/// Byte-stream consoles use `()` as metadata. Record-oriented consoles carry
/// the original record so it can be mapped back to a key once the parser
/// decides the symbol is plain input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Symbol<M = ()> {
    /// The character.
    pub ch: char,
    /// Opaque per-symbol metadata.
    pub meta: M,
}

impl<M> Symbol<M> {
    /// Create a symbol with metadata.
    #[must_use]
    pub const fn new(ch: char, meta: M) -> Self {
        Self { ch, meta }
    }
}

impl Symbol<()> {
    /// Create a symbol without metadata.
    #[must_use]
    pub const fn plain(ch: char) -> Self {
        Self { ch, meta: () }
    }
}

impl From<char> for Symbol<()> {
    fn from(ch: char) -> Self {
        Self::plain(ch)
    }
}

/// Append-only accumulator of symbols that may form an escape sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeldBuffer<M = ()> {
    symbols: Vec<Symbol<M>>,
    /// Text mirror of `symbols`, kept so matching never re-collects.
    text: String,
}

impl<M> Default for HeldBuffer<M> {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            text: String::new(),
        }
    }
}

impl<M> HeldBuffer<M> {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a symbol.
    pub fn push(&mut self, symbol: Symbol<M>) {
        self.text.push(symbol.ch);
        self.symbols.push(symbol);
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.symbols.clear();
        self.text.clear();
    }

    /// Take the held symbols, leaving the buffer empty.
    pub fn take(&mut self) -> Vec<Symbol<M>> {
        self.text.clear();
        std::mem::take(&mut self.symbols)
    }

    /// Held characters as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Held symbols in arrival order.
    #[must_use]
    pub fn symbols(&self) -> &[Symbol<M>] {
        &self.symbols
    }

    /// Iterate over held symbols.
    pub fn iter(&self) -> std::slice::Iter<'_, Symbol<M>> {
        self.symbols.iter()
    }

    /// Number of held symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Check if nothing is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl<'a, M> IntoIterator for &'a HeldBuffer<M> {
    type Item = &'a Symbol<M>;
    type IntoIter = std::slice::Iter<'a, Symbol<M>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<M> fmt::Display for HeldBuffer<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
