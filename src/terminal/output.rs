//! Console output primitives.
//!
//! The core only needs two things from the output side: write raw bytes and
//! query the window size. Drawing lives elsewhere.

use std::io::{self, Stdout, Write};

use crate::terminal::raw::terminal_size;

/// Window size in character cells.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Size {
    /// Columns.
    pub width: u16,
    /// Rows.
    pub height: u16,
}

impl Size {
    /// Create a size.
    #[must_use]
    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }
}

/// Outbound console primitives.
pub trait ConsoleOutput {
    /// Write raw bytes (escape sequences included) and flush.
    fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Current window size.
    fn window_size(&mut self) -> io::Result<Size>;
}

/// Output to a real terminal.
#[derive(Debug)]
pub struct TerminalOutput<W: Write = Stdout> {
    writer: W,
}

impl TerminalOutput<Stdout> {
    /// Write to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self {
            writer: io::stdout(),
        }
    }
}

impl<W: Write> TerminalOutput<W> {
    /// Write to `writer`, reading the size from the controlling terminal.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> ConsoleOutput for TerminalOutput<W> {
    fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes)?;
        self.writer.flush()
    }

    fn window_size(&mut self) -> io::Result<Size> {
        terminal_size()
    }
}

/// In-memory output that records everything written.
#[derive(Clone, Debug, Default)]
pub struct MemoryOutput {
    written: Vec<u8>,
    writes: usize,
    size: Size,
    fail_writes: bool,
}

impl MemoryOutput {
    /// Create a recorder reporting `size`.
    #[must_use]
    pub fn new(size: Size) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    /// Everything written so far, lossily decoded.
    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.written).into_owned()
    }

    /// Number of `write_raw` calls.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes
    }

    /// Forget recorded output.
    pub fn clear(&mut self) {
        self.written.clear();
        self.writes = 0;
    }

    /// Change the reported window size.
    pub fn set_size(&mut self, size: Size) {
        self.size = size;
    }

    /// Make subsequent writes fail with `BrokenPipe`.
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }
}

impl ConsoleOutput for MemoryOutput {
    fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "output closed"));
        }
        self.written.extend_from_slice(bytes);
        self.writes += 1;
        Ok(())
    }

    fn window_size(&mut self) -> io::Result<Size> {
        Ok(self.size)
    }
}
