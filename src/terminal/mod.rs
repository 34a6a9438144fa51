//! Console backend: raw mode, stdin reading and output.

mod output;
mod raw;
mod stdin;

pub use output::{ConsoleOutput, MemoryOutput, Size, TerminalOutput};
pub use raw::{
    RawModeGuard, enable_raw_mode, is_tty, poll_readable, read_fd, terminal_size, terminal_size_of,
};
pub use stdin::StdinSource;
