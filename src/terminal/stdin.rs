//! Unix stdin as an [`InputSource`].

use std::io::{self, Write};
use std::os::unix::io::RawFd;
use std::time::Duration;

use tracing::{debug, trace};

use crate::ansi::sequences;
use crate::mainloop::{CancellationToken, InputSource};
use crate::terminal::raw::{RawModeGuard, poll_readable, read_fd};

const READ_CHUNK: usize = 4096;

/// Reads characters from a terminal in raw mode.
///
/// [`open`](InputSource::open) puts the console into raw mode. Dropping the
/// source (which the reader thread does on every exit path) restores the
/// original mode and switches mouse reporting off.
#[derive(Debug)]
pub struct StdinSource {
    fd: RawFd,
    raw_mode: bool,
    guard: Option<RawModeGuard>,
    poll_interval: Duration,
    // Bytes of a UTF-8 sequence split across reads.
    carry: Vec<u8>,
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

impl StdinSource {
    /// Read from stdin.
    #[must_use]
    pub fn new() -> Self {
        Self::from_fd(libc::STDIN_FILENO)
    }

    /// Read from an arbitrary descriptor.
    #[must_use]
    pub fn from_fd(fd: RawFd) -> Self {
        Self {
            fd,
            raw_mode: true,
            guard: None,
            poll_interval: Duration::from_millis(50),
            carry: Vec::new(),
        }
    }

    /// Leave the console mode alone (for pipes and tests).
    #[must_use]
    pub fn without_raw_mode(mut self) -> Self {
        self.raw_mode = false;
        self
    }

    /// How long one read waits before checking for cancellation.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

impl InputSource for StdinSource {
    type Record = char;

    fn open(&mut self) -> io::Result<()> {
        if self.raw_mode {
            self.guard = Some(RawModeGuard::new(&Fd(self.fd))?);
        }
        Ok(())
    }

    fn read(&mut self, cancel: &CancellationToken) -> io::Result<Vec<char>> {
        if cancel.is_cancelled() || !poll_readable(self.fd, self.poll_interval)? {
            return Ok(Vec::new());
        }
        let mut buf = [0u8; READ_CHUNK];
        let n = match read_fd(self.fd, &mut buf) {
            Ok(n) => n,
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
                ) =>
            {
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "end of input"));
        }
        trace!(bytes = n, "console read");
        self.carry.extend_from_slice(&buf[..n]);
        Ok(decode_utf8(&mut self.carry))
    }
}

impl Drop for StdinSource {
    fn drop(&mut self) {
        if self.guard.take().is_some() {
            // Mouse reporting outlives the coordinator if it exits abnormally.
            let mut stdout = io::stdout();
            let _ = stdout.write_all(sequences::MOUSE_OFF.as_bytes());
            let _ = stdout.flush();
            debug!("stdin source closed");
        }
    }
}

struct Fd(RawFd);

impl std::os::unix::io::AsRawFd for Fd {
    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

/// Decode the complete characters in `bytes`, leaving a trailing partial
/// sequence in place. Invalid bytes become U+FFFD.
fn decode_utf8(bytes: &mut Vec<u8>) -> Vec<char> {
    let mut chars = Vec::with_capacity(bytes.len());
    let mut rest: &[u8] = bytes;
    loop {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                chars.extend(valid.chars());
                rest = &[];
                break;
            }
            Err(e) => {
                let (valid, after) = rest.split_at(e.valid_up_to());
                // Prefix checked by from_utf8.
                chars.extend(String::from_utf8_lossy(valid).chars());
                match e.error_len() {
                    Some(len) => {
                        chars.push(char::REPLACEMENT_CHARACTER);
                        rest = &after[len..];
                    }
                    None => {
                        rest = after;
                        break;
                    }
                }
            }
        }
    }
    let keep = rest.len();
    let drop_len = bytes.len() - keep;
    bytes.drain(..drop_len);
    chars
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::raw::tests::create_pipe;
    use std::os::unix::io::AsRawFd;

    #[test]
    fn test_decode_ascii() {
        let mut bytes = b"abc".to_vec();
        assert_eq!(decode_utf8(&mut bytes), vec!['a', 'b', 'c']);
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_decode_split_sequence() {
        let euro = "€".as_bytes();
        let mut bytes = vec![b'x', euro[0], euro[1]];
        assert_eq!(decode_utf8(&mut bytes), vec!['x']);
        assert_eq!(bytes, &euro[..2]);

        bytes.push(euro[2]);
        assert_eq!(decode_utf8(&mut bytes), vec!['€']);
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_decode_invalid_byte() {
        let mut bytes = vec![b'a', 0xff, b'b'];
        assert_eq!(
            decode_utf8(&mut bytes),
            vec!['a', char::REPLACEMENT_CHARACTER, 'b']
        );
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_read_from_pipe() {
        let (reader, mut writer) = create_pipe().expect("Failed to create pipe");
        let mut source = StdinSource::from_fd(reader.as_raw_fd())
            .without_raw_mode()
            .poll_interval(Duration::from_millis(100));
        source.open().unwrap();
        let cancel = CancellationToken::new();

        writer.write_all("\x1b[A€".as_bytes()).unwrap();
        assert_eq!(source.read(&cancel).unwrap(), vec!['\x1b', '[', 'A', '€']);
    }

    #[test]
    fn test_read_times_out_empty() {
        let (reader, _writer) = create_pipe().expect("Failed to create pipe");
        let mut source = StdinSource::from_fd(reader.as_raw_fd())
            .without_raw_mode()
            .poll_interval(Duration::from_millis(5));
        assert!(source.read(&CancellationToken::new()).unwrap().is_empty());
    }

    #[test]
    fn test_end_of_input_is_an_error() {
        let (reader, writer) = create_pipe().expect("Failed to create pipe");
        drop(writer);
        let mut source = StdinSource::from_fd(reader.as_raw_fd())
            .without_raw_mode()
            .poll_interval(Duration::from_millis(100));
        let err = source.read(&CancellationToken::new()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_raw_mode_on_pipe_fails_to_open() {
        let (reader, _writer) = create_pipe().expect("Failed to create pipe");
        let mut source = StdinSource::from_fd(reader.as_raw_fd());
        assert!(source.open().is_err());
    }
}
