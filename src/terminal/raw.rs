//! termios raw mode and low-level descriptor I/O.
//!
//! # Safety
//! This module uses unsafe code for FFI calls to libc (termios, ioctl, poll,
//! read). Each call is wrapped so the rest of the crate stays safe.

#![allow(unsafe_code)]
#![allow(clippy::borrow_as_ptr)]

use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::Duration;

use tracing::debug;

use crate::terminal::output::Size;

/// Saved console mode, restored on drop.
#[derive(Debug)]
pub struct RawModeGuard {
    fd: RawFd,
    original: libc::termios,
}

impl RawModeGuard {
    /// Put the console behind `fd` into raw mode.
    ///
    /// Line editing, echo, signal keys and output post-processing are
    /// turned off. Reads never block; wait with [`poll_readable`] first.
    ///
    /// # Errors
    ///
    /// Returns an error if `fd` is not a terminal.
    pub fn new<F: AsRawFd>(fd: &F) -> io::Result<Self> {
        let fd = fd.as_raw_fd();
        let original = get_termios(fd)?;

        let mut raw = original;
        raw.c_iflag &= !(libc::BRKINT | libc::ICRNL | libc::INPCK | libc::ISTRIP | libc::IXON);
        raw.c_oflag &= !libc::OPOST;
        raw.c_cflag |= libc::CS8;
        raw.c_lflag &= !(libc::ECHO | libc::ICANON | libc::IEXTEN | libc::ISIG);
        raw.c_cc[libc::VMIN] = 0;
        raw.c_cc[libc::VTIME] = 0;

        set_termios(fd, &raw)?;
        debug!(fd, "console in raw mode");
        Ok(Self { fd, original })
    }

    /// The descriptor this guard restores.
    #[must_use]
    pub fn fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if set_termios(self.fd, &self.original).is_ok() {
            debug!(fd = self.fd, "console mode restored");
        }
    }
}

/// Enter raw mode on stdin.
///
/// # Errors
///
/// Returns an error if stdin is not a terminal.
pub fn enable_raw_mode() -> io::Result<RawModeGuard> {
    RawModeGuard::new(&io::stdin())
}

/// Check if the given descriptor is a terminal.
#[must_use]
pub fn is_tty<F: AsRawFd>(fd: &F) -> bool {
    // SAFETY: isatty is safe to call with any fd
    unsafe { libc::isatty(fd.as_raw_fd()) == 1 }
}

/// Window size of the terminal on stdout.
///
/// # Errors
///
/// Returns an error if stdout is not a terminal or reports a zero size.
pub fn terminal_size() -> io::Result<Size> {
    terminal_size_of(libc::STDOUT_FILENO)
}

/// Window size of the terminal behind `fd`.
///
/// # Errors
///
/// Returns an error if `fd` is not a terminal or reports a zero size.
pub fn terminal_size_of(fd: RawFd) -> io::Result<Size> {
    let mut size: libc::winsize = unsafe { std::mem::zeroed() };

    // SAFETY: ioctl with TIOCGWINSZ is safe when passed a valid winsize struct
    let result = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &mut size) };

    if result == -1 {
        Err(io::Error::last_os_error())
    } else if size.ws_col == 0 || size.ws_row == 0 {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "terminal reported zero dimensions",
        ))
    } else {
        Ok(Size::new(size.ws_col, size.ws_row))
    }
}

/// Wait until `fd` has data or `timeout` elapses.
///
/// A signal interrupting the wait counts as "no data yet".
///
/// # Errors
///
/// Returns an error if `fd` is invalid or the peer hung up with nothing left
/// to read.
pub fn poll_readable(fd: RawFd, timeout: Duration) -> io::Result<bool> {
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let millis = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);

    // SAFETY: pollfd points to one valid, initialized struct
    let result = unsafe { libc::poll(&mut pollfd, 1, millis) };

    if result == -1 {
        let err = io::Error::last_os_error();
        return if err.kind() == io::ErrorKind::Interrupted {
            Ok(false)
        } else {
            Err(err)
        };
    }
    if result == 0 {
        return Ok(false);
    }
    if pollfd.revents & libc::POLLNVAL != 0 {
        return Err(io::Error::from_raw_os_error(libc::EBADF));
    }
    // POLLHUP with data pending still reads; read reports the end.
    Ok(pollfd.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0)
}

/// Read whatever is available from `fd`.
///
/// # Errors
///
/// Returns the OS error from `read`. `Ok(0)` means end of input.
pub fn read_fd(fd: RawFd, buf: &mut [u8]) -> io::Result<usize> {
    // SAFETY: buf is valid for writes of buf.len() bytes
    let result = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
    if result < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(result as usize)
    }
}

fn get_termios(fd: RawFd) -> io::Result<libc::termios> {
    let mut termios: libc::termios = unsafe { std::mem::zeroed() };

    // SAFETY: tcgetattr is safe when passed a valid termios struct
    let result = unsafe { libc::tcgetattr(fd, &mut termios) };

    if result == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(termios)
    }
}

fn set_termios(fd: RawFd, termios: &libc::termios) -> io::Result<()> {
    // SAFETY: tcsetattr is safe when passed a valid termios struct
    let result = unsafe { libc::tcsetattr(fd, libc::TCSAFLUSH, termios) };

    if result == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}
