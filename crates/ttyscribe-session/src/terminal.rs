//! The user's real terminal: raw mode and geometry.

use nix::sys::termios::{cfmakeraw, tcgetattr, tcsetattr, SetArg, Termios};
use nix::unistd::isatty;
use std::os::fd::{AsRawFd, BorrowedFd};
use tracing::{debug, warn};

use ttyscribe_core::{Dimensions, Error, Result};

use crate::io::write_all_fd;

/// The pair of descriptors the recorder talks to the user through.
#[derive(Debug, Clone, Copy)]
pub struct TerminalIo<'fd> {
    /// Keystrokes come from here
    pub input: BorrowedFd<'fd>,
    /// Child output is echoed here
    pub output: BorrowedFd<'fd>,
}

impl TerminalIo<'static> {
    /// The process's standard input and output.
    pub fn stdio() -> Self {
        // SAFETY: descriptors 0 and 1 stay open for the life of the process.
        unsafe {
            Self {
                input: BorrowedFd::borrow_raw(libc::STDIN_FILENO),
                output: BorrowedFd::borrow_raw(libc::STDOUT_FILENO),
            }
        }
    }
}

impl<'fd> TerminalIo<'fd> {
    /// Create from explicit descriptors.
    pub fn new(input: BorrowedFd<'fd>, output: BorrowedFd<'fd>) -> Self {
        Self { input, output }
    }

    /// Current geometry of this terminal, see [`query_geometry`].
    pub fn geometry(&self) -> Dimensions {
        query_geometry(self.output, self.input)
    }

    /// Write to the terminal output. Failures are not retried.
    pub fn write(&self, data: &[u8]) -> std::io::Result<()> {
        write_all_fd(self.output, data)
    }
}

/// Whether `fd` refers to a terminal.
pub fn is_tty(fd: BorrowedFd<'_>) -> bool {
    isatty(fd.as_raw_fd()).unwrap_or(false)
}

/// Query terminal geometry.
///
/// The output device is asked first, then the input device. The first answer
/// with nonzero rows and columns wins; otherwise 24x80.
pub fn query_geometry(output: BorrowedFd<'_>, input: BorrowedFd<'_>) -> Dimensions {
    [output, input]
        .into_iter()
        .find_map(window_size)
        .unwrap_or_default()
}

fn window_size(fd: BorrowedFd<'_>) -> Option<Dimensions> {
    // SAFETY: winsize is plain data; TIOCGWINSZ fills it or fails.
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::ioctl(fd.as_raw_fd(), libc::TIOCGWINSZ, &mut ws) };
    if rc == -1 {
        return None;
    }
    let dims = Dimensions::new(ws.ws_row, ws.ws_col);
    dims.is_usable().then_some(dims)
}

/// Puts a terminal into raw mode and restores it when dropped.
///
/// Descriptors that are not terminals are left alone, so piping input into
/// the recorder still works.
pub struct RawModeGuard<'fd> {
    fd: BorrowedFd<'fd>,
    original: Option<Termios>,
}

impl<'fd> RawModeGuard<'fd> {
    /// Snapshot the current attributes of `fd` and switch it to raw mode.
    pub fn enter(fd: BorrowedFd<'fd>) -> Result<Self> {
        if !is_tty(fd) {
            debug!("fd {} is not a terminal, raw mode skipped", fd.as_raw_fd());
            return Ok(Self { fd, original: None });
        }

        let original =
            tcgetattr(fd).map_err(|e| Error::Terminal(format!("tcgetattr failed: {e}")))?;
        let mut raw = original.clone();
        cfmakeraw(&mut raw);
        tcsetattr(fd, SetArg::TCSANOW, &raw)
            .map_err(|e| Error::Terminal(format!("tcsetattr failed: {e}")))?;

        debug!("Entered raw mode on fd {}", fd.as_raw_fd());
        Ok(Self {
            fd,
            original: Some(original),
        })
    }

    /// Whether attributes were changed and are waiting to be restored.
    pub fn is_active(&self) -> bool {
        self.original.is_some()
    }

    /// Restore the snapshot now. Later calls and the drop are no-ops.
    pub fn restore(&mut self) {
        if let Some(original) = self.original.take() {
            match tcsetattr(self.fd, SetArg::TCSANOW, &original) {
                Ok(()) => debug!("Restored terminal attributes on fd {}", self.fd.as_raw_fd()),
                Err(e) => warn!("Failed to restore terminal attributes: {}", e),
            }
        }
    }
}

impl Drop for RawModeGuard<'_> {
    fn drop(&mut self) {
        self.restore();
    }
}

impl std::fmt::Debug for RawModeGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawModeGuard")
            .field("fd", &self.fd.as_raw_fd())
            .field("active", &self.is_active())
            .finish()
    }
}
