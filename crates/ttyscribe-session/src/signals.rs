//! Signal relay.
//!
//! Handlers only set a bit in a process-wide atomic mask and write one byte
//! to a self-pipe. The relay loop polls the pipe's read end next to its other
//! descriptors, so a signal wakes it at once; it then drains the mask into
//! [`SessionEvent`]s and does the actual work (resize, forwarding) on the main
//! thread.

use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, FdFlag, OFlag};
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd::{pipe, read, write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use tracing::{debug, warn};

use ttyscribe_core::{Error, Result};

static PENDING: AtomicU32 = AtomicU32::new(0);
static WAKE_FD: AtomicI32 = AtomicI32::new(-1);

const FORWARDED: [Signal; 3] = [Signal::SIGINT, Signal::SIGTERM, Signal::SIGHUP];

extern "C" fn on_signal(signum: libc::c_int) {
    if (0..32).contains(&signum) {
        PENDING.fetch_or(1 << signum, Ordering::SeqCst);
    }
    let fd = WAKE_FD.load(Ordering::SeqCst);
    if fd >= 0 {
        // SAFETY: WAKE_FD is only set while the relay owns the descriptor.
        let fd = unsafe { BorrowedFd::borrow_raw(fd) };
        // A full pipe already guarantees a wakeup.
        let _ = write(fd, &[1u8]);
    }
}

/// Something the relay loop must act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The user's terminal changed size
    Resize,
    /// Pass this signal on to the child
    Forward(Signal),
}

/// Installed signal handlers; the previous dispositions come back on drop.
#[derive(Debug)]
pub struct SignalRelay {
    previous: Vec<(Signal, SigAction)>,
    wake_read: OwnedFd,
    _wake_write: OwnedFd,
}

impl SignalRelay {
    /// Install handlers for SIGWINCH and, when `forward` is set, for SIGINT,
    /// SIGTERM and SIGHUP.
    ///
    /// Handlers are installed without `SA_RESTART` so a pending signal also
    /// interrupts blocking calls with EINTR.
    pub fn install(forward: bool) -> Result<Self> {
        let (wake_read, wake_write) =
            pipe().map_err(|e| Error::Other(format!("signal wake pipe failed: {e}")))?;
        for fd in [&wake_read, &wake_write] {
            configure_wake_fd(fd)?;
        }

        // Stale bits from an earlier session would be replayed otherwise.
        PENDING.store(0, Ordering::SeqCst);
        WAKE_FD.store(wake_write.as_raw_fd(), Ordering::SeqCst);

        let action = SigAction::new(
            SigHandler::Handler(on_signal),
            SaFlags::empty(),
            SigSet::empty(),
        );

        let mut relay = Self {
            previous: Vec::with_capacity(4),
            wake_read,
            _wake_write: wake_write,
        };
        let signals = std::iter::once(Signal::SIGWINCH)
            .chain(FORWARDED.into_iter().filter(|_| forward));
        for signal in signals {
            // SAFETY: the handler only touches atomics and write(2).
            let previous = unsafe { sigaction(signal, &action) }
                .map_err(|e| Error::Other(format!("sigaction {signal} failed: {e}")))?;
            relay.previous.push((signal, previous));
        }

        debug!(
            "Signal relay installed for {:?}",
            relay.previous.iter().map(|(s, _)| *s).collect::<Vec<_>>()
        );
        Ok(relay)
    }

    /// Descriptor that becomes readable when a signal arrives.
    pub fn wake_fd(&self) -> BorrowedFd<'_> {
        self.wake_read.as_fd()
    }

    /// Take all signals received since the last call.
    ///
    /// A resize, if any, comes first; several resizes collapse into one.
    pub fn drain(&self) -> Vec<SessionEvent> {
        self.clear_wakeups();
        let bits = PENDING.swap(0, Ordering::SeqCst);
        let mut events = Vec::new();
        if bits & bit(Signal::SIGWINCH) != 0 {
            events.push(SessionEvent::Resize);
        }
        for signal in FORWARDED {
            if bits & bit(signal) != 0 {
                events.push(SessionEvent::Forward(signal));
            }
        }
        events
    }

    fn clear_wakeups(&self) {
        let mut buf = [0u8; 64];
        loop {
            match read(self.wake_read.as_raw_fd(), &mut buf) {
                Ok(n) if n == buf.len() => continue,
                Err(Errno::EINTR) => continue,
                _ => break,
            }
        }
    }
}

impl Drop for SignalRelay {
    fn drop(&mut self) {
        WAKE_FD.store(-1, Ordering::SeqCst);
        for (signal, previous) in self.previous.drain(..).rev() {
            // SAFETY: restoring a disposition that was in place before.
            if let Err(e) = unsafe { sigaction(signal, &previous) } {
                warn!("Failed to restore handler for {}: {}", signal, e);
            }
        }
        debug!("Signal relay removed");
    }
}

fn bit(signal: Signal) -> u32 {
    1 << (signal as i32)
}

// The handler must never block on a full pipe.
fn configure_wake_fd(fd: &OwnedFd) -> Result<()> {
    let raw = fd.as_raw_fd();
    fcntl(raw, FcntlArg::F_SETFL(OFlag::O_NONBLOCK))
        .and_then(|_| fcntl(raw, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC)))
        .map_err(|e| Error::Other(format!("fcntl on signal wake pipe failed: {e}")))?;
    Ok(())
}
