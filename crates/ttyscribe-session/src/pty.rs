//! PTY (Pseudo-Terminal) handling with portable-pty.
//!
//! portable-pty allocates the pair and spawns the child with the slave as
//! its controlling terminal. Everything after spawn goes through the raw
//! master descriptor and `waitpid`, because the relay loop needs to poll the
//! master and the exit status must keep the terminating signal.

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use std::os::fd::{BorrowedFd, RawFd};
use tracing::{debug, error, info};

use ttyscribe_core::{Dimensions, Error, Result, ShellSettings};

use crate::io::{read_fd, write_all_fd};

/// A child process running on the slave side of a PTY.
pub struct PtySession {
    master: Box<dyn MasterPty + Send>,
    /// Kept so portable-pty does not consider the child abandoned; reaping
    /// goes through `waitpid` on `pid`.
    _child: Box<dyn Child + Send + Sync>,
    master_fd: RawFd,
    pid: Pid,
    exit_code: Option<i32>,
}

impl std::fmt::Debug for PtySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtySession")
            .field("pid", &self.pid)
            .field("master_fd", &self.master_fd)
            .field("exit_code", &self.exit_code)
            .finish_non_exhaustive()
    }
}

impl PtySession {
    /// Spawn `<shell> <shell args...> <command line>` on a new PTY.
    ///
    /// The child inherits the environment plus `LINES` and `COLUMNS`, and
    /// starts in the recorder's current directory.
    pub fn spawn(shell: &ShellSettings, command_line: &str, dimensions: Dimensions) -> Result<Self> {
        info!(
            "Spawning PTY: shell='{}' command='{}' dimensions={}",
            shell.program, command_line, dimensions
        );

        let pty_system = native_pty_system();
        let pair = pty_system.openpty(pty_size(dimensions)).map_err(|e| {
            error!("Failed to open PTY: {}", e);
            Error::Pty(format!("Failed to open PTY: {e}"))
        })?;

        let mut cmd = CommandBuilder::new(&shell.program);
        cmd.args(&shell.args);
        cmd.arg(command_line);
        cmd.env("LINES", dimensions.rows.to_string());
        cmd.env("COLUMNS", dimensions.cols.to_string());
        if let Some(term) = &shell.term {
            cmd.env("TERM", term);
        }
        // portable-pty would otherwise start the child in $HOME
        match std::env::current_dir() {
            Ok(dir) => cmd.cwd(dir),
            Err(e) => debug!("Current directory unavailable, child keeps default: {}", e),
        }

        let child = pair.slave.spawn_command(cmd).map_err(|e| {
            error!("Failed to spawn '{}': {}", shell.program, e);
            Error::Spawn(format!("{}: {e}", shell.program))
        })?;
        // The child holds its own copy of the slave; ours would keep the
        // master from ever reporting end of stream.
        drop(pair.slave);

        let pid = child
            .process_id()
            .ok_or_else(|| Error::Spawn("spawned child has no process id".to_string()))?;
        let master_fd = pair
            .master
            .as_raw_fd()
            .ok_or_else(|| Error::Pty("PTY master has no file descriptor".to_string()))?;

        info!("PTY spawned successfully: pid={}", pid);

        Ok(Self {
            master: pair.master,
            _child: child,
            master_fd,
            pid: Pid::from_raw(pid as i32),
            exit_code: None,
        })
    }

    /// Process id of the child.
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Borrow the master descriptor for polling and I/O.
    pub fn master_fd(&self) -> BorrowedFd<'_> {
        // SAFETY: the descriptor is owned by `self.master` and stays open
        // for as long as `self` is borrowed.
        unsafe { BorrowedFd::borrow_raw(self.master_fd) }
    }

    /// Read child output. `Ok(0)` or an error means the stream has ended.
    pub fn read(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        read_fd(self.master_fd(), buf)
    }

    /// Write bytes to the child's input.
    pub fn write(&self, data: &[u8]) -> std::io::Result<()> {
        write_all_fd(self.master_fd(), data)
    }

    /// Set the PTY window size. Best effort: failures are logged and ignored.
    pub fn resize(&self, dimensions: Dimensions) {
        match self.master.resize(pty_size(dimensions)) {
            Ok(()) => debug!("PTY resized to {}", dimensions),
            Err(e) => debug!("PTY resize to {} failed: {}", dimensions, e),
        }
    }

    /// Send `signal` to the child. Failures (child already gone) are logged.
    pub fn signal(&self, signal: Signal) {
        if self.exit_code.is_some() {
            return;
        }
        match kill(self.pid, signal) {
            Ok(()) => debug!("Sent {} to pid {}", signal, self.pid),
            Err(e) => debug!("Sending {} to pid {} failed: {}", signal, self.pid, e),
        }
    }

    /// Reap the child if it has exited, without blocking.
    pub fn try_wait(&mut self) -> Result<Option<i32>> {
        if let Some(code) = self.exit_code {
            return Ok(Some(code));
        }
        loop {
            match waitpid(self.pid, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) => return Ok(None),
                Ok(status) => {
                    if let Some(code) = exit_code_from_status(status) {
                        self.exit_code = Some(code);
                        return Ok(Some(code));
                    }
                    // Stopped/continued: not an exit, report still running.
                    return Ok(None);
                }
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(Error::Pty(format!("waitpid failed: {e}"))),
            }
        }
    }

    /// Block until the child exits and return its exit code.
    ///
    /// Normal exit yields the status; death by signal N yields 128 + N.
    pub fn wait(&mut self) -> Result<i32> {
        if let Some(code) = self.exit_code {
            return Ok(code);
        }
        loop {
            match waitpid(self.pid, None) {
                Ok(status) => {
                    if let Some(code) = exit_code_from_status(status) {
                        debug!("Child {} reaped with exit code {}", self.pid, code);
                        self.exit_code = Some(code);
                        return Ok(code);
                    }
                }
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(Error::Pty(format!("waitpid failed: {e}"))),
            }
        }
    }
}

fn pty_size(dimensions: Dimensions) -> PtySize {
    PtySize {
        rows: dimensions.rows,
        cols: dimensions.cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

/// Map a terminal wait status to a shell-style exit code.
pub fn exit_code_from_status(status: WaitStatus) -> Option<i32> {
    match status {
        WaitStatus::Exited(_, code) => Some(code),
        WaitStatus::Signaled(_, signal, _) => Some(128 + signal as i32),
        _ => None,
    }
}
