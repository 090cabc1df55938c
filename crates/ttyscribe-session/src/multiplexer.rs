//! The session multiplexer.
//!
//! Owns the PTY, the capture buffer and the user's terminal for the lifetime
//! of one recorded session:
//!
//! ```text
//! Spawning -> Running -> Draining -> Terminated
//! ```
//!
//! While Running, the loop waits on the terminal input and the PTY master,
//! plus the signal relay's wake pipe. Child output is echoed and captured in
//! order; keystrokes pass through [`DetachState`] before reaching the child.
//! The signal relay outlives raw mode: it stays installed through Draining
//! until the child has been reaped.

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::signal::Signal;
use std::io::ErrorKind;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error, info, warn};

use ttyscribe_core::{
    Error, Result, SessionMetadata, SessionOutcome, SessionSettings, ShellSettings,
};

use crate::capture::{Capture, CapturedStream};
use crate::detach::{DetachState, InputAction, DETACH_PROMPT};
use crate::io::read_fd;
use crate::pty::PtySession;
use crate::record::SessionClock;
use crate::signals::{SessionEvent, SignalRelay};
use crate::terminal::{RawModeGuard, TerminalIo};

/// Exit code reported when the shell cannot be started.
pub const SPAWN_FAILED_EXIT_CODE: i32 = 127;

// Child exit is noticed by polling while reaping.
const REAP_INTERVAL_MS: u16 = 20;

/// What to run and how.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Command and arguments; joined with spaces and handed to the shell
    pub command: Vec<String>,
    /// Optional session name for the record
    pub name: Option<String>,
    /// Shell used to run the command line
    pub shell: ShellSettings,
    /// Relay loop settings
    pub session: SessionSettings,
}

impl SessionOptions {
    /// Options with default shell and loop settings.
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            name: None,
            shell: ShellSettings::default(),
            session: SessionSettings::default(),
        }
    }

    /// The command line given to the shell.
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

/// Everything a finished session produced.
#[derive(Debug, Clone)]
pub struct SessionReport {
    /// Raw capture
    pub raw: Vec<u8>,
    /// Cleaned transcript (or a placeholder if cleaning failed)
    pub transcript: String,
    /// Session record
    pub metadata: SessionMetadata,
}

impl SessionReport {
    /// Exit code of the child, or 128 + signal.
    pub fn exit_code(&self) -> i32 {
        self.metadata.exit_code
    }
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Starting the child
    Spawning,
    /// Relaying between terminal and child
    Running,
    /// Terminal released, collecting what is left of the output
    Draining,
    /// Child reaped
    Terminated,
}

/// Why the relay loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelayEnd {
    EndOfStream,
    Detached,
    Killed,
    Failed,
}

/// Records one session between a terminal and a child process.
#[derive(Debug)]
pub struct SessionMultiplexer<'fd> {
    options: SessionOptions,
    terminal: TerminalIo<'fd>,
    phase: SessionPhase,
}

impl<'fd> SessionMultiplexer<'fd> {
    /// Create a multiplexer talking to the user through `terminal`.
    pub fn new(options: SessionOptions, terminal: TerminalIo<'fd>) -> Self {
        Self {
            options,
            terminal,
            phase: SessionPhase::Spawning,
        }
    }

    /// Run the session to completion.
    ///
    /// Only an empty command is an error. Spawn failures produce a report
    /// with exit code 127, and the terminal is restored on every path out
    /// of the relay loop, including unwinding.
    pub fn run(mut self) -> Result<SessionReport> {
        if self.options.command.is_empty() {
            return Err(Error::InvalidInput("no command given".to_string()));
        }

        let command_line = self.options.command_line();
        let geometry = self.terminal.geometry();
        let clock = SessionClock::start(self.options.name.clone(), command_line.as_str(), geometry);
        info!(
            "Session {} starting: command='{}' geometry={}",
            clock.id(),
            command_line,
            geometry
        );

        let mut pty = match PtySession::spawn(&self.options.shell, &command_line, geometry) {
            Ok(pty) => pty,
            Err(e) => {
                error!("Failed to start session: {}", e);
                self.enter(SessionPhase::Terminated);
                let capture = CapturedStream::new().finish();
                let metadata =
                    clock.finish(SPAWN_FAILED_EXIT_CODE, SessionOutcome::SpawnFailed, &capture);
                return Ok(Self::report(capture, metadata));
            }
        };

        let mut stream = CapturedStream::new();
        let mut buf = vec![0u8; self.options.session.read_chunk_size];

        // Installed until the child is reaped, so a signal during the final
        // wait reaches the child instead of killing the recorder.
        let signals = match SignalRelay::install(self.options.session.forward_signals) {
            Ok(relay) => Some(relay),
            Err(e) => {
                warn!("Continuing without signal relay: {}", e);
                None
            }
        };

        self.enter(SessionPhase::Running);
        let end = {
            let _raw = match RawModeGuard::enter(self.terminal.input) {
                Ok(guard) => Some(guard),
                Err(e) => {
                    warn!("Continuing without raw mode: {}", e);
                    None
                }
            };
            self.relay(&pty, &mut stream, &mut buf, signals.as_ref())
        };

        self.enter(SessionPhase::Draining);
        let outcome = match end {
            RelayEnd::EndOfStream => SessionOutcome::Exited,
            RelayEnd::Detached => {
                info!("Detached from pid {}", pty.pid());
                self.drain_quietly(&mut pty, &mut stream, &mut buf, signals.as_ref());
                SessionOutcome::Detached
            }
            RelayEnd::Killed => {
                info!("Killed pid {}", pty.pid());
                self.drain_quietly(&mut pty, &mut stream, &mut buf, signals.as_ref());
                SessionOutcome::Killed
            }
            RelayEnd::Failed => {
                // Behave like a terminal that went away.
                pty.signal(Signal::SIGHUP);
                self.drain_quietly(&mut pty, &mut stream, &mut buf, signals.as_ref());
                SessionOutcome::Killed
            }
        };

        let exit_code = self.reap(&mut pty, signals.as_ref()).unwrap_or_else(|e| {
            error!("Failed to reap child: {}", e);
            1
        });
        drop(signals);
        self.enter(SessionPhase::Terminated);
        info!("Session ended: outcome={} exit_code={}", outcome, exit_code);

        let capture = stream.finish();
        let metadata = clock.finish(exit_code, outcome, &capture);
        Ok(Self::report(capture, metadata))
    }

    fn enter(&mut self, phase: SessionPhase) {
        debug!("Session phase: {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    fn timeout(&self) -> PollTimeout {
        let ms = self.options.session.idle_timeout_ms.min(u64::from(u16::MAX)) as u16;
        PollTimeout::from(ms)
    }

    fn relay(
        &self,
        pty: &PtySession,
        stream: &mut CapturedStream,
        buf: &mut [u8],
        signals: Option<&SignalRelay>,
    ) -> RelayEnd {
        let trigger = self.options.session.detach_byte;
        let timeout = self.timeout();
        let mut detach = DetachState::default();
        let mut input_open = true;

        loop {
            if let Some(relay) = signals {
                for event in relay.drain() {
                    self.handle_event(pty, event);
                }
            }

            let mut fds = vec![PollFd::new(pty.master_fd(), PollFlags::POLLIN)];
            if let Some(relay) = signals {
                fds.push(PollFd::new(relay.wake_fd(), PollFlags::POLLIN));
            }
            let input_slot = input_open.then(|| {
                fds.push(PollFd::new(self.terminal.input, PollFlags::POLLIN));
                fds.len() - 1
            });

            match poll(&mut fds, timeout) {
                Ok(0) => continue,
                Ok(_) => {}
                Err(Errno::EINTR) => continue,
                Err(e) => {
                    error!("poll failed: {}", e);
                    return RelayEnd::Failed;
                }
            }

            let master_events = fds[0].revents().unwrap_or(PollFlags::empty());
            let input_events = input_slot
                .and_then(|slot| fds[slot].revents())
                .unwrap_or(PollFlags::empty());
            drop(fds);

            if master_events.contains(PollFlags::POLLNVAL) {
                error!("PTY master descriptor is invalid");
                return RelayEnd::Failed;
            }
            if readable(master_events) {
                match pty.read(buf) {
                    Ok(0) => return RelayEnd::EndOfStream,
                    Ok(n) => {
                        let chunk = &buf[..n];
                        if let Err(e) = self.terminal.write(chunk) {
                            debug!("Terminal write failed: {}", e);
                        }
                        stream.append(chunk);
                    }
                    Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                    Err(e) => {
                        debug!("PTY read ended: {}", e);
                        return RelayEnd::EndOfStream;
                    }
                }
            }

            if input_events.contains(PollFlags::POLLNVAL) {
                debug!("Terminal input is invalid, no longer polled");
                input_open = false;
            } else if readable(input_events) {
                let mut byte = [0u8; 1];
                match read_fd(self.terminal.input, &mut byte) {
                    Ok(0) => {
                        debug!("Terminal input closed");
                        input_open = false;
                    }
                    Ok(_) => match detach.on_byte(byte[0], trigger) {
                        InputAction::Forward(b) => {
                            if let Err(e) = pty.write(&[b]) {
                                debug!("PTY write failed: {}", e);
                            }
                        }
                        InputAction::ShowPrompt => {
                            if let Err(e) = self.terminal.write(DETACH_PROMPT) {
                                debug!("Terminal write failed: {}", e);
                            }
                        }
                        InputAction::Detach => return RelayEnd::Detached,
                        InputAction::Kill => {
                            pty.signal(Signal::SIGTERM);
                            return RelayEnd::Killed;
                        }
                    },
                    Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                    Err(e) => {
                        debug!("Terminal input read failed, no longer polled: {}", e);
                        input_open = false;
                    }
                }
            }
        }
    }

    fn handle_event(&self, pty: &PtySession, event: SessionEvent) {
        match event {
            SessionEvent::Resize => {
                let dims = self.terminal.geometry();
                debug!("Terminal resized to {}", dims);
                pty.resize(dims);
                pty.signal(Signal::SIGWINCH);
            }
            SessionEvent::Forward(signal) => {
                debug!("Forwarding {} to child", signal);
                pty.signal(signal);
            }
        }
    }

    /// Forward signals once the terminal has been released. Resizes no
    /// longer concern the child.
    fn forward_released(&self, pty: &PtySession, signals: Option<&SignalRelay>) {
        let Some(relay) = signals else {
            return;
        };
        for event in relay.drain() {
            match event {
                SessionEvent::Forward(signal) => {
                    debug!("Forwarding {} to child after release", signal);
                    pty.signal(signal);
                }
                SessionEvent::Resize => debug!("Ignoring resize after release"),
            }
        }
    }

    /// Capture output without echo until end of stream or until the child
    /// has been reaped.
    fn drain_quietly(
        &self,
        pty: &mut PtySession,
        stream: &mut CapturedStream,
        buf: &mut [u8],
        signals: Option<&SignalRelay>,
    ) {
        let timeout = self.timeout();
        loop {
            self.forward_released(pty, signals);
            match pty.try_wait() {
                Ok(Some(code)) => {
                    debug!("Child exited with {} while draining", code);
                    return;
                }
                Ok(None) => {}
                Err(e) => {
                    debug!("Stopped draining: {}", e);
                    return;
                }
            }

            let mut fds = vec![PollFd::new(pty.master_fd(), PollFlags::POLLIN)];
            if let Some(relay) = signals {
                fds.push(PollFd::new(relay.wake_fd(), PollFlags::POLLIN));
            }
            match poll(&mut fds, timeout) {
                Ok(0) => continue,
                Ok(_) => {}
                Err(Errno::EINTR) => continue,
                Err(e) => {
                    debug!("poll failed while draining: {}", e);
                    return;
                }
            }
            let master_events = fds[0].revents().unwrap_or(PollFlags::empty());
            drop(fds);
            if master_events.is_empty() {
                // Woken by a signal only.
                continue;
            }
            if !readable(master_events) {
                return;
            }
            match pty.read(buf) {
                Ok(0) => return,
                Ok(n) => stream.append(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                Err(_) => return,
            }
        }
    }

    /// Wait for the child to exit, forwarding signals meanwhile.
    ///
    /// Returns its exit status, or 128 + signal.
    fn reap(&self, pty: &mut PtySession, signals: Option<&SignalRelay>) -> Result<i32> {
        let Some(relay) = signals else {
            return pty.wait();
        };
        let timeout = PollTimeout::from(REAP_INTERVAL_MS);
        loop {
            self.forward_released(pty, Some(relay));
            if let Some(code) = pty.try_wait()? {
                return Ok(code);
            }
            let mut fds = [PollFd::new(relay.wake_fd(), PollFlags::POLLIN)];
            match poll(&mut fds, timeout) {
                Ok(_) | Err(Errno::EINTR) => {}
                Err(e) => {
                    debug!("poll failed while reaping, blocking instead: {}", e);
                    return pty.wait();
                }
            }
        }
    }

    fn report(capture: Capture, metadata: SessionMetadata) -> SessionReport {
        let transcript = clean_isolated(&capture.bytes);
        SessionReport {
            raw: capture.bytes,
            transcript,
            metadata,
        }
    }
}

fn readable(events: PollFlags) -> bool {
    events.intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR)
}

/// Clean the capture; a panic in the cleaner yields a placeholder instead.
pub fn clean_isolated(raw: &[u8]) -> String {
    match panic::catch_unwind(AssertUnwindSafe(|| ttyscribe_clean::clean(raw))) {
        Ok(text) => text,
        Err(_) => {
            error!("Transcript cleaning panicked on {} bytes", raw.len());
            format!(
                "[ttyscribe] transcript cleaning failed; raw capture was {} bytes",
                raw.len()
            )
        }
    }
}
