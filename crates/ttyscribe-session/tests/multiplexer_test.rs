//! End-to-end tests for the session multiplexer.
//!
//! A second PTY stands in for the user's terminal: the multiplexer talks to
//! its slave side, while the test writes keystrokes into and collects screen
//! output from its master side.

use nix::pty::{openpty, OpenptyResult, Winsize};
use nix::sys::signal::{kill, sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::sys::termios::{tcgetattr, Termios};
use nix::unistd::getpid;
use std::fs::File;
use std::io::{Read, Write};
use std::os::fd::{AsFd, OwnedFd};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use ttyscribe_core::{Dimensions, SessionOutcome, ShellSettings};
use ttyscribe_session::{SessionMultiplexer, SessionOptions, SessionReport, TerminalIo};

// Sessions install process-wide signal handlers and raw mode.
static SERIAL: Mutex<()> = Mutex::new(());

struct Outcome {
    report: SessionReport,
    screen: String,
    before: Termios,
    after: Termios,
}

fn sh_options(command: &str) -> SessionOptions {
    let mut options = SessionOptions::new(vec![command.to_string()]);
    options.shell = ShellSettings {
        program: "/bin/sh".to_string(),
        args: vec!["-c".to_string()],
        term: None,
    };
    options.session.idle_timeout_ms = 50;
    options
}

fn fake_terminal(rows: u16, cols: u16) -> (File, OwnedFd) {
    let ws = Winsize {
        ws_row: rows,
        ws_col: cols,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };
    let OpenptyResult { master, slave } = openpty(&ws, None::<&Termios>).unwrap();
    (File::from(master), slave)
}

/// Collect everything shown on the fake terminal until its slave closes.
fn spawn_screen_reader(master: &File) -> thread::JoinHandle<Vec<u8>> {
    let mut reader = master.try_clone().unwrap();
    thread::spawn(move || {
        let mut out = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => out.extend_from_slice(&buf[..n]),
            }
        }
        out
    })
}

fn run(options: SessionOptions, keystrokes: &[u8]) -> Outcome {
    let (mut master, slave) = fake_terminal(24, 80);
    let before = tcgetattr(slave.as_fd()).unwrap();
    master.write_all(keystrokes).unwrap();
    let screen = spawn_screen_reader(&master);

    let terminal = TerminalIo::new(slave.as_fd(), slave.as_fd());
    let report = SessionMultiplexer::new(options, terminal).run().unwrap();

    let after = tcgetattr(slave.as_fd()).unwrap();
    drop(slave);
    let screen = String::from_utf8_lossy(&screen.join().unwrap()).to_string();
    Outcome {
        report,
        screen,
        before,
        after,
    }
}

fn assert_restored(outcome: &Outcome) {
    assert_eq!(outcome.after.input_flags, outcome.before.input_flags);
    assert_eq!(outcome.after.output_flags, outcome.before.output_flags);
    assert_eq!(outcome.after.control_flags, outcome.before.control_flags);
    assert_eq!(outcome.after.local_flags, outcome.before.local_flags);
    assert_eq!(outcome.after.control_chars, outcome.before.control_chars);
}

fn lock() -> std::sync::MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|e| e.into_inner())
}

#[test]
fn test_output_is_echoed_captured_and_cleaned() {
    let _lock = lock();
    let outcome = run(sh_options("printf '\\033[1mhello\\033[0m\\n'"), b"");

    let report = &outcome.report;
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.metadata.outcome, SessionOutcome::Exited);
    assert_eq!(report.transcript, "hello");
    assert_eq!(report.raw, b"\x1b[1mhello\x1b[0m\r\n".to_vec());
    assert_eq!(report.metadata.bytes, report.raw.len() as u64);
    assert_eq!(report.metadata.digest.len(), 64);
    assert!(outcome.screen.contains("\x1b[1mhello\x1b[0m"));
    assert_restored(&outcome);
}

#[test]
fn test_exit_code_passthrough() {
    let _lock = lock();
    let outcome = run(sh_options("exit 3"), b"");
    assert_eq!(outcome.report.exit_code(), 3);
    assert_restored(&outcome);
}

#[test]
fn test_killed_by_signal_reports_128_plus_signal() {
    let _lock = lock();
    let outcome = run(sh_options("kill -9 $$"), b"");
    assert_eq!(outcome.report.exit_code(), 137);
    assert_eq!(outcome.report.metadata.outcome, SessionOutcome::Exited);
    assert_restored(&outcome);
}

#[test]
fn test_detach_forwards_nothing() {
    let _lock = lock();
    let outcome = run(sh_options("sleep 1"), &[0x1D, b'd']);

    let report = &outcome.report;
    assert_eq!(report.metadata.outcome, SessionOutcome::Detached);
    assert_eq!(report.exit_code(), 0);
    // Neither the trigger nor the choice reached the child's terminal.
    assert!(!report.raw.contains(&0x1D));
    assert!(!report.raw.contains(&b'd'));
    assert!(outcome.screen.contains("(d)etach"));
    assert_restored(&outcome);
}

#[test]
fn test_kill_sends_sigterm() {
    let _lock = lock();
    let started = Instant::now();
    let outcome = run(sh_options("exec sleep 5"), &[0x1D, b'K']);

    assert_eq!(outcome.report.metadata.outcome, SessionOutcome::Killed);
    assert_eq!(outcome.report.exit_code(), 143);
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_restored(&outcome);
}

#[test]
fn test_false_trigger_forwards_second_byte_only() {
    let _lock = lock();
    let outcome = run(
        sh_options("read line; echo \"got:$line\""),
        &[0x1D, b'x', b'\n'],
    );

    let report = &outcome.report;
    assert_eq!(report.exit_code(), 0);
    assert!(report.transcript.contains("got:x"));
    // The child's terminal would have echoed a forwarded trigger as ^].
    assert!(!report.raw.contains(&0x1D));
    assert!(!report.transcript.contains("^]"));
    assert_restored(&outcome);
}

#[test]
fn test_custom_detach_byte() {
    let _lock = lock();
    let mut options = sh_options("sleep 1");
    options.session.detach_byte = 0x01;
    let outcome = run(options, &[0x1D, 0x01, b'd']);
    assert_eq!(outcome.report.metadata.outcome, SessionOutcome::Detached);
    assert_restored(&outcome);
}

#[test]
fn test_spawn_failure_reports_127() {
    let _lock = lock();
    let mut options = sh_options("true");
    options.shell.program = "/nonexistent/shell".to_string();
    let outcome = run(options, b"");

    let report = &outcome.report;
    assert_eq!(report.exit_code(), 127);
    assert_eq!(report.metadata.outcome, SessionOutcome::SpawnFailed);
    assert!(report.raw.is_empty());
    assert_eq!(report.transcript, "");
    assert_restored(&outcome);
}

#[test]
fn test_geometry_reaches_child() {
    let _lock = lock();
    let (master, slave) = fake_terminal(40, 100);
    let screen = spawn_screen_reader(&master);

    let terminal = TerminalIo::new(slave.as_fd(), slave.as_fd());
    let report = SessionMultiplexer::new(
        sh_options("echo \"$LINES $COLUMNS\"; stty size"),
        terminal,
    )
    .run()
    .unwrap();
    drop(slave);
    screen.join().unwrap();

    assert_eq!(report.metadata.geometry, Dimensions::new(40, 100));
    assert_eq!(report.transcript, "40 100\n\n40 100");
}

#[test]
fn test_input_eof_keeps_relaying_output() {
    let _lock = lock();
    let (master, slave) = fake_terminal(24, 80);
    let screen = spawn_screen_reader(&master);
    let devnull = File::open("/dev/null").unwrap();

    let terminal = TerminalIo::new(devnull.as_fd(), slave.as_fd());
    let report = SessionMultiplexer::new(sh_options("sleep 0.3; printf done"), terminal)
        .run()
        .unwrap();
    drop(slave);
    let screen = String::from_utf8_lossy(&screen.join().unwrap()).to_string();

    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.transcript, "done");
    assert!(screen.contains("done"));
}

#[test]
fn test_resize_is_propagated() {
    let _lock = lock();
    let (master, slave) = fake_terminal(24, 80);
    let screen = spawn_screen_reader(&master);
    let master_fd = master.try_clone().unwrap();

    let resizer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(700));
        let ws = libc::winsize {
            ws_row: 50,
            ws_col: 150,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };
        use std::os::fd::AsRawFd;
        let rc = unsafe { libc::ioctl(master_fd.as_raw_fd(), libc::TIOCSWINSZ, &ws) };
        assert_eq!(rc, 0);
        kill(getpid(), Signal::SIGWINCH).unwrap();
    });

    let command = "trap 'stty size; exit 0' WINCH; \
                   i=0; while [ $i -lt 50 ]; do sleep 0.1; i=$((i+1)); done; exit 1";
    let terminal = TerminalIo::new(slave.as_fd(), slave.as_fd());
    let report = SessionMultiplexer::new(sh_options(command), terminal)
        .run()
        .unwrap();
    resizer.join().unwrap();
    drop(slave);
    screen.join().unwrap();

    assert_eq!(report.exit_code(), 0);
    assert!(report.transcript.contains("50 150"));
}

#[test]
fn test_sigint_is_forwarded_to_child() {
    let _lock = lock();
    // An early signal must not take the test process down with it.
    let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
    let original = unsafe { sigaction(Signal::SIGINT, &ignore) }.unwrap();

    let signaller = thread::spawn(|| {
        thread::sleep(Duration::from_millis(700));
        kill(getpid(), Signal::SIGINT).unwrap();
    });

    let command = "trap 'echo got-int; exit 5' INT; \
                   i=0; while [ $i -lt 50 ]; do sleep 0.1; i=$((i+1)); done; exit 1";
    let outcome = run(sh_options(command), b"");
    signaller.join().unwrap();

    let restored = unsafe { sigaction(Signal::SIGINT, &original) }.unwrap();
    assert_eq!(restored.handler(), SigHandler::SigIgn);

    assert_eq!(outcome.report.exit_code(), 5);
    assert!(outcome.report.transcript.contains("got-int"));
    assert_restored(&outcome);
}

#[test]
fn test_signal_after_detach_reaches_child() {
    let _lock = lock();
    // Stays ignored if the relay were ever gone while the child runs.
    let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
    let original = unsafe { sigaction(Signal::SIGINT, &ignore) }.unwrap();

    let signaller = thread::spawn(|| {
        thread::sleep(Duration::from_millis(700));
        kill(getpid(), Signal::SIGINT).unwrap();
    });

    let started = Instant::now();
    let outcome = run(sh_options("exec sleep 3"), &[0x1D, b'd']);
    signaller.join().unwrap();
    unsafe { sigaction(Signal::SIGINT, &original) }.unwrap();

    let report = &outcome.report;
    assert_eq!(report.metadata.outcome, SessionOutcome::Detached);
    assert_eq!(report.exit_code(), 130);
    assert!(started.elapsed() < Duration::from_millis(2500));
    assert_restored(&outcome);
}

#[test]
fn test_relay_failure_restores_terminal() {
    let _lock = lock();
    let mut saved = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    assert_eq!(unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut saved) }, 0);

    // With a descriptor limit of one, poll over several descriptors fails
    // with EINVAL once the session is relaying.
    let limiter = thread::spawn(move || {
        thread::sleep(Duration::from_millis(500));
        let tight = libc::rlimit {
            rlim_cur: 1,
            rlim_max: saved.rlim_max,
        };
        assert_eq!(unsafe { libc::setrlimit(libc::RLIMIT_NOFILE, &tight) }, 0);
    });

    let started = Instant::now();
    let outcome = run(sh_options("exec sleep 5"), b"");
    limiter.join().unwrap();
    assert_eq!(unsafe { libc::setrlimit(libc::RLIMIT_NOFILE, &saved) }, 0);

    let report = &outcome.report;
    assert_eq!(report.metadata.outcome, SessionOutcome::Killed);
    assert_eq!(report.exit_code(), 129);
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_restored(&outcome);
}
