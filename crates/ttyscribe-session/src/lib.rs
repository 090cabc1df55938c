//! # ttyscribe-session
//!
//! Recording of one interactive terminal session.
//!
//! This crate provides:
//! - PTY spawn, I/O, resize and reaping
//! - Raw-mode guard and geometry queries for the user's terminal
//! - Signal relay and the detach/kill escape
//! - The session multiplexer tying those together
//! - Artifact paths, transcript persistence and session sinks
//!
//! ## Architecture
//!
//! This is Layer 2 in the architecture - it depends on ttyscribe-core for
//! types and on ttyscribe-clean to turn the capture into a transcript.
//! Unix only.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod capture;
pub mod detach;
pub mod io;
pub mod multiplexer;
pub mod pty;
pub mod record;
pub mod signals;
pub mod sink;
pub mod terminal;
pub mod transcript;

// Re-export commonly used types
pub use capture::{Capture, CapturedStream};
pub use detach::{DetachState, InputAction, DETACH_PROMPT};
pub use multiplexer::{
    SessionMultiplexer, SessionOptions, SessionPhase, SessionReport, SPAWN_FAILED_EXIT_CODE,
};
pub use pty::PtySession;
pub use record::SessionClock;
pub use signals::{SessionEvent, SignalRelay};
pub use sink::{notify_sinks, MetadataFileSink, SessionSink};
pub use terminal::{query_geometry, RawModeGuard, TerminalIo};
pub use transcript::{ArchiveSummary, SessionArchive, TranscriptPaths};
