//! # ttyscribe
//!
//! Command line front end of the recorder.
//!
//! ## Overview
//!
//! - `ttyscribe run [options] -- <command...>` records one session and
//!   writes `<base>.txt` (plus `<base>.meta.json` and, on request,
//!   `<base>.raw.txt`)
//! - `ttyscribe clean <raw> [-o file]` re-cleans an existing raw capture
//!
//! ## Architecture
//!
//! This is Layer 3 - the binary that ties together:
//! - ttyscribe-core: Core types and configuration
//! - ttyscribe-clean: Escape sequence cleaning
//! - ttyscribe-session: PTY session recording

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod app;
pub mod cli;
pub mod logging;
pub mod sinks;

// Re-export commonly used types
pub use app::{execute, STATUS_PREFIX};
pub use cli::{CleanArgs, Cli, Command, RunArgs};
pub use sinks::LogSink;
