//! # ttyscribe-core
//!
//! Core types for the ttyscribe session recorder.
//!
//! This crate contains the fundamental types with **no internal dependencies**
//! on other ttyscribe crates. It provides:
//!
//! - Terminal geometry (`Dimensions`)
//! - Session identity and metadata (`SessionId`, `SessionMetadata`, `SessionOutcome`)
//! - Recorder configuration loaded from YAML
//! - Error types
//!
//! ## Architecture
//!
//! This is Layer 0 in the architecture. The cleaner, the session crate and the
//! binary all depend on it, while it depends on none of them.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod geometry;
pub mod session;

// Re-export commonly used types
pub use config::{
    LoggingSettings, OutputSettings, RecorderConfig, SessionSettings, ShellSettings,
};
pub use error::{Error, Result};
pub use geometry::Dimensions;
pub use session::{SessionId, SessionMetadata, SessionOutcome};
