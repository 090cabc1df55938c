//! # ttyscribe-clean
//!
//! Turns the raw bytes captured from a PTY into a readable transcript.
//!
//! The transform runs in two passes:
//!
//! 1. [`strip_controls`]: a single-pass scanner that maps carriage returns to
//!    newlines and deletes OSC, DCS/SOS/PM/APC and CSI sequences together
//!    with stray C0/C1 controls.
//! 2. [`normalize_layout`]: trims trailing spaces and tabs per line, collapses
//!    runs of blank lines and trims the whole text.
//!
//! Both passes are linear in the input and never backtrack, so adversarial
//! captures (thousands of unterminated `ESC P`) stay cheap. The result is
//! idempotent: cleaning an already clean transcript returns it unchanged.
//!
//! ## Architecture
//!
//! This is Layer 1 in the architecture. It has no runtime dependencies and
//! knows nothing about PTYs or sessions.
//!
//! ## Example
//!
//! ```
//! let raw = b"\x1b[31mHello\x1b[0m\r\nprogress 10%\rprogress 20%\r";
//! assert_eq!(
//!     ttyscribe_clean::clean(raw),
//!     "Hello\n\nprogress 10%\nprogress 20%"
//! );
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod layout;
pub mod scanner;

pub use layout::normalize_layout;
pub use scanner::strip_controls;

/// Clean raw captured bytes.
///
/// Invalid UTF-8 is replaced with U+FFFD before scanning.
pub fn clean(raw: &[u8]) -> String {
    clean_text(&String::from_utf8_lossy(raw))
}

/// Clean already-decoded text.
pub fn clean_text(text: &str) -> String {
    normalize_layout(&strip_controls(text))
}
