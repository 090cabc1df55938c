//! Single-pass control sequence scanner.
//!
//! The scanner is a small state machine fed one `char` at a time. It never
//! looks ahead and never revisits input: every sequence is either dropped
//! when its terminator arrives or, for a broken CSI, flushed back as text.

const ESC: char = '\x1b';
const BEL: char = '\x07';

/// Where the scanner is relative to an escape sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Ordinary text
    Ground,
    /// Saw ESC, waiting for the introducer
    Escape,
    /// Inside `ESC [` collecting parameter and intermediate bytes
    Csi,
    /// Inside `ESC ]`, ended by BEL or `ESC \`
    Osc,
    /// Saw ESC inside an OSC body
    OscEscape,
    /// Inside DCS/SOS/PM/APC, ended only by `ESC \`
    Str,
    /// Saw ESC inside a DCS/SOS/PM/APC body
    StrEscape,
}

/// Streaming scanner implementing steps 1-7 of the cleaning pipeline.
#[derive(Debug)]
pub struct Scanner {
    state: State,
    /// Parameter/intermediate bytes of the CSI being collected
    csi: String,
    /// Whether an intermediate byte has been seen in the current CSI
    csi_intermediate: bool,
    out: String,
}

impl Scanner {
    /// Create a scanner with room for `capacity` bytes of output.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: State::Ground,
            csi: String::new(),
            csi_intermediate: false,
            out: String::with_capacity(capacity),
        }
    }

    /// Feed a chunk of text.
    pub fn feed(&mut self, text: &str) {
        for c in text.chars() {
            self.step(c);
        }
    }

    /// Finish scanning. A sequence still open at this point is discarded.
    pub fn finish(self) -> String {
        self.out
    }

    fn step(&mut self, c: char) {
        match self.state {
            State::Ground => self.ground(c),
            State::Escape => self.escape(c),
            State::Csi => self.csi(c),
            State::Osc => match c {
                BEL => self.state = State::Ground,
                ESC => self.state = State::OscEscape,
                _ => {}
            },
            State::OscEscape => {
                if c == '\\' {
                    self.state = State::Ground;
                } else {
                    // Not ST: the OSC is abandoned and this ESC opens a new sequence.
                    self.state = State::Escape;
                    self.escape(c);
                }
            }
            State::Str => {
                if c == ESC {
                    self.state = State::StrEscape;
                }
            }
            State::StrEscape => match c {
                '\\' => self.state = State::Ground,
                ESC => {}
                _ => self.state = State::Str,
            },
        }
    }

    fn ground(&mut self, c: char) {
        match c {
            ESC => self.state = State::Escape,
            '\r' => self.out.push('\n'),
            _ => push_visible(&mut self.out, c),
        }
    }

    fn escape(&mut self, c: char) {
        match c {
            ']' => self.state = State::Osc,
            'P' | 'X' | '^' | '_' => self.state = State::Str,
            '[' => {
                self.csi.clear();
                self.csi_intermediate = false;
                self.state = State::Csi;
            }
            ESC => {}
            _ => {
                // Lone ESC: the ESC itself is a control and goes away.
                self.state = State::Ground;
                self.ground(c);
            }
        }
    }

    fn csi(&mut self, c: char) {
        match c {
            '0'..='?' if !self.csi_intermediate => self.csi.push(c),
            ' '..='/' => {
                self.csi_intermediate = true;
                self.csi.push(c);
            }
            '@'..='~' => self.state = State::Ground,
            _ => {
                // Malformed: only the ESC is lost, the rest is text again.
                self.state = State::Ground;
                self.out.push('[');
                let collected = std::mem::take(&mut self.csi);
                self.out.push_str(&collected);
                self.ground(c);
            }
        }
    }
}

/// Append `c` unless it is a control character.
///
/// LF and TAB survive, NBSP becomes a plain space.
fn push_visible(out: &mut String, c: char) {
    match c {
        '\n' | '\t' => out.push(c),
        '\u{00}'..='\u{1f}' | '\u{7f}' => {}
        '\u{80}'..='\u{9f}' => {}
        '\u{a0}' => out.push(' '),
        _ => out.push(c),
    }
}

/// Remove control sequences and control characters from `text`.
///
/// Carriage returns become newlines. Layout is left untouched; see
/// [`normalize_layout`](crate::normalize_layout).
pub fn strip_controls(text: &str) -> String {
    let mut scanner = Scanner::with_capacity(text.len());
    scanner.feed(text);
    scanner.finish()
}
