//! Detach/kill escape handling for keystrokes.

/// Prompt shown when the detach trigger is pressed.
pub const DETACH_PROMPT: &[u8] = b"\r\n[ttyscribe] (d)etach  (k)ill  (any other key) continue\r\n";

/// Whether the previous keystroke was the detach trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetachState {
    /// Keystrokes go to the child
    #[default]
    Normal,
    /// The next keystroke picks detach, kill or continue
    AwaitingDetachChoice,
}

/// What the relay loop should do with one keystroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    /// Write this byte to the child
    Forward(u8),
    /// Show [`DETACH_PROMPT`] and swallow the trigger
    ShowPrompt,
    /// End the session, leaving the child alone
    Detach,
    /// SIGTERM the child, then end the session
    Kill,
}

impl DetachState {
    /// Advance on one input byte.
    pub fn on_byte(&mut self, byte: u8, trigger: u8) -> InputAction {
        match *self {
            DetachState::AwaitingDetachChoice => {
                *self = DetachState::Normal;
                match byte {
                    b'd' | b'D' => InputAction::Detach,
                    b'k' | b'K' => InputAction::Kill,
                    _ => InputAction::Forward(byte),
                }
            }
            DetachState::Normal if byte == trigger => {
                *self = DetachState::AwaitingDetachChoice;
                InputAction::ShowPrompt
            }
            DetachState::Normal => InputAction::Forward(byte),
        }
    }
}
