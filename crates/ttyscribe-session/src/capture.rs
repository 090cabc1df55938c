//! Captured child output.

use sha2::{Digest, Sha256};

/// Append-only capture of everything the child wrote, with a running digest.
#[derive(Default)]
pub struct CapturedStream {
    bytes: Vec<u8>,
    hasher: Sha256,
}

impl std::fmt::Debug for CapturedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturedStream")
            .field("len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

/// A finished capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    /// Raw bytes, exactly as read from the PTY
    pub bytes: Vec<u8>,
    /// SHA-256 of `bytes`, lowercase hex
    pub digest: String,
}

impl CapturedStream {
    /// Create an empty capture.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk.
    pub fn append(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
        self.hasher.update(chunk);
    }

    /// Bytes captured so far.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether nothing has been captured.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Freeze the capture.
    pub fn finish(self) -> Capture {
        Capture {
            digest: hex::encode(self.hasher.finalize()),
            bytes: self.bytes,
        }
    }
}
