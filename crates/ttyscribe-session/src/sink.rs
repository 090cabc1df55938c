//! Collaborators that receive a finished session.
//!
//! A sink gets the cleaned transcript and the session record once the child
//! has been reaped and the terminal restored. Sink failures are logged and
//! never change the recorder's exit code.

use anyhow::Context;
use std::path::PathBuf;
use tracing::{debug, warn};

use ttyscribe_core::SessionMetadata;

/// Receives finished sessions.
pub trait SessionSink {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Handle one finished session.
    fn record_session(&self, transcript: &str, metadata: &SessionMetadata) -> anyhow::Result<()>;
}

/// Hand a finished session to every sink, in order.
///
/// Returns how many sinks succeeded.
pub fn notify_sinks(sinks: &[Box<dyn SessionSink>], transcript: &str, metadata: &SessionMetadata) -> usize {
    let mut delivered = 0;
    for sink in sinks {
        match sink.record_session(transcript, metadata) {
            Ok(()) => {
                debug!("Session {} delivered to {}", metadata.id, sink.name());
                delivered += 1;
            }
            Err(e) => warn!("Sink {} failed for session {}: {:#}", sink.name(), metadata.id, e),
        }
    }
    delivered
}

/// Writes the session record as pretty JSON next to the transcript.
#[derive(Debug, Clone)]
pub struct MetadataFileSink {
    path: PathBuf,
}

impl MetadataFileSink {
    /// Write to `path` (normally `<base>.meta.json`).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Target file.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl SessionSink for MetadataFileSink {
    fn name(&self) -> &str {
        "metadata-file"
    }

    fn record_session(&self, _transcript: &str, metadata: &SessionMetadata) -> anyhow::Result<()> {
        let mut json = serde_json::to_string_pretty(metadata).context("serializing session metadata")?;
        json.push('\n');
        std::fs::write(&self.path, json)
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }
}
