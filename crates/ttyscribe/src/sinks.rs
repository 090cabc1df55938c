//! Sinks built into the binary.

use tracing::info;

use ttyscribe_core::{RecorderConfig, SessionMetadata};
use ttyscribe_session::{MetadataFileSink, SessionSink, TranscriptPaths};

/// Logs a one-line summary of every finished session.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl SessionSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn record_session(&self, transcript: &str, metadata: &SessionMetadata) -> anyhow::Result<()> {
        info!(
            "Session {} ({}) ended: {} with code {} after {:.3}s, {} bytes captured, {} transcript lines",
            metadata.id,
            metadata.command,
            metadata.outcome,
            metadata.exit_code,
            metadata.duration_secs,
            metadata.bytes,
            transcript.lines().count()
        );
        Ok(())
    }
}

/// The sinks a run notifies, in order.
pub fn configured_sinks(config: &RecorderConfig, paths: &TranscriptPaths) -> Vec<Box<dyn SessionSink>> {
    let mut sinks: Vec<Box<dyn SessionSink>> = Vec::new();
    if config.output.write_metadata {
        sinks.push(Box::new(MetadataFileSink::new(paths.metadata())));
    }
    sinks.push(Box::new(LogSink));
    sinks
}
