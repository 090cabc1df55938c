//! Session record assembly.

use chrono::{DateTime, Local};
use std::time::Instant;

use ttyscribe_core::{Dimensions, SessionId, SessionMetadata, SessionOutcome};

use crate::capture::Capture;

/// Started when the child is spawned; consumed exactly once to build the
/// session's metadata.
#[derive(Debug)]
pub struct SessionClock {
    id: SessionId,
    name: Option<String>,
    command: String,
    geometry: Dimensions,
    started_at: DateTime<Local>,
    started: Instant,
}

impl SessionClock {
    /// Start timing a session.
    pub fn start(name: Option<String>, command: impl Into<String>, geometry: Dimensions) -> Self {
        Self {
            id: SessionId::new(),
            name,
            command: command.into(),
            geometry,
            started_at: Local::now(),
            started: Instant::now(),
        }
    }

    /// The session's id.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Stop the clock and assemble the record.
    pub fn finish(self, exit_code: i32, outcome: SessionOutcome, capture: &Capture) -> SessionMetadata {
        let elapsed = self.started.elapsed().as_secs_f64();
        // Wall clock may step backwards; the record must not.
        let ended_at = Local::now().max(self.started_at);

        SessionMetadata {
            id: self.id,
            name: self.name,
            command: self.command,
            started_at: self.started_at,
            ended_at,
            exit_code,
            bytes: capture.bytes.len() as u64,
            digest: capture.digest.clone(),
            duration_secs: round_millis(elapsed),
            outcome,
            geometry: self.geometry,
        }
    }
}

fn round_millis(secs: f64) -> f64 {
    (secs * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CapturedStream;

    #[test]
    fn test_round_millis() {
        assert_eq!(round_millis(1.23456), 1.235);
        assert_eq!(round_millis(0.0004), 0.0);
        assert_eq!(round_millis(2.0), 2.0);
    }

    #[test]
    fn test_finish_builds_metadata() {
        let clock = SessionClock::start(
            Some("build".to_string()),
            "make -j8",
            Dimensions::new(40, 100),
        );
        let id = clock.id();

        let mut stream = CapturedStream::new();
        stream.append(b"ok\r\n");
        let capture = stream.finish();

        let meta = clock.finish(2, SessionOutcome::Exited, &capture);
        assert_eq!(meta.id, id);
        assert_eq!(meta.name.as_deref(), Some("build"));
        assert_eq!(meta.command, "make -j8");
        assert_eq!(meta.exit_code, 2);
        assert_eq!(meta.bytes, 4);
        assert_eq!(meta.digest, capture.digest);
        assert_eq!(meta.outcome, SessionOutcome::Exited);
        assert_eq!(meta.geometry, Dimensions::new(40, 100));
        assert!(meta.ended_at >= meta.started_at);
        assert!(meta.duration_secs >= 0.0);
    }

    #[test]
    fn test_duration_has_millisecond_resolution() {
        let clock = SessionClock::start(None, "true", Dimensions::default());
        std::thread::sleep(std::time::Duration::from_millis(20));
        let meta = clock.finish(0, SessionOutcome::Exited, &CapturedStream::new().finish());
        assert!(meta.duration_secs >= 0.02);
        let scaled = meta.duration_secs * 1000.0;
        assert!((scaled - scaled.round()).abs() < 1e-6);
    }
}
