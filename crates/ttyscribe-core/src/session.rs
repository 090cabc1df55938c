//! Session identity and the metadata record produced at teardown.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Dimensions;

/// Unique identifier for a recorded session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for SessionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a session came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    /// The child closed its side of the PTY and was reaped
    Exited,
    /// The user detached with the escape sequence
    Detached,
    /// The user chose kill; the child received SIGTERM
    Killed,
    /// The shell could not be started (exit code 127)
    SpawnFailed,
}

impl SessionOutcome {
    /// Stable lowercase name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionOutcome::Exited => "exited",
            SessionOutcome::Detached => "detached",
            SessionOutcome::Killed => "killed",
            SessionOutcome::SpawnFailed => "spawn_failed",
        }
    }
}

impl std::fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything known about a finished session.
///
/// Built once, after the child has been reaped. Together with the cleaned
/// transcript this is the only thing handed to session sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Random session identifier
    pub id: SessionId,
    /// Optional user-supplied name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Full command line as given by the user
    pub command: String,
    /// When the child was spawned
    #[serde(with = "iso_millis")]
    pub started_at: DateTime<Local>,
    /// When the child was reaped
    #[serde(with = "iso_millis")]
    pub ended_at: DateTime<Local>,
    /// Child exit status, or 128 + signal number
    pub exit_code: i32,
    /// Number of bytes captured from the PTY
    pub bytes: u64,
    /// SHA-256 of the raw capture, lowercase hex
    pub digest: String,
    /// Wall-clock duration in seconds, millisecond resolution
    pub duration_secs: f64,
    /// End reason
    pub outcome: SessionOutcome,
    /// Terminal geometry at spawn time
    pub geometry: Dimensions,
}

/// ISO-8601 timestamps with local offset and millisecond precision.
mod iso_millis {
    use chrono::{DateTime, Local, SecondsFormat};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Local>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, false))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Local>, D::Error> {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Local))
            .map_err(serde::de::Error::custom)
    }
}
