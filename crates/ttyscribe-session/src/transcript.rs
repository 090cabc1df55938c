//! Artifact paths and persistence of the transcript.

use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

use ttyscribe_core::{Error, Result};

use crate::multiplexer::SessionReport;

const DEFAULT_TAG: &str = "session";

/// Where a session's artifacts go.
///
/// All paths share one base; extensions are appended to it, so a dotted tag
/// such as `python3.11` is kept intact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptPaths {
    /// Common prefix of every artifact
    pub base: PathBuf,
}

impl TranscriptPaths {
    /// Resolve the base path and create its parent directories.
    ///
    /// With a `template`, the base is that strftime pattern expanded at
    /// `now`. Otherwise it is `<log_dir>/%Y%m%d_%H%M%S_<tag>`, with the tag
    /// taken from the first word of the command.
    pub fn resolve(
        template: Option<&str>,
        log_dir: &Path,
        argv: &[String],
        now: DateTime<Local>,
    ) -> Result<Self> {
        let base = match template {
            Some(template) => expand_home(&expand_template(template, now)?),
            None => log_dir.join(format!(
                "{}_{}",
                now.format("%Y%m%d_%H%M%S"),
                session_tag(argv)
            )),
        };
        let base = if base.is_absolute() {
            base
        } else {
            std::env::current_dir()?.join(base)
        };

        if let Some(parent) = base.parent() {
            fs::create_dir_all(parent)?;
        }
        debug!("Artifact base path: {}", base.display());
        Ok(Self { base })
    }

    /// `<base>.txt`, the clean transcript.
    pub fn transcript(&self) -> PathBuf {
        self.with_extension("txt")
    }

    /// `<base>.raw.txt`, the verbatim capture.
    pub fn raw(&self) -> PathBuf {
        self.with_extension("raw.txt")
    }

    /// `<base>.meta.json`, the session record.
    pub fn metadata(&self) -> PathBuf {
        self.with_extension("meta.json")
    }

    fn with_extension(&self, ext: &str) -> PathBuf {
        let mut path = self.base.clone().into_os_string();
        path.push(".");
        path.push(ext);
        PathBuf::from(path)
    }
}

/// Filename-safe tag from the first word of the command.
///
/// Whitespace becomes `_`, anything outside `[A-Za-z0-9._-]` is dropped and
/// an empty result falls back to `session`.
pub fn session_tag(argv: &[String]) -> String {
    let first = argv.first().map(|s| s.trim()).unwrap_or_default();
    let joined = first.split_whitespace().collect::<Vec<_>>().join("_");
    let tag: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    if tag.is_empty() {
        DEFAULT_TAG.to_string()
    } else {
        tag
    }
}

fn expand_template(template: &str, now: DateTime<Local>) -> Result<String> {
    let mut out = String::new();
    write!(out, "{}", now.format(template))
        .map_err(|_| Error::Template(template.to_string()))?;
    Ok(out)
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

/// Which files were written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// The transcript (or its placeholder), if anything could be written
    pub transcript: Option<PathBuf>,
    /// The raw capture, when requested and written
    pub raw: Option<PathBuf>,
}

/// Persists a finished session's transcript and, optionally, its raw capture.
#[derive(Debug, Clone)]
pub struct SessionArchive {
    paths: TranscriptPaths,
    keep_raw: bool,
}

impl SessionArchive {
    /// Create an archive rooted at `paths`.
    pub fn new(paths: TranscriptPaths, keep_raw: bool) -> Self {
        Self { paths, keep_raw }
    }

    /// Artifact paths.
    pub fn paths(&self) -> &TranscriptPaths {
        &self.paths
    }

    /// Write the artifacts. Failures are logged, never returned.
    ///
    /// If the transcript cannot be written, a placeholder naming the error
    /// is attempted in its place.
    pub fn persist(&self, report: &SessionReport) -> ArchiveSummary {
        let mut summary = ArchiveSummary::default();

        let transcript_path = self.paths.transcript();
        match write_text(&transcript_path, &report.transcript) {
            Ok(()) => summary.transcript = Some(transcript_path),
            Err(e) => {
                error!("Failed to write transcript {}: {}", transcript_path.display(), e);
                let placeholder = format!("[ttyscribe] transcript could not be written: {e}");
                match write_text(&transcript_path, &placeholder) {
                    Ok(()) => summary.transcript = Some(transcript_path),
                    Err(e) => error!("Failed to write placeholder transcript: {}", e),
                }
            }
        }

        if self.keep_raw {
            let raw_path = self.paths.raw();
            match fs::write(&raw_path, &report.raw) {
                Ok(()) => summary.raw = Some(raw_path),
                Err(e) => warn!("Failed to write raw capture {}: {}", raw_path.display(), e),
            }
        }

        summary
    }
}

/// Write `text` with a single trailing newline (none for empty text).
pub fn write_text(path: &Path, text: &str) -> std::io::Result<()> {
    let mut content = String::with_capacity(text.len() + 1);
    content.push_str(text);
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    fs::write(path, content)
}
