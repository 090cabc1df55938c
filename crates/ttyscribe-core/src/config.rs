//! Configuration types for the recorder.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Recorder configuration loaded from a YAML file.
///
/// Every section is optional; missing keys take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct RecorderConfig {
    /// Relay loop settings
    pub session: SessionSettings,
    /// How the child command is launched
    pub shell: ShellSettings,
    /// Where artifacts are written
    pub output: OutputSettings,
    /// Diagnostic logging
    pub logging: LoggingSettings,
}

impl RecorderConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to the default struct.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: RecorderConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.session.idle_timeout_ms == 0 {
            return Err(Error::Config(
                "session.idle_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.session.idle_timeout_ms > u64::from(u16::MAX) {
            return Err(Error::Config(format!(
                "session.idle_timeout_ms must be <= {}",
                u16::MAX
            )));
        }

        if self.session.read_chunk_size == 0 {
            return Err(Error::Config(
                "session.read_chunk_size must be > 0".to_string(),
            ));
        }

        if self.shell.program.trim().is_empty() {
            return Err(Error::Config("shell.program cannot be empty".to_string()));
        }

        if let Some(template) = &self.output.template {
            if template.trim().is_empty() {
                return Err(Error::Config(
                    "output.template cannot be empty when set".to_string(),
                ));
            }
        }

        match self.logging.level.to_ascii_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" | "off" => {}
            other => {
                return Err(Error::Config(format!(
                    "logging.level '{other}' is not one of trace, debug, info, warn, error, off"
                )))
            }
        }

        Ok(())
    }
}

/// Relay loop settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionSettings {
    /// Upper bound on one poll wait, in milliseconds
    pub idle_timeout_ms: u64,
    /// Maximum bytes read from the PTY per iteration
    pub read_chunk_size: usize,
    /// Byte that opens the detach prompt (default Ctrl-], 0x1D)
    pub detach_byte: u8,
    /// Forward SIGINT/SIGTERM/SIGHUP received by the recorder to the child
    pub forward_signals: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle_timeout_ms: 250,
            read_chunk_size: 16384,
            detach_byte: 0x1D,
            forward_signals: true,
        }
    }
}

/// How the child command is launched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShellSettings {
    /// Shell executable
    pub program: String,
    /// Arguments placed before the command line
    pub args: Vec<String>,
    /// TERM override for the child (inherited when unset)
    pub term: Option<String>,
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            program: "/bin/bash".to_string(),
            args: vec!["-lc".to_string()],
            term: None,
        }
    }
}

/// Where artifacts are written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputSettings {
    /// Directory used by the default `%Y%m%d_%H%M%S_<tag>` base path
    pub log_dir: PathBuf,
    /// Explicit strftime template for the base path (replaces the default)
    pub template: Option<String>,
    /// Also write the raw capture to `<base>.raw.txt`
    pub keep_raw: bool,
    /// Write `<base>.meta.json`
    pub write_metadata: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            template: None,
            keep_raw: false,
            write_metadata: true,
        }
    }
}

/// Diagnostic logging.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter level used when RUST_LOG is unset
    pub level: String,
    /// Append logs to this file instead of stderr
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: None,
        }
    }
}
