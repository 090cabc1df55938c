//! Diagnostic logging setup.
//!
//! The recorder shares stderr with a raw-mode session, so the default level
//! is `warn` and a log file can take the output elsewhere.

use anyhow::{anyhow, Context};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use ttyscribe_core::LoggingSettings;

/// Build the filter: `RUST_LOG` wins, otherwise the configured level.
pub fn env_filter(settings: &LoggingSettings) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level))
}

/// Install the global subscriber.
pub fn init(settings: &LoggingSettings) -> anyhow::Result<()> {
    let filter = env_filter(settings);
    match &settings.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(|e| anyhow!("installing logger: {e}"))
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| anyhow!("installing logger: {e}")),
    }
}
