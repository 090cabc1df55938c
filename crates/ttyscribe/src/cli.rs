//! Command line interface.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use ttyscribe_core::{RecorderConfig, Result};

/// Record interactive terminal sessions and keep a clean transcript.
#[derive(Parser, Debug)]
#[command(name = "ttyscribe")]
#[command(about = "Run a command in a PTY, relay it to your terminal and keep a clean transcript")]
#[command(version)]
pub struct Cli {
    /// What to do
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Record a session of COMMAND
    Run(RunArgs),
    /// Re-clean an existing raw capture
    Clean(CleanArgs),
}

/// Arguments of `ttyscribe run`.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Free-form session label stored in the metadata
    #[arg(short, long)]
    pub name: Option<String>,

    /// strftime template for the artifact base path (e.g. ~/logs/%Y%m%d_%H%M%S_vim)
    #[arg(short, long, value_name = "TEMPLATE")]
    pub log: Option<String>,

    /// Upper bound on one relay wait, in milliseconds
    #[arg(long, value_name = "MS")]
    pub idle_flush_ms: Option<u64>,

    /// Also write the raw capture to <base>.raw.txt
    #[arg(long)]
    pub keep_raw: bool,

    /// Do not write <base>.meta.json
    #[arg(long)]
    pub no_metadata: bool,

    /// YAML configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Command to record, given after `--`
    #[arg(last = true, required = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

impl RunArgs {
    /// Load the configuration file (or defaults) and apply the flags on top.
    pub fn resolve_config(&self) -> Result<RecorderConfig> {
        let mut config = match &self.config {
            Some(path) => RecorderConfig::from_file(path)?,
            None => RecorderConfig::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Override `config` with whatever was given on the command line.
    pub fn apply(&self, config: &mut RecorderConfig) {
        if let Some(template) = &self.log {
            config.output.template = Some(template.clone());
        }
        if let Some(ms) = self.idle_flush_ms {
            config.session.idle_timeout_ms = ms;
        }
        if self.keep_raw {
            config.output.keep_raw = true;
        }
        if self.no_metadata {
            config.output.write_metadata = false;
        }
    }
}

/// Arguments of `ttyscribe clean`.
#[derive(Args, Debug, Clone)]
pub struct CleanArgs {
    /// Raw capture to clean (e.g. a <base>.raw.txt file)
    #[arg(value_name = "RAW")]
    pub raw: PathBuf,

    /// Write the transcript here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}
