//! Subcommand implementations.

use anyhow::Context;
use chrono::Local;
use std::fs;
use std::io::Write;
use tracing::{debug, info};

use ttyscribe_core::LoggingSettings;
use ttyscribe_session::transcript::write_text;
use ttyscribe_session::{
    notify_sinks, SessionArchive, SessionMultiplexer, SessionOptions, TerminalIo, TranscriptPaths,
};

use crate::cli::{CleanArgs, Cli, Command, RunArgs};
use crate::{logging, sinks};

/// Prefix of every status line the recorder prints.
pub const STATUS_PREFIX: &str = "[ttyscribe]";

/// Run the parsed command line and return the process exit code.
pub fn execute(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Command::Run(args) => run_session(&args),
        Command::Clean(args) => {
            logging::init(&LoggingSettings::default())?;
            clean_file(&args)?;
            Ok(0)
        }
    }
}

/// Record one session on the process's own terminal.
///
/// The exit code mirrors the child: its status, 128+signal, or 127 when it
/// could not be started.
pub fn run_session(args: &RunArgs) -> anyhow::Result<i32> {
    let config = args.resolve_config().context("loading configuration")?;
    logging::init(&config.logging)?;
    debug!("Effective configuration: {:?}", config);

    // Resolved before the session so a bad template fails without side effects.
    let paths = TranscriptPaths::resolve(
        config.output.template.as_deref(),
        &config.output.log_dir,
        &args.command,
        Local::now(),
    )
    .context("resolving transcript path")?;

    let mut options = SessionOptions::new(args.command.clone());
    options.name = args.name.clone();
    options.shell = config.shell.clone();
    options.session = config.session.clone();

    info!("Recording `{}` to {}", options.command_line(), paths.transcript().display());
    let report = SessionMultiplexer::new(options, TerminalIo::stdio()).run()?;

    let archive = SessionArchive::new(paths.clone(), config.output.keep_raw);
    let summary = archive.persist(&report);

    let sinks = sinks::configured_sinks(&config, &paths);
    let delivered = notify_sinks(&sinks, &report.transcript, &report.metadata);
    debug!("{} of {} sinks accepted the session", delivered, sinks.len());

    match &summary.transcript {
        Some(path) => eprintln!("{STATUS_PREFIX} transcript: {}", path.display()),
        None => eprintln!("{STATUS_PREFIX} transcript could not be saved"),
    }
    if let Some(raw) = &summary.raw {
        eprintln!("{STATUS_PREFIX} raw capture: {}", raw.display());
    }

    Ok(report.exit_code())
}

/// Clean an existing raw capture to stdout or a file.
pub fn clean_file(args: &CleanArgs) -> anyhow::Result<()> {
    let raw = fs::read(&args.raw).with_context(|| format!("reading {}", args.raw.display()))?;
    let transcript = ttyscribe_clean::clean(&raw);
    debug!("Cleaned {} bytes into {} chars", raw.len(), transcript.len());

    match &args.output {
        Some(path) => write_text(path, &transcript)
            .with_context(|| format!("writing {}", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(transcript.as_bytes())?;
            if !transcript.is_empty() {
                stdout.write_all(b"\n")?;
            }
            stdout.flush()?;
        }
    }
    Ok(())
}
