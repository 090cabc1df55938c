//! # ttyscribe
//!
//! Runs a command inside a pseudo-terminal, relays it to the user's terminal
//! and keeps a clean transcript of everything it printed.

use clap::Parser;
use ttyscribe::{execute, Cli, STATUS_PREFIX};

fn main() {
    let cli = Cli::parse();

    let code = match execute(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("{STATUS_PREFIX} error: {e:#}");
            1
        }
    };

    std::process::exit(code);
}
