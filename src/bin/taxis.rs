//! Taxis CLI Binary
//!
//! Command-line interface for the filesystem tag index.

use clap::Parser;
use std::io::Write;
use std::process;
use taxis::logging::init_logging;
use taxis::tooling::cli::{logging_config, Cli, CliContext};

fn main() {
    let cli = Cli::parse();

    let context = match CliContext::load(&cli) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = init_logging(Some(&logging_config(&cli, context.config()))) {
        eprintln!("Error initializing logging: {}", e);
        process::exit(1);
    }

    match context.execute(&cli.command) {
        Ok(output) => {
            let mut stdout = std::io::stdout().lock();
            // A closed pipe (e.g. `| head`) is not an error.
            if stdout.write_all(output.stdout.as_bytes()).is_err() || stdout.flush().is_err() {
                process::exit(output.exit_code);
            }
            if let Some(notice) = output.stderr {
                eprintln!("{}", notice);
            }
            process::exit(output.exit_code);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
