//! Binary entry point for tracker-migrate.
//!
//! Exit codes: `0` when every item was created or already mapped, `1` when
//! some items failed or were skipped, `2` when the run aborted before any
//! item was created.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for errors raised before logging is up
#![allow(clippy::print_stderr)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracker_migrate::config::MigrateConfig;
use tracker_migrate::observability;
use tracker_migrate::services::{MigrationReport, run_pipeline};
use tracker_migrate::{Error, JiraClient, RetryingTracker};

/// Migrate an exported Epics/Items directory into an issue tracker.
#[derive(Parser)]
#[command(name = "tracker-migrate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Root of the export (contains `Epics/` and `Items/`).
    root: PathBuf,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

const EXIT_PARTIAL: u8 = 1;
const EXIT_FATAL: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match MigrateConfig::load(cli.config.as_deref()).and_then(|c| {
        c.validate()?;
        Ok(c)
    }) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::from(EXIT_FATAL);
        },
    };

    let observability = match observability::init(&config.logging, cli.verbose) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            return ExitCode::from(EXIT_FATAL);
        },
    };

    let code = run(&cli, &config);
    tracing::info!(log_file = %observability.log_file().display(), "Run log written");
    code
}

fn run(cli: &Cli, config: &MigrateConfig) -> ExitCode {
    let client = match JiraClient::from_settings(&config.tracker) {
        Ok(client) => RetryingTracker::new(client, config.retry),
        Err(e) => return fatal(&e),
    };

    ExitCode::from(exit_code(&run_pipeline(&cli.root, config, client)))
}

/// Any pipeline error aborted the run before the first remote call.
fn exit_code(result: &tracker_migrate::Result<MigrationReport>) -> u8 {
    match result {
        Ok(report) if report.is_success() => 0,
        Ok(_) => EXIT_PARTIAL,
        Err(e) => {
            tracing::error!(code = e.code(), error = %e, "Migration aborted before creating issues");
            EXIT_FATAL
        },
    }
}

fn fatal(err: &Error) -> ExitCode {
    tracing::error!(code = err.code(), error = %err, "Migration aborted before creating issues");
    ExitCode::from(EXIT_FATAL)
}
