//! `engram` — command-line surface for the Access Store, Extractor,
//! Reconsolidation Engine, and Mirror Analyzer.
//!
//! Every subcommand opens its stores under `--data-dir` (default
//! `.engram`), reads `--config` (default `<data-dir>/engram.toml`,
//! written with defaults on first use), and prints JSON to stdout
//! except the Mirror's human-oriented text report.

mod commands;
mod output;

use clap::Parser;
use commands::Cli;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let data_dir = cli.data_dir.clone().unwrap_or_else(|| PathBuf::from(".engram"));
    let config_path = cli.config.clone().unwrap_or_else(|| data_dir.join(engram_core::config::CONFIG_FILE_NAME));

    match commands::run(cli.command, &data_dir, &config_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            println!("{}", serde_json::json!({ "error": err.to_string() }));
            // A missing dependency (e.g. no sessions directory yet) is a
            // recoverable, structured no-op per the error taxonomy, not a
            // process failure.
            match err.downcast_ref::<engram_core::EngramError>() {
                Some(engram_core::EngramError::MissingDependency(_)) => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            }
        }
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
