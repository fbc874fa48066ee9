//! artiscope - dependency confusion reconnaissance for Artifactory.
//!
//! CLI entry point.

use artiscope::{app, Config, ConsoleOutput};
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    // Set up logging
    let filter = if config.verbose {
        EnvFilter::new("artiscope=debug,info")
    } else {
        EnvFilter::new("artiscope=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let console = ConsoleOutput::new(config.verbose, config.json);
    console.print_progress(&format!("Running {}", config.command.name()));

    let outcome = tokio::select! {
        outcome = app::run(&config, &console) => outcome,
        _ = tokio::signal::ctrl_c() => {
            // Dropping the command future cancels every probe in flight
            warn!("Interrupted");
            return ExitCode::from(130);
        }
    };

    let printed = outcome.and_then(|report| console.print_report(config.command.name(), &report));
    match printed {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{} failed: {:?}", config.command.name(), e);
            console.print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}
