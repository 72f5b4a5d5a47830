//! oniondrop - Share a file over Tor without a server
//!
//! # Usage
//!
//! ```bash
//! # Publish the current directory
//! oniondrop share
//!
//! # Publish another directory on another local port
//! oniondrop share --root ~/outbox --port 9000
//!
//! # Fetch a file (prompts for the URL when omitted)
//! oniondrop fetch http://<address>.onion/report.pdf
//! ```
//!
//! The Tor daemon is extracted into the working directory, run for the
//! lifetime of the command and removed again on exit.

use anyhow::Result;
use oniondrop::cli::{self, Commands};
use oniondrop::{config, logging};
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = cli::parse();

    logging::init(cli.verbose);
    info!("oniondrop v{} starting", oniondrop::VERSION);

    // The daemon guard is dropped inside run, before the exit code is chosen
    report(run(&cli).await)
}

/// Log a fatal error once and turn the outcome into the process status
fn report(result: Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: &cli::Cli) -> Result<()> {
    let config = config::load(cli.config.as_deref())?;

    match &cli.command {
        Commands::Share(args) => cli::run_share(cli, args, config).await,
        Commands::Fetch(args) => cli::run_fetch(cli, args, config).await,
    }
}
