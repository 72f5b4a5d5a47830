//! Command-line interface for oniondrop
//!
//! Provides two commands:
//! - `share` - Publish a directory behind an onion service
//! - `fetch` - Download one file from a peer's onion service
//!
//! Both extract and run the bundled Tor daemon for the duration of the run.

mod fetch;
mod prompt;
mod share;

pub use fetch::run_fetch;
pub use share::run_share;

use crate::config::{validate_against_torrc, Config, DaemonConfig};
use crate::tor::{ArtifactBundle, DaemonGuard, DaemonSupervisor, TorrcSummary};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// oniondrop - Share a file over Tor without a server
#[derive(Parser, Debug)]
#[command(name = "oniondrop")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory the Tor daemon is extracted to and runs in
    #[arg(short, long, global = true, default_value = ".")]
    pub workdir: PathBuf,

    /// Read the Tor executable from this path instead of the bundled one
    #[arg(long, global = true)]
    pub daemon_binary: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Publish a directory as an onion service
    Share(ShareArgs),

    /// Download a file from an onion service
    Fetch(FetchArgs),
}

/// Arguments for share command
#[derive(Parser, Debug)]
pub struct ShareArgs {
    /// Local port the file server listens on
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory to share
    #[arg(long)]
    pub root: Option<PathBuf>,
}

/// Arguments for fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// URL of the file (prompted for when omitted)
    pub url: Option<String>,

    /// Directory the file is saved to
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Exit right after the download instead of waiting for enter
    #[arg(long, default_value_t = false)]
    pub no_pause: bool,
}

/// Parse command line arguments
pub fn parse() -> Cli {
    Cli::parse()
}

/// Extract and start the daemon; the guard must outlive the run
fn launch_daemon(cli: &Cli, config: &Config) -> Result<DaemonGuard> {
    let binary = cli
        .daemon_binary
        .as_deref()
        .or(config.daemon.binary_path.as_deref());
    let bundle = ArtifactBundle::standard(binary);

    check_daemon_config(&bundle, config)?;

    let supervisor = DaemonSupervisor::from_config(bundle, &config.daemon, &cli.workdir);
    if let Err(e) = supervisor.ensure_hidden_service_dir(&config.bootstrap.hidden_service_dir) {
        warn!("{}", e);
    }

    info!("Launching Tor in {}", workdir_display(&cli.workdir));
    Ok(supervisor.launch())
}

/// Fixed delay giving a freshly launched daemon time to start
async fn warm_up(daemon: &DaemonConfig) {
    info!("Giving Tor {}s to start", daemon.warmup().as_secs());
    tokio::time::sleep(daemon.warmup()).await;
}

/// The daemon config must publish where we poll and listen where we dial
fn check_daemon_config(bundle: &ArtifactBundle, config: &Config) -> Result<()> {
    let torrc = bundle
        .config
        .read()
        .context("Failed to read bundled daemon config")?;
    let summary = TorrcSummary::parse(&torrc);

    validate_against_torrc(config, &summary)?;

    if let Some(port) = config.server.socket_addr().map(|addr| addr.port()) {
        if !summary.forwards_to(port) {
            warn!(
                "Daemon config does not forward the onion service to port {}; peers will not reach the server",
                port
            );
        }
    }
    Ok(())
}

fn workdir_display(path: &Path) -> String {
    std::path::absolute(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_warm_up_waits_configured_delay() {
        let daemon = DaemonConfig {
            warmup_secs: 1,
            ..DaemonConfig::default()
        };

        let started = Instant::now();
        warm_up(&daemon).await;
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[test]
    fn test_bundled_config_passes_check() {
        let bundle = ArtifactBundle::standard(Some(Path::new("/nonexistent/tor")));
        check_daemon_config(&bundle, &Config::default()).unwrap();
    }
}
