//! Fetch command - download one file through Tor

use super::{launch_daemon, prompt, warm_up, Cli, FetchArgs};
use crate::config::Config;
use crate::transfer::Downloader;
use anyhow::{bail, Result};
use tracing::info;

/// Run the fetch command
pub async fn run_fetch(cli: &Cli, args: &FetchArgs, mut config: Config) -> Result<()> {
    if let Some(dir) = &args.output_dir {
        config.download.output_dir = dir.clone();
    }

    let _daemon = launch_daemon(cli, &config)?;

    // No readiness signal on this side, only a fixed delay
    warm_up(&config.daemon).await;

    let url = match &args.url {
        Some(url) => url.clone(),
        None => prompt::read_line("Enter the URL to download: ").await?,
    };
    if url.is_empty() {
        bail!("No URL given");
    }

    let downloader = Downloader::new(&config.download)?;
    let task = downloader.download(&url).await?;

    info!(
        "File downloaded successfully as: {}",
        task.destination.display()
    );
    println!(
        "Saved {} ({} bytes)",
        task.destination.display(),
        task.transferred
    );

    if !args.no_pause {
        prompt::pause("Press enter to exit...").await?;
    }
    Ok(())
}
