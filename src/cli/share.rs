//! Share command - publish a directory as an onion service
//!
//! Launches Tor, waits until the hidden service hostname appears, prints
//! the URL of every shared file, then serves the directory until killed.

use super::{launch_daemon, warm_up, Cli, ShareArgs};
use crate::config::Config;
use crate::server::FileServer;
use crate::tor::BootstrapWaiter;
use crate::transfer::{advertised_urls, base_url, Exclusions, FileLister};
use anyhow::{Context, Result};
use tracing::{info, warn};

/// Run the share command
pub async fn run_share(cli: &Cli, args: &ShareArgs, mut config: Config) -> Result<()> {
    apply_overrides(&mut config, args)?;

    let _daemon = launch_daemon(cli, &config)?;

    warm_up(&config.daemon).await;

    let address = BootstrapWaiter::from_config(&config.bootstrap, &cli.workdir)
        .await_address()
        .await
        .context("Tor did not publish the onion service")?;

    let exclusions = Exclusions::from_config(&config);
    let port = config.server.advertised_port;

    println!();
    println!("Sharing at {}", base_url(address.as_str(), port));
    match FileLister::new(exclusions.clone()).list(&config.server.root) {
        Ok(names) if names.is_empty() => {
            println!("   (no files in {})", config.server.root.display());
        },
        Ok(names) => {
            for url in advertised_urls(address.as_str(), port, &names) {
                println!("   {}", url);
            }
        },
        Err(e) => warn!(
            "Failed to list {}: {}",
            config.server.root.display(),
            e
        ),
    }
    println!();

    let server = FileServer::new(&config.server, exclusions)?;
    info!("Local server on http://{}/", server.listen_addr());

    server.run().await?;
    Ok(())
}

/// Fold command-line flags into the loaded config
fn apply_overrides(config: &mut Config, args: &ShareArgs) -> Result<()> {
    if let Some(root) = &args.root {
        config.server.root = root.clone();
    }

    if let Some(port) = args.port {
        let mut addr = config
            .server
            .socket_addr()
            .with_context(|| format!("Invalid listen address: {}", config.server.listen_addr))?;
        addr.set_port(port);
        config.server.listen_addr = addr.to_string();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_port_override_keeps_host() {
        let mut config = Config::default();
        let args = ShareArgs {
            port: Some(9000),
            root: Some(PathBuf::from("/srv/drop")),
        };

        apply_overrides(&mut config, &args).unwrap();
        assert_eq!(config.server.listen_addr, "0.0.0.0:9000");
        assert_eq!(config.server.root, PathBuf::from("/srv/drop"));
    }

    #[test]
    fn test_no_overrides() {
        let mut config = Config::default();
        let args = ShareArgs {
            port: None,
            root: None,
        };

        apply_overrides(&mut config, &args).unwrap();
        assert_eq!(config.server.listen_addr, "0.0.0.0:8085");
        assert_eq!(config.server.root, PathBuf::from("."));
    }
}
