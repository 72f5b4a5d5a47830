//! Configuration validation
//!
//! Fail-fast validation of configuration invariants.

use super::Config;
use crate::tor::torrc::TorrcSummary;
use anyhow::{bail, Result};
use std::path::Path;

/// Validate configuration invariants
pub fn validate(config: &Config) -> Result<()> {
    validate_daemon(config)?;
    validate_bootstrap(config)?;
    validate_server(config)?;
    validate_download(config)?;
    Ok(())
}

/// Check that the daemon config writes where we poll and listens where we dial
pub fn validate_against_torrc(config: &Config, torrc: &TorrcSummary) -> Result<()> {
    match torrc.socks_port {
        Some(port) if Some(port) == config.download.socks_port() => {},
        Some(port) => bail!(
            "daemon SocksPort {} does not match download.socks_proxy {}",
            port,
            config.download.socks_proxy
        ),
        None => bail!("daemon config has no SocksPort"),
    }

    match torrc.hidden_service_dir.as_deref() {
        Some(dir) if Path::new(dir) == Path::new(&config.bootstrap.hidden_service_dir) => {},
        Some(dir) => bail!(
            "daemon HiddenServiceDir {} does not match bootstrap.hidden_service_dir {}",
            dir,
            config.bootstrap.hidden_service_dir
        ),
        None => bail!("daemon config has no HiddenServiceDir"),
    }

    if let Some(dir) = torrc.data_dir.as_deref() {
        if Path::new(dir) != Path::new(&config.daemon.data_dir) {
            bail!(
                "daemon DataDirectory {} does not match daemon.data_dir {}",
                dir,
                config.daemon.data_dir
            );
        }
    }

    Ok(())
}

fn validate_daemon(config: &Config) -> Result<()> {
    let daemon = &config.daemon;
    for (field, name) in [
        ("daemon.executable_name", &daemon.executable_name),
        ("daemon.config_name", &daemon.config_name),
    ] {
        if name.is_empty() {
            bail!("{} cannot be empty", field);
        }
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            bail!("{} must be a plain file name, got {:?}", field, name);
        }
    }

    if daemon.executable_name == daemon.config_name {
        bail!("daemon.executable_name and daemon.config_name must differ");
    }

    Ok(())
}

fn validate_bootstrap(config: &Config) -> Result<()> {
    let bootstrap = &config.bootstrap;
    if bootstrap.hidden_service_dir.is_empty() {
        bail!("bootstrap.hidden_service_dir cannot be empty");
    }
    if bootstrap.hostname_file.is_empty() {
        bail!("bootstrap.hostname_file cannot be empty");
    }
    if bootstrap.max_attempts == 0 {
        bail!("bootstrap.max_attempts must be at least 1");
    }
    if bootstrap.interval_ms == 0 {
        bail!("bootstrap.interval_ms must be greater than 0");
    }
    Ok(())
}

fn validate_server(config: &Config) -> Result<()> {
    let server = &config.server;
    if server.socket_addr().is_none() {
        bail!(
            "server.listen_addr is not a socket address: {}",
            server.listen_addr
        );
    }

    for (field, secs) in [
        ("server.header_read_timeout_secs", server.header_read_timeout_secs),
        ("server.read_timeout_secs", server.read_timeout_secs),
        ("server.write_timeout_secs", server.write_timeout_secs),
        ("server.idle_timeout_secs", server.idle_timeout_secs),
    ] {
        if secs == 0 {
            bail!("{} must be greater than 0", field);
        }
    }

    // Headers arrive before the body, so their budget cannot be larger
    if server.header_read_timeout_secs > server.read_timeout_secs {
        bail!(
            "server.header_read_timeout_secs ({}) must be <= server.read_timeout_secs ({})",
            server.header_read_timeout_secs,
            server.read_timeout_secs
        );
    }

    if server.advertised_port == 0 {
        bail!("server.advertised_port cannot be 0");
    }

    Ok(())
}

fn validate_download(config: &Config) -> Result<()> {
    let download = &config.download;
    match download.socks_proxy.rsplit_once(':') {
        Some((host, _)) if !host.is_empty() && download.socks_port().is_some() => {},
        _ => bail!(
            "download.socks_proxy must be host:port, got {:?}",
            download.socks_proxy
        ),
    }
    if download.timeout_secs == 0 {
        bail!("download.timeout_secs must be greater than 0");
    }
    Ok(())
}
