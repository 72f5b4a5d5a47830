//! Configuration loading and validation
//!
//! Handles TOML configuration parsing with strict validation.
//! Every field has a default, so running without a file is the normal case.
//! No runtime mutation after CLI overrides are applied.

#![allow(unused_imports)] // Re-exports for public API

pub mod file;
mod validation;

pub use file::{load, load_from_path};
pub use validation::{validate, validate_against_torrc};

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub daemon: DaemonConfig,
    pub bootstrap: BootstrapConfig,
    pub server: ServerConfig,
    pub download: DownloadConfig,
}

/// Bundled Tor daemon and its extracted artifacts
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// File name the daemon executable is extracted as
    pub executable_name: String,
    /// File name the daemon config is extracted as
    pub config_name: String,
    /// Where to read the executable from when it is not compiled in
    pub binary_path: Option<PathBuf>,
    /// Data directory named in the daemon config (never served)
    pub data_dir: String,
    /// Fixed delay after launching the daemon
    pub warmup_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            executable_name: "tori".to_string(),
            config_name: "torrc".to_string(),
            binary_path: None,
            data_dir: "tor_data".to_string(),
            warmup_secs: 5,
        }
    }
}

impl DaemonConfig {
    pub fn warmup(&self) -> Duration {
        Duration::from_secs(self.warmup_secs)
    }

    /// Names that must never be listed or served
    pub fn artifact_names(&self) -> Vec<String> {
        vec![self.executable_name.clone(), self.config_name.clone()]
    }
}

/// Hidden service address polling
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Hidden service directory, relative to the working directory
    pub hidden_service_dir: String,
    /// File inside the hidden service directory holding the address
    pub hostname_file: String,
    /// Number of read attempts before giving up
    pub max_attempts: u32,
    /// Delay between read attempts in milliseconds
    pub interval_ms: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            hidden_service_dir: "hidden_service".to_string(),
            hostname_file: "hostname".to_string(),
            max_attempts: 30,
            interval_ms: 1000,
        }
    }
}

impl BootstrapConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Full path of the hostname file under `workdir`
    pub fn hostname_path(&self, workdir: &Path) -> PathBuf {
        workdir
            .join(&self.hidden_service_dir)
            .join(&self.hostname_file)
    }
}

/// Static file server settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Local address to listen on
    pub listen_addr: String,
    /// Directory served to peers
    pub root: PathBuf,
    /// Virtual port of the onion service (omitted from URLs when 80)
    pub advertised_port: u16,
    /// Time allowed to receive request headers
    pub header_read_timeout_secs: u64,
    /// Time allowed to receive a request body
    pub read_timeout_secs: u64,
    /// Time allowed to write a response
    pub write_timeout_secs: u64,
    /// Time a connection may sit without any I/O
    pub idle_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8085".to_string(),
            root: PathBuf::from("."),
            advertised_port: 80,
            header_read_timeout_secs: 60,
            read_timeout_secs: 10 * 60,
            write_timeout_secs: 4 * 60 * 60,
            idle_timeout_secs: 10 * 60 * 60,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        self.listen_addr.parse().ok()
    }

    pub fn header_read_timeout(&self) -> Duration {
        Duration::from_secs(self.header_read_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Downloads through the Tor SOCKS port
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// SOCKS5 endpoint as host:port
    pub socks_proxy: String,
    /// Whole-request timeout in seconds
    pub timeout_secs: u64,
    /// Directory downloaded files are written to
    pub output_dir: PathBuf,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            socks_proxy: "127.0.0.1:9050".to_string(),
            timeout_secs: 4 * 60 * 60,
            output_dir: PathBuf::from("."),
        }
    }
}

impl DownloadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Port part of `socks_proxy`
    pub fn socks_port(&self) -> Option<u16> {
        let (_, port) = self.socks_proxy.rsplit_once(':')?;
        port.parse().ok()
    }
}
