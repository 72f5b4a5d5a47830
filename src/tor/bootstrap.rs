//! Waiting for the daemon to publish the hidden service address
//!
//! Tor writes `<HiddenServiceDir>/hostname` once the service keys exist.
//! We cannot observe the daemon's internal state, so we poll for that file
//! with a fixed budget.

use crate::config::BootstrapConfig;
use crate::error::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// The `.onion` hostname the daemon published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HiddenServiceAddress(String);

impl HiddenServiceAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HiddenServiceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Polls for the hostname file
#[derive(Debug, Clone)]
pub struct BootstrapWaiter {
    path: PathBuf,
    max_attempts: u32,
    interval: Duration,
}

impl BootstrapWaiter {
    pub fn new(path: impl Into<PathBuf>, max_attempts: u32, interval: Duration) -> Self {
        Self {
            path: path.into(),
            max_attempts,
            interval,
        }
    }

    pub fn from_config(config: &BootstrapConfig, workdir: &Path) -> Self {
        Self::new(
            config.hostname_path(workdir),
            config.max_attempts,
            config.interval(),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait until the hostname file holds an address
    pub async fn await_address(&self) -> Result<HiddenServiceAddress> {
        await_address(&self.path, self.max_attempts, self.interval).await
    }
}

/// Read the trimmed contents of `path`, making at most `max_attempts` reads
/// spaced by `interval`
///
/// A missing file, an unreadable file and an empty file all count as
/// "not ready yet". Tor creates the file before writing it, so a blank
/// read is retried rather than returned.
pub async fn await_address(
    path: &Path,
    max_attempts: u32,
    interval: Duration,
) -> Result<HiddenServiceAddress> {
    info!("Waiting for hidden service address in {}", path.display());

    for attempt in 1..=max_attempts {
        if let Some(address) = read_hostname(path).await {
            info!("Hidden service address: {}", address);
            return Ok(address);
        }

        debug!("Hostname not ready (attempt {}/{})", attempt, max_attempts);
        if attempt < max_attempts {
            tokio::time::sleep(interval).await;
        }
    }

    Err(Error::BootstrapTimeout {
        path: path.to_path_buf(),
        attempts: max_attempts,
    })
}

/// Read the hostname file, `None` while it is absent or empty
async fn read_hostname(path: &Path) -> Option<HiddenServiceAddress> {
    let contents = tokio::fs::read_to_string(path).await.ok()?;
    let hostname = contents.trim();
    if hostname.is_empty() {
        return None;
    }
    Some(HiddenServiceAddress(hostname.to_string()))
}
