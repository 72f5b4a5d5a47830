//! Error taxonomy
//!
//! One variant per failure class. Whether a variant is fatal is decided by
//! the caller: launch and extraction failures are logged and swallowed,
//! everything on the network side terminates the run.

use reqwest::StatusCode;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the daemon supervisor, the bootstrap waiter and the
/// transfer path
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A bundled artifact could not be read or written to disk
    #[error("failed to extract {artifact}: {source}")]
    Extraction {
        artifact: String,
        #[source]
        source: io::Error,
    },

    /// The daemon process could not be spawned
    #[error("failed to launch daemon (possibly already running): {0}")]
    DaemonLaunch(#[source] io::Error),

    /// The hostname file never became readable
    #[error("hidden service address not available at {} after {attempts} attempts", path.display())]
    BootstrapTimeout { path: PathBuf, attempts: u32 },

    /// The SOCKS-backed HTTP client could not be built
    #[error("failed to configure SOCKS proxy: {0}")]
    ProxyConfig(#[source] reqwest::Error),

    /// The request never produced a response
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    /// The remote answered with a non-success status
    #[error("remote returned {status}")]
    Remote { status: StatusCode },

    /// Reading the body or writing the local file failed mid-stream
    #[error("transfer to {} failed: {source}", destination.display())]
    Transfer {
        destination: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The URL cannot be fetched or has no usable file name
    #[error("invalid URL {0}")]
    InvalidUrl(String),

    /// The HTTP listener could not be bound
    #[error("failed to listen on {addr}: {source}")]
    Listen {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// Configuration is inconsistent
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// HTTP status carried by a [`Error::Remote`], if any
    pub fn remote_status(&self) -> Option<StatusCode> {
        match self {
            Error::Remote { status } => Some(*status),
            _ => None,
        }
    }
}
