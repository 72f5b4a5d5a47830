//! Publishable file listing
//!
//! Snapshot of the served directory used to print URLs at startup. The
//! server reads the file system per request, so this list may go stale.

use crate::config::Config;
use crate::util::encode_path_segment;
use std::io;
use std::path::Path;
use tracing::debug;

/// Names never listed or served: dotfiles plus the daemon's own files
#[derive(Debug, Clone, Default)]
pub struct Exclusions {
    names: Vec<String>,
}

impl Exclusions {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Daemon executable, daemon config, hidden service and data directories
    pub fn from_config(config: &Config) -> Self {
        let mut names = config.daemon.artifact_names();
        names.push(config.bootstrap.hidden_service_dir.clone());
        names.push(config.daemon.data_dir.clone());
        Self::new(names)
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        name.starts_with('.') || self.names.iter().any(|n| n == name)
    }
}

/// Enumerates regular files in a directory
#[derive(Debug, Clone, Default)]
pub struct FileLister {
    exclusions: Exclusions,
}

impl FileLister {
    pub fn new(exclusions: Exclusions) -> Self {
        Self { exclusions }
    }

    /// Sorted names of the regular, non-excluded files directly in `dir`
    ///
    /// Subdirectories and symlinks are skipped, as are names that are not
    /// valid UTF-8 (they cannot be put in a URL as-is).
    pub fn list(&self, dir: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();

        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let Ok(name) = entry.file_name().into_string() else {
                debug!("Skipping non UTF-8 file name {:?}", entry.file_name());
                continue;
            };

            if !self.exclusions.is_excluded(&name) {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }
}

/// Base URL of the onion service, with the port only when it is not 80
pub fn base_url(address: &str, port: u16) -> String {
    if port == 80 {
        format!("http://{}/", address)
    } else {
        format!("http://{}:{}/", address, port)
    }
}

/// Full URLs peers use to fetch each file
pub fn advertised_urls(address: &str, port: u16, names: &[String]) -> Vec<String> {
    let base = base_url(address, port);
    names
        .iter()
        .map(|name| format!("{}{}", base, encode_path_segment(name)))
        .collect()
}
