//! Artifacts extracted next to the binary before the daemon starts
//!
//! The daemon config is always compiled in. The daemon executable is
//! compiled in with the `bundled-daemon` feature (path taken from
//! `ONIONDROP_DAEMON_BINARY` at build time) and read from disk otherwise.

use std::borrow::Cow;
use std::io;
use std::path::{Path, PathBuf};

/// Daemon config shipped with the binary
pub const DAEMON_CONFIG: &[u8] = include_bytes!("../../assets/torrc");

#[cfg(feature = "bundled-daemon")]
const BUNDLED_EXECUTABLE: Option<&[u8]> = Some(include_bytes!(env!("ONIONDROP_DAEMON_BINARY")));
#[cfg(not(feature = "bundled-daemon"))]
const BUNDLED_EXECUTABLE: Option<&[u8]> = None;

/// Well-known install locations probed when no executable is bundled
const SYSTEM_DAEMON_PATHS: &[&str] = &["/usr/bin/tor", "/usr/local/bin/tor", "/opt/homebrew/bin/tor"];

/// Source of one artifact's bytes
#[derive(Debug, Clone)]
pub enum Artifact {
    /// Compiled into the binary
    Embedded(&'static [u8]),
    /// Read from disk at extraction time
    File(PathBuf),
}

impl Artifact {
    /// Read the artifact contents
    pub fn read(&self) -> io::Result<Cow<'static, [u8]>> {
        match self {
            Artifact::Embedded(bytes) => Ok(Cow::Borrowed(bytes)),
            Artifact::File(path) => std::fs::read(path).map(Cow::Owned),
        }
    }
}

/// Read-only pair of artifacts handed to the supervisor
#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    pub executable: Artifact,
    pub config: Artifact,
}

impl ArtifactBundle {
    pub fn new(executable: Artifact, config: Artifact) -> Self {
        Self { executable, config }
    }

    /// Bundle used by the CLI: embedded torrc plus the embedded executable,
    /// unless `executable_override` points somewhere else
    pub fn standard(executable_override: Option<&Path>) -> Self {
        let executable = match (executable_override, BUNDLED_EXECUTABLE) {
            (Some(path), _) => Artifact::File(path.to_path_buf()),
            (None, Some(bytes)) => Artifact::Embedded(bytes),
            (None, None) => Artifact::File(locate_system_daemon()),
        };
        Self::new(executable, Artifact::Embedded(DAEMON_CONFIG))
    }
}

/// First installed daemon found, or the first candidate so the read error
/// names a sensible path
fn locate_system_daemon() -> PathBuf {
    SYSTEM_DAEMON_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|path| path.is_file())
        .unwrap_or_else(|| PathBuf::from(SYSTEM_DAEMON_PATHS[0]))
}
