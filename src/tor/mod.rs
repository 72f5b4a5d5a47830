//! Tor daemon interaction
//!
//! Extraction and supervision of the bundled daemon, and bootstrap polling
//! for the hidden service address. Tor is treated as a black box.

pub mod bootstrap;
pub mod bundle;
pub mod supervisor;
pub mod torrc;

pub use bootstrap::{await_address, BootstrapWaiter, HiddenServiceAddress};
pub use bundle::{Artifact, ArtifactBundle};
pub use supervisor::{DaemonGuard, DaemonSupervisor};
pub use torrc::TorrcSummary;
