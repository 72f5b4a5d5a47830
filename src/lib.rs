//! oniondrop library crate
//!
//! Exchange a single file over Tor without a public server: one side
//! publishes a directory behind a hidden service, the other fetches a file
//! through the local SOCKS proxy.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface (share, fetch)
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Library error type
//! - [`tor`] - Bundled daemon supervision and bootstrap polling
//! - [`server`] - Static HTTP file server
//! - [`transfer`] - Proxied downloads and file listing
//! - [`util`] - URL path helpers

// Allow common stylistic patterns.
#![allow(clippy::missing_const_for_fn)] // Const fn optimization is low priority
#![allow(clippy::doc_markdown)] // Doc formatting is secondary
#![allow(clippy::uninlined_format_args)] // Format string style preference
#![allow(clippy::option_if_let_else)] // Style preference
#![allow(clippy::use_self)] // Explicit types are clearer
#![allow(clippy::single_match_else)] // Match for clarity
#![allow(clippy::items_after_statements)] // Local imports are fine
#![allow(clippy::unnecessary_debug_formatting)] // Debug format for paths
#![allow(clippy::new_without_default)] // Explicit new() is fine
#![allow(clippy::redundant_closure_for_method_calls)] // Explicit closures
#![allow(clippy::map_unwrap_or)] // map().unwrap_or is clearer

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod server;
pub mod tor;
pub mod transfer;
pub mod util;

pub use error::{Error, Result};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
