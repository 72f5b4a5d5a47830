//! Fetcher-side download and publisher-side file listing

pub mod download;
pub mod listing;
pub mod progress;

pub use download::{file_name_from_url, Downloader, TransferTask};
pub use listing::{advertised_urls, base_url, Exclusions, FileLister};
pub use progress::TransferProgress;
