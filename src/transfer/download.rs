//! Downloads through the Tor SOCKS port
//!
//! Every connection is dialed through `socks5h://`, so hostname resolution
//! happens inside Tor (required for `.onion`). The body is streamed to a
//! file named after the URL's last path segment.
//!
//! Existing files with the same name are overwritten, and a failed transfer
//! leaves the partial file behind.

use crate::config::DownloadConfig;
use crate::error::{Error, Result};
use crate::transfer::progress::TransferProgress;
use crate::util::{decode_path, is_plain_file_name};
use reqwest::{Response, Url};
use std::io;
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Outcome of one download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTask {
    /// URL as requested
    pub url: String,
    /// Local file written
    pub destination: PathBuf,
    /// Content-Length announced by the server, if any
    pub expected_len: Option<u64>,
    /// Body bytes written to `destination`
    pub transferred: u64,
}

/// HTTP client bound to the Tor SOCKS proxy
pub struct Downloader {
    client: reqwest::Client,
    output_dir: PathBuf,
    quiet: bool,
}

impl Downloader {
    /// Build a client that dials everything through `config.socks_proxy`
    ///
    /// Onion circuits are slow and large files take a while, so the
    /// request timeout is measured in hours.
    pub fn new(config: &DownloadConfig) -> Result<Self> {
        let proxy_url = format!("socks5h://{}", config.socks_proxy);
        let proxy = reqwest::Proxy::all(&proxy_url).map_err(Error::ProxyConfig)?;

        let client = reqwest::Client::builder()
            .proxy(proxy)
            .timeout(config.timeout())
            .build()
            .map_err(Error::ProxyConfig)?;

        debug!("Download client configured via {}", proxy_url);

        Ok(Self {
            client,
            output_dir: config.output_dir.clone(),
            quiet: false,
        })
    }

    /// Hide the progress bar
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// GET `url` and stream the body into the output directory
    pub async fn download(&self, url: &str) -> Result<TransferTask> {
        let parsed = Url::parse(url).map_err(|_| Error::InvalidUrl(url.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::InvalidUrl(url.to_string()));
        }
        let name = file_name_from_url(&parsed)?;

        info!("Requesting {}", parsed);
        let mut response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(Error::Request)?;

        // Nothing is written unless the remote accepted the request
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Remote { status });
        }

        let destination = self.output_dir.join(&name);
        let expected_len = response.content_length();
        debug!(
            "Writing {} ({} bytes expected)",
            destination.display(),
            expected_len.map_or_else(|| "unknown".to_string(), |len| len.to_string())
        );

        let mut file = File::create(&destination)
            .await
            .map_err(|source| Error::Transfer {
                destination: destination.clone(),
                source,
            })?;

        let progress = TransferProgress::new(expected_len, &name, self.quiet);
        let transferred = match stream_body(&mut response, &mut file, &progress).await {
            Ok(transferred) => {
                progress.finish();
                transferred
            },
            Err(source) => {
                progress.abandon();
                // The partial file stays; make sure what arrived is on disk
                if let Err(e) = file.flush().await {
                    debug!("Failed to flush partial {}: {}", destination.display(), e);
                }
                return Err(Error::Transfer {
                    destination,
                    source,
                });
            },
        };

        info!("Saved {} bytes to {}", transferred, destination.display());

        Ok(TransferTask {
            url: url.to_string(),
            destination,
            expected_len,
            transferred,
        })
    }
}

/// Copy the response body into `file`, advancing `progress` per chunk
async fn stream_body(
    response: &mut Response,
    file: &mut File,
    progress: &TransferProgress,
) -> io::Result<u64> {
    let mut transferred = 0u64;

    while let Some(chunk) = response.chunk().await.map_err(io::Error::other)? {
        file.write_all(&chunk).await?;
        transferred += chunk.len() as u64;
        progress.advance(chunk.len() as u64);
    }

    file.flush().await?;
    Ok(transferred)
}

/// Local file name for `url`: its last non-empty path segment, decoded
pub fn file_name_from_url(url: &Url) -> Result<String> {
    let invalid = || Error::InvalidUrl(url.to_string());

    let segment = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .ok_or_else(invalid)?;

    let name = decode_path(segment).ok_or_else(invalid)?;
    if !is_plain_file_name(&name) {
        return Err(invalid());
    }
    Ok(name)
}
