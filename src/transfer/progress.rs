//! Download progress display

use indicatif::{ProgressBar, ProgressStyle};

/// Progress indicator for one transfer
pub struct TransferProgress {
    bar: ProgressBar,
}

impl TransferProgress {
    /// Byte bar when the length is known, spinner with a byte count otherwise
    pub fn new(total: Option<u64>, name: &str, quiet: bool) -> Self {
        let bar = match (quiet, total) {
            (true, _) => ProgressBar::hidden(),
            (false, Some(total)) => {
                let bar = ProgressBar::new(total);
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template("{msg} [{elapsed_precise}] [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("#>-"),
                );
                bar
            },
            (false, None) => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.green} {msg} [{elapsed_precise}] {bytes} ({bytes_per_sec})")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                bar
            },
        };

        bar.set_message(format!("Downloading {}", name));
        Self { bar }
    }

    pub fn advance(&self, bytes: u64) {
        self.bar.inc(bytes);
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish(&self) {
        self.bar.finish_with_message("Download complete");
    }

    pub fn abandon(&self) {
        self.bar.abandon_with_message("Download failed");
    }
}
