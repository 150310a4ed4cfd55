//! Artifact and catalog downloads.
//!
//! The install pipeline talks to the network only through the [`Downloader`]
//! trait, so tests can count or forbid network access. [`HttpDownloader`] is
//! the real implementation:
//!
//! - Streaming downloads with a text progress line on stdout
//! - Downloads to a temporary file, then renames on success
//! - `file://` URLs are copied from local disk, for mirrors and offline use
//!
//! Failed downloads are not retried.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::errors::{IoContext, Result, ToolmanError};

/// Request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Minimum interval between progress updates in milliseconds.
const PROGRESS_INTERVAL_MS: u128 = 250;

/// Network access used by the install pipeline.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Downloads `url` to `dest_dir/file_name` and returns the written path.
    ///
    /// # Errors
    ///
    /// Returns `ToolmanError::Download` on network or HTTP errors and
    /// `ToolmanError::Io` if the file cannot be written.
    async fn fetch(&self, url: &str, dest_dir: &Path, file_name: &str) -> Result<PathBuf>;

    /// Downloads `url` into memory as text.
    ///
    /// # Errors
    ///
    /// Returns `ToolmanError::Download` on network or HTTP errors.
    async fn fetch_text(&self, url: &str) -> Result<String>;
}

/// Downloads over HTTP(S) with reqwest.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: reqwest::Client,
    show_progress: bool,
}

impl HttpDownloader {
    /// Creates a downloader that prints progress to stdout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("toolman/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ToolmanError::download_with_source("Failed to create HTTP client", e))?;

        Ok(Self {
            client,
            show_progress: true,
        })
    }

    /// Disables the progress line.
    #[must_use]
    pub fn quiet(mut self) -> Self {
        self.show_progress = false;
        self
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ToolmanError::download_with_source(format!("Failed to connect to {url}"), e))?;

        if !response.status().is_success() {
            return Err(ToolmanError::download(format!(
                "HTTP error {}: {url}",
                response.status()
            )));
        }
        Ok(response)
    }

    async fn stream_to_file(&self, url: &str, dest: &Path) -> Result<()> {
        let response = self.get(url).await?;
        let total_size = response.content_length().unwrap_or(0);

        let mut file = tokio::fs::File::create(dest)
            .await
            .io_context(|| format!("Failed to create file: {}", dest.display()))?;

        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        let start_time = Instant::now();
        let mut last_update = Instant::now();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                ToolmanError::download_with_source(format!("Failed to read chunk from {url}"), e)
            })?;
            file.write_all(&chunk)
                .await
                .io_context(|| format!("Failed to write to {}", dest.display()))?;
            downloaded += chunk.len() as u64;

            let now = Instant::now();
            if self.show_progress
                && now.duration_since(last_update).as_millis() >= PROGRESS_INTERVAL_MS
            {
                print_progress(downloaded, total_size, start_time.elapsed().as_secs_f64());
                last_update = now;
            }
        }

        file.flush()
            .await
            .io_context(|| format!("Failed to flush {}", dest.display()))?;

        if self.show_progress {
            print_progress(downloaded, total_size, start_time.elapsed().as_secs_f64());
            println!();
        }

        Ok(())
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn fetch(&self, url: &str, dest_dir: &Path, file_name: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dest_dir)
            .await
            .io_context(|| format!("Failed to create directory: {}", dest_dir.display()))?;

        let dest = dest_dir.join(file_name);
        let temp_path = dest_dir.join(format!("{file_name}.tmp"));
        info!(%url, dest = %dest.display(), "downloading");

        let result = match local_path(url) {
            Some(source) => tokio::fs::copy(&source, &temp_path)
                .await
                .map(|_| ())
                .io_context(|| format!("Failed to copy {}", source.display())),
            None => self.stream_to_file(url, &temp_path).await,
        };

        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e);
        }

        tokio::fs::rename(&temp_path, &dest).await.io_context(|| {
            format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                dest.display()
            )
        })?;

        Ok(dest)
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        debug!(%url, "fetching text");

        if let Some(source) = local_path(url) {
            return tokio::fs::read_to_string(&source)
                .await
                .io_context(|| format!("Failed to read {}", source.display()));
        }

        self.get(url)
            .await?
            .text()
            .await
            .map_err(|e| ToolmanError::download_with_source(format!("Failed to read body of {url}"), e))
    }
}

/// Returns the local path of a `file://` URL.
fn local_path(url: &str) -> Option<PathBuf> {
    url.strip_prefix("file://").map(PathBuf::from)
}

/// Returns the last path segment of a URL, without query or fragment.
#[must_use]
pub fn file_name_from_url(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().filter(|name| !name.is_empty())
}

/// Prints a simple text-based progress line.
#[allow(clippy::cast_precision_loss)]
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
fn print_progress(downloaded: u64, total: u64, elapsed_secs: f64) {
    let percent = if total > 0 {
        (downloaded as f64 / total as f64 * 100.0) as u8
    } else {
        0
    };
    let speed = if elapsed_secs > 0.0 {
        downloaded as f64 / elapsed_secs
    } else {
        0.0
    };

    print!(
        "\r{}/{} ({percent}%) {}     ",
        format_bytes(downloaded),
        format_bytes(total),
        format_speed(speed)
    );
    let _ = std::io::stdout().flush();
}

/// Formats bytes into a human-readable string (KB, MB, GB).
fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    #[allow(clippy::cast_precision_loss)]
    let bytes_f = bytes as f64;

    if bytes_f >= GB {
        format!("{:.2} GB", bytes_f / GB)
    } else if bytes_f >= MB {
        format!("{:.2} MB", bytes_f / MB)
    } else if bytes_f >= KB {
        format!("{:.2} KB", bytes_f / KB)
    } else {
        format!("{bytes} B")
    }
}

fn format_speed(speed: f64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;

    if speed >= MB {
        format!("{:.2} MB/s", speed / MB)
    } else if speed >= KB {
        format!("{:.2} KB/s", speed / KB)
    } else {
        format!("{speed:.0} B/s")
    }
}
